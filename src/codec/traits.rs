//! Payload (de)serialization for method handlers.
//!
//! Handlers read request arguments from the raw payload slice and write their results straight
//! into the response [`MessageBuilder`](crate::message::MessageBuilder), which implements
//! [`std::io::Write`] on top of its pool buffer.

use std::io::{Read, Result, Write};

/// Types that can be appended to a SOME/IP payload.
pub trait SomeIpSerialize {
    fn serialize<W: Write>(&self, writer: &mut W) -> Result<()>;
}

/// Types that can be read back from a SOME/IP payload.
pub trait SomeIpDeserialize: Sized {
    fn deserialize<R: Read>(reader: &mut R) -> Result<Self>;
}

macro_rules! impl_big_endian {
    ($($type:ty),*) => {
        $(
            impl SomeIpSerialize for $type {
                fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
                    writer.write_all(&self.to_be_bytes())
                }
            }

            impl SomeIpDeserialize for $type {
                fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
                    let mut buf = [0u8; std::mem::size_of::<$type>()];
                    reader.read_exact(&mut buf)?;
                    Ok(<$type>::from_be_bytes(buf))
                }
            }
        )*
    };
}

impl_big_endian!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

// 0x00 = false, anything else = true
impl SomeIpSerialize for bool {
    fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[u8::from(*self)])
    }
}

impl SomeIpDeserialize for bool {
    fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf)?;
        Ok(buf[0] != 0)
    }
}
