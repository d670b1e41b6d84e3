//! Big-endian put/get helpers for the fixed-offset fields of SOME/IP and SD records.
//!
//! The caller owns the buffer and the offsets; every record type in this crate serializes into a
//! fixed-size array, so the offsets are constants that always lie inside the array.

#[inline]
pub fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

/// Writes the low 24 bits of `value`; the top byte is discarded.
#[inline]
pub fn put_u24(buf: &mut [u8], offset: usize, value: u32) {
    let bytes = value.to_be_bytes();
    buf[offset..offset + 3].copy_from_slice(&bytes[1..4]);
}

#[inline]
pub fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

#[inline]
pub fn get_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

#[inline]
pub fn get_u24(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([0, buf[offset], buf[offset + 1], buf[offset + 2]])
}

#[inline]
pub fn get_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}
