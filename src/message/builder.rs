use super::pool::{PoolError, TxPool};
use crate::codec::{HeaderError, SessionHandling, SomeIpHeader, UDP_MTU_LENGTH};
use crate::sd::packet::SdHeader;
use std::io::{self, Write};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("builder no longer owns a buffer")]
    Released,
    #[error("cursor {cursor} outside of 16..={capacity}")]
    CursorOutOfRange { cursor: usize, capacity: usize },
    #[error("payload of {len} bytes exceeds the {available} bytes left")]
    PayloadTooLarge { len: usize, available: usize },
    #[error("builder was initialised for a {0:?} message")]
    WrongKind(HeaderKind),
    #[error(transparent)]
    Header(#[from] HeaderError),
    /// Internal consistency violation: the recomputed length disagrees with the cursor.
    #[error("length mismatch after finalize: cursor={cursor} length={length}")]
    LengthMismatch { cursor: usize, length: usize },
}

/// Which header the builder reserves room for in front of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    /// 16-byte SOME/IP header.
    SomeIp,
    /// SOME/IP header plus the 4-byte SD preamble.
    Sd,
}

impl HeaderKind {
    pub fn header_len(&self) -> usize {
        match self {
            HeaderKind::SomeIp => SomeIpHeader::HEADER_LENGTH,
            HeaderKind::Sd => SdHeader::HEADER_LENGTH,
        }
    }

    /// Largest payload the protocol lets one datagram carry.
    pub fn max_payload(&self) -> usize {
        match self {
            HeaderKind::SomeIp => UDP_MTU_LENGTH - SomeIpHeader::HEADER_LENGTH,
            HeaderKind::Sd => UDP_MTU_LENGTH - SdHeader::MIN_MESSAGE_LENGTH,
        }
    }
}

/// Owns one [`TxPool`] slot from `init` until `invalidate`.
#[derive(Debug)]
pub struct MessageBuilder {
    buffer: Option<Box<[u8]>>,
    pool_id: u32,
    slot: usize,
    kind: HeaderKind,
    cursor: usize,
    length: usize,
}

impl MessageBuilder {
    /// Takes a free slot and places the cursor behind the SOME/IP header.
    pub fn init(pool: &mut TxPool) -> Result<Self, PoolError> {
        Self::init_with(pool, HeaderKind::SomeIp)
    }

    /// Takes a free slot and places the cursor behind the SD header and preamble.
    pub fn init_sd(pool: &mut TxPool) -> Result<Self, PoolError> {
        Self::init_with(pool, HeaderKind::Sd)
    }

    /// A builder without a buffer for callers that will never send what is written. Every
    /// `put` fails, and `invalidate` rejects it because it belongs to no pool.
    pub fn detached() -> Self {
        MessageBuilder {
            buffer: Some(Box::default()),
            pool_id: 0,
            slot: 0,
            kind: HeaderKind::SomeIp,
            cursor: HeaderKind::SomeIp.header_len(),
            length: 0,
        }
    }

    fn init_with(pool: &mut TxPool, kind: HeaderKind) -> Result<Self, PoolError> {
        let (slot, buffer) = pool.allocate()?;
        Ok(MessageBuilder {
            buffer: Some(buffer),
            pool_id: pool.id(),
            slot,
            kind,
            cursor: kind.header_len(),
            length: 0,
        })
    }

    pub fn kind(&self) -> HeaderKind {
        self.kind
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Payload bytes appended so far, plus the header once finalized.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn capacity(&self) -> usize {
        self.buffer.as_ref().map_or(0, |b| b.len())
    }

    pub fn is_released(&self) -> bool {
        self.buffer.is_none()
    }

    /// Everything written so far, header region included.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.buffer {
            Some(buffer) => &buffer[..self.cursor.min(buffer.len())],
            None => &[],
        }
    }

    /// Payload written so far, without the header region.
    pub fn payload(&self) -> &[u8] {
        let bytes = self.as_bytes();
        bytes.get(self.kind.header_len()..).unwrap_or(&[])
    }

    pub fn put(&mut self, payload: &[u8]) -> Result<(), BuildError> {
        let cursor = self.cursor;
        let max_payload = self.kind.max_payload();
        let buffer = self.buffer.as_mut().ok_or(BuildError::Released)?;
        let capacity = buffer.len();

        if cursor > capacity {
            return Err(BuildError::CursorOutOfRange { cursor, capacity });
        }
        // cursor <= capacity from here on, the subtraction cannot wrap
        let available = (capacity - cursor).min(max_payload);
        if payload.len() > available {
            return Err(BuildError::PayloadTooLarge {
                len: payload.len(),
                available,
            });
        }

        buffer[cursor..cursor + payload.len()].copy_from_slice(payload);
        self.cursor += payload.len();
        self.length += payload.len();
        Ok(())
    }

    /// Fills in `header.length`, writes the header in front of the payload and returns the
    /// datagram length.
    pub fn finalize(&mut self, header: &mut SomeIpHeader, handling: SessionHandling) -> Result<usize, BuildError> {
        if self.kind != HeaderKind::SomeIp {
            return Err(BuildError::WrongKind(self.kind));
        }
        self.check_finalize_cursor()?;
        header.validate(handling)?;

        header.length = self.announced_length();
        self.write_header(&header.serialize())?;
        Ok(header.total_length())
    }

    pub fn finalize_sd(&mut self, header: &mut SdHeader, handling: SessionHandling) -> Result<usize, BuildError> {
        if self.kind != HeaderKind::Sd {
            return Err(BuildError::WrongKind(self.kind));
        }
        self.check_finalize_cursor()?;
        header.validate(handling)?;

        header.header.length = self.announced_length();
        self.write_header(&header.serialize())?;
        Ok(header.header.total_length())
    }

    /// Returns the slot to `pool`. Fails without side effects if the builder was already
    /// released or came from another pool.
    pub fn invalidate(&mut self, pool: &mut TxPool) -> Result<(), PoolError> {
        if self.buffer.is_none() {
            return Err(PoolError::AlreadyReleased);
        }
        if self.pool_id != pool.id() {
            return Err(PoolError::ForeignBuffer);
        }
        let buffer = self.buffer.take().ok_or(PoolError::AlreadyReleased)?;
        pool.release(self.pool_id, self.slot, buffer)?;
        self.cursor = 0;
        self.length = 0;
        Ok(())
    }

    fn check_finalize_cursor(&self) -> Result<(), BuildError> {
        let capacity = self.buffer.as_ref().ok_or(BuildError::Released)?.len();
        let header_len = self.kind.header_len();
        if self.cursor < header_len || self.cursor > capacity || self.cursor > UDP_MTU_LENGTH {
            return Err(BuildError::CursorOutOfRange {
                cursor: self.cursor,
                capacity,
            });
        }
        Ok(())
    }

    fn announced_length(&self) -> u32 {
        // cursor <= UDP_MTU_LENGTH was checked, the cast is lossless
        (self.cursor - SomeIpHeader::HEADER_PREFIX_LENGTH) as u32
    }

    fn write_header(&mut self, bytes: &[u8]) -> Result<(), BuildError> {
        let buffer = self.buffer.as_mut().ok_or(BuildError::Released)?;
        buffer[..bytes.len()].copy_from_slice(bytes);
        self.length += bytes.len();

        if self.cursor != self.length {
            return Err(BuildError::LengthMismatch {
                cursor: self.cursor,
                length: self.length,
            });
        }
        Ok(())
    }
}

impl Write for MessageBuilder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.put(buf)
            .map(|_| buf.len())
            .map_err(|e| io::Error::new(io::ErrorKind::WriteZero, e))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
