//! # Tx Message Module
//!
//! Outbound messages are assembled in place inside a fixed [`TxPool`]; nothing is allocated per
//! message. A [`MessageBuilder`] takes a slot on `init`, appends payload with `put`, writes the
//! header on `finalize` and gives the slot back on `invalidate`.
//!
//! ## Example
//!
//! ```
//! use someip_stack::codec::{MessageId, MessageType, RequestId, ReturnCode, SessionHandling, SomeIpHeader};
//! use someip_stack::message::{MessageBuilder, TxPool};
//!
//! let mut pool = TxPool::new(2, 1400);
//! let mut builder = MessageBuilder::init(&mut pool).unwrap();
//! builder.put(&[0xCA, 0xFE]).unwrap();
//!
//! let mut header = SomeIpHeader::new(
//!     MessageId::new(0x0007, 0x0002),
//!     RequestId::new(1, 1),
//!     1,
//!     MessageType::Response,
//!     ReturnCode::Ok,
//! );
//! assert_eq!(builder.finalize(&mut header, SessionHandling::Enabled).unwrap(), 18);
//! assert_eq!(header.length, 10);
//! builder.invalidate(&mut pool).unwrap();
//! ```

pub mod builder;
pub mod pool;

pub use builder::{BuildError, HeaderKind, MessageBuilder};
pub use pool::{PoolError, TxPool};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{MessageId, MessageType, RequestId, ReturnCode, SessionHandling, SomeIpHeader};
    use std::io::Write;

    fn response_header() -> SomeIpHeader {
        SomeIpHeader::new(
            MessageId::new(0x1234, 0x0001),
            RequestId::new(0x0010, 0x0001),
            1,
            MessageType::Response,
            ReturnCode::Ok,
        )
    }

    #[test]
    fn test_pool_bound() {
        let mut pool = TxPool::new(3, 64);
        let mut builders: Vec<_> = (0..3).map(|_| MessageBuilder::init(&mut pool).unwrap()).collect();

        assert_eq!(pool.available(), 0);
        assert_eq!(MessageBuilder::init(&mut pool).unwrap_err(), PoolError::Exhausted(3));

        builders[1].invalidate(&mut pool).unwrap();
        assert_eq!(pool.available(), 1);
        assert!(MessageBuilder::init(&mut pool).is_ok());
    }

    #[test]
    fn test_double_invalidate_fails_without_corrupting_pool() {
        let mut pool = TxPool::new(2, 64);
        let mut builder = MessageBuilder::init(&mut pool).unwrap();
        let _other = MessageBuilder::init(&mut pool).unwrap();

        assert!(builder.invalidate(&mut pool).is_ok());
        assert_eq!(builder.invalidate(&mut pool), Err(PoolError::AlreadyReleased));
        assert_eq!(pool.available(), 1);

        let _again = MessageBuilder::init(&mut pool).unwrap();
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_invalidate_into_foreign_pool_is_rejected() {
        let mut pool_a = TxPool::new(1, 64);
        let mut pool_b = TxPool::new(1, 64);
        let mut builder = MessageBuilder::init(&mut pool_a).unwrap();

        assert_eq!(builder.invalidate(&mut pool_b), Err(PoolError::ForeignBuffer));
        assert_eq!(pool_b.available(), 1);
        assert!(!builder.is_released());
        assert!(builder.invalidate(&mut pool_a).is_ok());
    }

    #[test]
    fn test_put_respects_capacity() {
        let mut pool = TxPool::new(1, 24);
        let mut builder = MessageBuilder::init(&mut pool).unwrap();

        builder.put(&[1, 2, 3, 4]).unwrap();
        assert_eq!(builder.cursor(), 20);
        assert_eq!(
            builder.put(&[0u8; 5]),
            Err(BuildError::PayloadTooLarge { len: 5, available: 4 })
        );
        builder.put(&[5, 6, 7, 8]).unwrap();
        assert_eq!(builder.payload(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(builder.put(&[]).is_ok());
        assert!(builder.put(&[9]).is_err());
    }

    #[test]
    fn test_put_respects_mtu() {
        let mut pool = TxPool::new(1, 4000);
        assert_eq!(pool.block_size(), 1400);

        let mut builder = MessageBuilder::init(&mut pool).unwrap();
        assert!(builder.put(&[0u8; 1385]).is_err());
        assert!(builder.put(&[0u8; 1384]).is_ok());
    }

    #[test]
    fn test_finalize_sets_length_and_serializes_header() {
        let mut pool = TxPool::new(1, 1400);
        let mut builder = MessageBuilder::init(&mut pool).unwrap();
        builder.write_all(&[0xAA; 4]).unwrap();

        let mut header = response_header();
        let total = builder.finalize(&mut header, SessionHandling::Enabled).unwrap();

        assert_eq!(total, 20);
        assert_eq!(header.length, 12);
        assert_eq!(builder.length(), builder.cursor());
        let bytes = builder.as_bytes();
        assert_eq!(SomeIpHeader::parse(bytes), Some(header));
        assert_eq!(&bytes[16..], &[0xAA; 4]);
    }

    #[test]
    fn test_finalize_rejects_invalid_header() {
        let mut pool = TxPool::new(1, 1400);
        let mut builder = MessageBuilder::init(&mut pool).unwrap();

        let mut header = response_header();
        header.protocol_version = 9;
        assert!(matches!(
            builder.finalize(&mut header, SessionHandling::Enabled),
            Err(BuildError::Header(_))
        ));
        assert_eq!(header.length, 0);
    }

    #[test]
    fn test_finalize_twice_is_a_length_mismatch() {
        let mut pool = TxPool::new(1, 1400);
        let mut builder = MessageBuilder::init(&mut pool).unwrap();
        let mut header = response_header();

        builder.finalize(&mut header, SessionHandling::Enabled).unwrap();
        assert!(matches!(
            builder.finalize(&mut header, SessionHandling::Enabled),
            Err(BuildError::LengthMismatch { cursor: 16, length: 32 })
        ));
    }

    #[test]
    fn test_released_builder_refuses_work() {
        let mut pool = TxPool::new(1, 1400);
        let mut builder = MessageBuilder::init(&mut pool).unwrap();
        builder.invalidate(&mut pool).unwrap();

        assert_eq!(builder.put(&[1]), Err(BuildError::Released));
        assert!(builder.as_bytes().is_empty());
        assert_eq!(
            builder.finalize(&mut response_header(), SessionHandling::Enabled),
            Err(BuildError::Released)
        );
    }

    #[test]
    fn test_detached_builder_holds_no_pool_slot() {
        let mut pool = TxPool::new(1, 64);
        let mut detached = MessageBuilder::detached();

        assert!(matches!(detached.put(&[1]), Err(BuildError::CursorOutOfRange { .. })));
        assert!(detached.payload().is_empty());
        assert_eq!(detached.invalidate(&mut pool), Err(PoolError::ForeignBuffer));
        assert_eq!(pool.available(), 1);
    }
}
