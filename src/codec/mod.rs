//! # SOME/IP Codec Module
//!
//! Byte-exact encoding of the SOME/IP header and the rules that decide whether a decoded header
//! is acceptable.
//!
//! ## Key Types
//!
//! - [`SomeIpHeader`] - 16-byte SOME/IP header
//! - [`MessageType`] / [`ReturnCode`] - lossless views of the single-byte header fields
//! - [`HeaderError`] - first rule a header violates
//! - [`SessionCounter`] - session ID generation with 0xFFFF -> 0x0001 wrap
//! - [`SomeIpSerialize`] / [`SomeIpDeserialize`] - payload encoding for method handlers
//!
//! ## Example
//!
//! ```
//! use someip_stack::codec::{MessageId, MessageType, RequestId, ReturnCode, SomeIpHeader};
//!
//! let header = SomeIpHeader::new(
//!     MessageId::new(0x1001, 0x0001),
//!     RequestId::new(0x0001, 0x0001),
//!     1,
//!     MessageType::Request,
//!     ReturnCode::Ok,
//! );
//! let bytes = header.serialize();
//! assert_eq!(SomeIpHeader::deserialize(&bytes), header);
//! ```

pub mod header;
pub mod primitives;
pub mod session;
pub mod traits;
pub mod validate;

pub use header::*;
pub use session::{SessionCounter, SessionHandling, increment_session_id};
pub use traits::{SomeIpDeserialize, SomeIpSerialize};
pub use validate::HeaderError;

/// UDP payload budget. Larger messages would need SOME/IP-TP segmentation, which is not supported.
pub const UDP_MTU_LENGTH: usize = 1400;

#[cfg(test)]
mod tests;
