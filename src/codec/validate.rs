//! Field-level rules for SOME/IP headers.
//!
//! Each field has a `check_*` predicate that can be queried on its own (used while only part of a
//! datagram is known) and a `set_*` method that only stores values passing the check.
//! [`validate`] combines all of them. The return-code rule depends on the message type, so it is
//! always evaluated after the message-type rule.

use super::header::{MessageId, MessageType, RequestId, ReturnCode, SomeIpHeader};
use super::session::SessionHandling;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("invalid message id {0:?}")]
    InvalidMessageId(MessageId),
    #[error("invalid request id {0:?}")]
    InvalidRequestId(RequestId),
    #[error("wrong protocol version 0x{0:02x}")]
    WrongProtocolVersion(u8),
    #[error("wrong interface version 0x{0:02x}")]
    WrongInterfaceVersion(u8),
    #[error("invalid message type {0:?}")]
    InvalidMessageType(MessageType),
    #[error("return code {code:?} not allowed for {message_type:?}")]
    InvalidReturnCode {
        message_type: MessageType,
        code: ReturnCode,
    },
    #[error("reserved preamble bits set: 0x{0:08x}")]
    ReservedFlagsSet(u32),
}

/// Method IDs live in 0x0000..=0x7FFF, event IDs in 0x8000..=0xFFFF.
pub fn check_message_id(id: MessageId) -> bool {
    id.is_method() || id.is_event()
}

pub fn check_request_id(id: RequestId, handling: SessionHandling) -> bool {
    match handling {
        SessionHandling::Enabled => id.session_id != 0,
        SessionHandling::Disabled => id.session_id == 0,
    }
}

pub fn check_protocol_version(version: u8) -> bool {
    version == SomeIpHeader::SOMEIP_PROTOCOL_VERSION
}

/// Every interface version is acceptable at header level; the service lookup enforces the match.
pub fn check_interface_version(_version: u8) -> bool {
    true
}

pub fn check_message_type(message_type: MessageType) -> bool {
    message_type.is_known()
}

/// OK for REQUEST/REQUEST_NO_RETURN/NOTIFICATION, anything for RESPONSE, anything but OK for ERROR.
pub fn check_return_code(message_type: MessageType, code: ReturnCode) -> bool {
    match message_type {
        MessageType::Request | MessageType::RequestNoReturn | MessageType::Notification => {
            code == ReturnCode::Ok
        }
        MessageType::Response => true,
        MessageType::Error => code != ReturnCode::Ok,
        MessageType::Unknown(_) => false,
    }
}

pub fn validate(header: &SomeIpHeader, handling: SessionHandling) -> Result<(), HeaderError> {
    if !check_message_id(header.message_id) {
        return Err(HeaderError::InvalidMessageId(header.message_id));
    }
    if !check_request_id(header.request_id, handling) {
        return Err(HeaderError::InvalidRequestId(header.request_id));
    }
    if !check_protocol_version(header.protocol_version) {
        return Err(HeaderError::WrongProtocolVersion(header.protocol_version));
    }
    if !check_interface_version(header.interface_version) {
        return Err(HeaderError::WrongInterfaceVersion(header.interface_version));
    }
    if !check_message_type(header.message_type) {
        return Err(HeaderError::InvalidMessageType(header.message_type));
    }
    if !check_return_code(header.message_type, header.return_code) {
        return Err(HeaderError::InvalidReturnCode {
            message_type: header.message_type,
            code: header.return_code,
        });
    }
    Ok(())
}

impl SomeIpHeader {
    pub fn set_message_id(&mut self, id: MessageId) -> Result<(), HeaderError> {
        if !check_message_id(id) {
            return Err(HeaderError::InvalidMessageId(id));
        }
        self.message_id = id;
        Ok(())
    }

    pub fn set_request_id(&mut self, id: RequestId, handling: SessionHandling) -> Result<(), HeaderError> {
        if !check_request_id(id, handling) {
            return Err(HeaderError::InvalidRequestId(id));
        }
        self.request_id = id;
        Ok(())
    }

    pub fn set_protocol_version(&mut self, version: u8) -> Result<(), HeaderError> {
        if !check_protocol_version(version) {
            return Err(HeaderError::WrongProtocolVersion(version));
        }
        self.protocol_version = version;
        Ok(())
    }

    pub fn set_interface_version(&mut self, version: u8) -> Result<(), HeaderError> {
        if !check_interface_version(version) {
            return Err(HeaderError::WrongInterfaceVersion(version));
        }
        self.interface_version = version;
        Ok(())
    }

    pub fn set_message_type(&mut self, message_type: MessageType) -> Result<(), HeaderError> {
        if !check_message_type(message_type) {
            return Err(HeaderError::InvalidMessageType(message_type));
        }
        self.message_type = message_type;
        Ok(())
    }

    /// Checked against the message type already stored in the header.
    pub fn set_return_code(&mut self, code: ReturnCode) -> Result<(), HeaderError> {
        if !check_return_code(self.message_type, code) {
            return Err(HeaderError::InvalidReturnCode {
                message_type: self.message_type,
                code,
            });
        }
        self.return_code = code;
        Ok(())
    }

    pub fn validate(&self, handling: SessionHandling) -> Result<(), HeaderError> {
        validate(self, handling)
    }
}
