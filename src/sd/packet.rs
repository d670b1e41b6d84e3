use crate::codec::primitives::{get_u32, put_u32};
use crate::codec::validate::{check_protocol_version, check_request_id};
use crate::codec::{
    HeaderError, MessageId, MessageType, RequestId, ReturnCode, SessionHandling, SomeIpHeader,
};

pub const SD_SERVICE_ID: u16 = 0xFFFF;
pub const SD_METHOD_ID: u16 = 0x8100;
pub const SD_INTERFACE_VERSION: u8 = 0x01;
pub const SD_DEFAULT_PORT: u16 = 30490;

pub const REBOOT_FLAG: u8 = 0x80;
pub const UNICAST_FLAG: u8 = 0x40;

/// [PRS_SOMEIPSD_00016] SOME/IP header followed by the 4-byte SD preamble
/// (`flags:8 | reserved:24`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdHeader {
    pub header: SomeIpHeader,
    pub preamble: u32,
}

impl SdHeader {
    pub const PREAMBLE_LENGTH: usize = 4;
    pub const HEADER_LENGTH: usize = SomeIpHeader::HEADER_LENGTH + Self::PREAMBLE_LENGTH;
    /// Header, preamble and the two (possibly zero) array length fields.
    pub const MIN_MESSAGE_LENGTH: usize = SomeIpHeader::HEADER_LENGTH + 12;

    /// An SD header with the fixed SD field values and the given flags; `length` is filled in by
    /// the builder.
    pub fn new(session_id: u16, reboot: bool, unicast: bool) -> Self {
        let mut flags = 0u8;
        if reboot {
            flags |= REBOOT_FLAG;
        }
        if unicast {
            flags |= UNICAST_FLAG;
        }
        SdHeader {
            header: SomeIpHeader::new(
                MessageId::new(SD_SERVICE_ID, SD_METHOD_ID),
                RequestId::new(0x0000, session_id),
                SD_INTERFACE_VERSION,
                MessageType::Notification,
                ReturnCode::Ok,
            ),
            preamble: u32::from(flags) << 24,
        }
    }

    pub fn flags(&self) -> u8 {
        (self.preamble >> 24) as u8
    }

    pub fn reboot(&self) -> bool {
        self.flags() & REBOOT_FLAG != 0
    }

    pub fn unicast(&self) -> bool {
        self.flags() & UNICAST_FLAG != 0
    }

    pub fn serialize(&self) -> [u8; 20] {
        let mut buffer = [0u8; 20];
        buffer[..16].copy_from_slice(&self.header.serialize());
        put_u32(&mut buffer, 16, self.preamble);
        buffer
    }

    pub fn deserialize(buffer: &[u8; 20]) -> Self {
        let mut header = [0u8; 16];
        header.copy_from_slice(&buffer[..16]);
        SdHeader {
            header: SomeIpHeader::deserialize(&header),
            preamble: get_u32(buffer, 16),
        }
    }

    pub fn parse(buffer: &[u8]) -> Option<Self> {
        buffer.first_chunk::<20>().map(Self::deserialize)
    }

    pub fn set_message_id(&mut self, id: MessageId) -> Result<(), HeaderError> {
        if !check_message_id(id) {
            return Err(HeaderError::InvalidMessageId(id));
        }
        self.header.message_id = id;
        Ok(())
    }

    pub fn set_request_id(&mut self, id: RequestId, handling: SessionHandling) -> Result<(), HeaderError> {
        if !check_request_id(id, handling) {
            return Err(HeaderError::InvalidRequestId(id));
        }
        self.header.request_id = id;
        Ok(())
    }

    pub fn set_protocol_version(&mut self, version: u8) -> Result<(), HeaderError> {
        if !check_protocol_version(version) {
            return Err(HeaderError::WrongProtocolVersion(version));
        }
        self.header.protocol_version = version;
        Ok(())
    }

    pub fn set_interface_version(&mut self, version: u8) -> Result<(), HeaderError> {
        if !check_interface_version(version) {
            return Err(HeaderError::WrongInterfaceVersion(version));
        }
        self.header.interface_version = version;
        Ok(())
    }

    pub fn set_message_type(&mut self, message_type: MessageType) -> Result<(), HeaderError> {
        if !check_message_type(message_type) {
            return Err(HeaderError::InvalidMessageType(message_type));
        }
        self.header.message_type = message_type;
        Ok(())
    }

    pub fn set_return_code(&mut self, code: ReturnCode) -> Result<(), HeaderError> {
        if !check_return_code(code) {
            return Err(HeaderError::InvalidReturnCode {
                message_type: self.header.message_type,
                code,
            });
        }
        self.header.return_code = code;
        Ok(())
    }

    pub fn set_preamble(&mut self, preamble: u32) -> Result<(), HeaderError> {
        if !check_preamble(preamble) {
            return Err(HeaderError::ReservedFlagsSet(preamble));
        }
        self.preamble = preamble;
        Ok(())
    }

    pub fn validate(&self, handling: SessionHandling) -> Result<(), HeaderError> {
        let h = &self.header;
        if !check_message_id(h.message_id) {
            return Err(HeaderError::InvalidMessageId(h.message_id));
        }
        if !check_request_id(h.request_id, handling) {
            return Err(HeaderError::InvalidRequestId(h.request_id));
        }
        if !check_protocol_version(h.protocol_version) {
            return Err(HeaderError::WrongProtocolVersion(h.protocol_version));
        }
        if !check_interface_version(h.interface_version) {
            return Err(HeaderError::WrongInterfaceVersion(h.interface_version));
        }
        if !check_message_type(h.message_type) {
            return Err(HeaderError::InvalidMessageType(h.message_type));
        }
        if !check_return_code(h.return_code) {
            return Err(HeaderError::InvalidReturnCode {
                message_type: h.message_type,
                code: h.return_code,
            });
        }
        if !check_preamble(self.preamble) {
            return Err(HeaderError::ReservedFlagsSet(self.preamble));
        }
        Ok(())
    }
}

pub fn check_message_id(id: MessageId) -> bool {
    id.service_id == SD_SERVICE_ID && id.method_id == SD_METHOD_ID
}

pub fn check_interface_version(version: u8) -> bool {
    version == SD_INTERFACE_VERSION
}

pub fn check_message_type(message_type: MessageType) -> bool {
    message_type == MessageType::Notification
}

pub fn check_return_code(code: ReturnCode) -> bool {
    code == ReturnCode::Ok
}

/// Only the reboot and unicast bits may be set.
pub fn check_preamble(preamble: u32) -> bool {
    let allowed = u32::from(REBOOT_FLAG | UNICAST_FLAG) << 24;
    preamble & !allowed == 0
}
