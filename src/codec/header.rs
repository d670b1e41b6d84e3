use super::primitives::{get_u16, get_u32, put_u16, put_u32};

/// Highest method ID; everything above is an event ID.
pub const METHOD_ID_MAX: u16 = 0x7FFF;
pub const EVENT_ID_MIN: u16 = 0x8000;

/// First header field: `[service:16 | method_or_event:16]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MessageId {
    pub service_id: u16,
    pub method_id: u16,
}

impl MessageId {
    pub const fn new(service_id: u16, method_id: u16) -> Self {
        MessageId { service_id, method_id }
    }

    pub fn is_method(&self) -> bool {
        self.method_id <= METHOD_ID_MAX
    }

    pub fn is_event(&self) -> bool {
        self.method_id >= EVENT_ID_MIN
    }

    pub fn as_u32(&self) -> u32 {
        (u32::from(self.service_id) << 16) | u32::from(self.method_id)
    }
}

/// Third header field: `[client:16 | session:16]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RequestId {
    pub client_id: u16,
    pub session_id: u16,
}

impl RequestId {
    pub const fn new(client_id: u16, session_id: u16) -> Self {
        RequestId { client_id, session_id }
    }

    pub fn as_u32(&self) -> u32 {
        (u32::from(self.client_id) << 16) | u32::from(self.session_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Request,
    RequestNoReturn,
    Notification,
    Response,
    Error,
    /// Any byte the protocol does not define. Kept so that decoding stays lossless.
    Unknown(u8),
}

impl MessageType {
    pub fn is_known(&self) -> bool {
        !matches!(self, MessageType::Unknown(_))
    }

    /// Only a REQUEST obliges the receiver to answer.
    pub fn expects_response(&self) -> bool {
        matches!(self, MessageType::Request)
    }
}

impl From<u8> for MessageType {
    fn from(v: u8) -> Self {
        match v {
            0x00 => MessageType::Request,
            0x01 => MessageType::RequestNoReturn,
            0x02 => MessageType::Notification,
            0x80 => MessageType::Response,
            0x81 => MessageType::Error,
            other => MessageType::Unknown(other),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(mt: MessageType) -> u8 {
        match mt {
            MessageType::Request => 0x00,
            MessageType::RequestNoReturn => 0x01,
            MessageType::Notification => 0x02,
            MessageType::Response => 0x80,
            MessageType::Error => 0x81,
            MessageType::Unknown(other) => other,
        }
    }
}

/// Return codes 0x00..=0x0F defined by SOME/IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    Ok,
    NotOk,
    UnknownService,
    UnknownMethod,
    NotReady,
    NotReachable,
    Timeout,
    WrongProtocolVersion,
    WrongInterfaceVersion,
    MalformedMessage,
    WrongMessageType,
    E2eRepeated,
    E2eWrongSequence,
    E2e,
    E2eNotAvailable,
    E2eNoNewData,
    /// Generic (0x10..0x1F) or service specific (0x20..0x5E) codes.
    Other(u8),
}

impl From<u8> for ReturnCode {
    fn from(v: u8) -> Self {
        match v {
            0x00 => ReturnCode::Ok,
            0x01 => ReturnCode::NotOk,
            0x02 => ReturnCode::UnknownService,
            0x03 => ReturnCode::UnknownMethod,
            0x04 => ReturnCode::NotReady,
            0x05 => ReturnCode::NotReachable,
            0x06 => ReturnCode::Timeout,
            0x07 => ReturnCode::WrongProtocolVersion,
            0x08 => ReturnCode::WrongInterfaceVersion,
            0x09 => ReturnCode::MalformedMessage,
            0x0A => ReturnCode::WrongMessageType,
            0x0B => ReturnCode::E2eRepeated,
            0x0C => ReturnCode::E2eWrongSequence,
            0x0D => ReturnCode::E2e,
            0x0E => ReturnCode::E2eNotAvailable,
            0x0F => ReturnCode::E2eNoNewData,
            other => ReturnCode::Other(other),
        }
    }
}

impl From<ReturnCode> for u8 {
    fn from(rc: ReturnCode) -> u8 {
        match rc {
            ReturnCode::Ok => 0x00,
            ReturnCode::NotOk => 0x01,
            ReturnCode::UnknownService => 0x02,
            ReturnCode::UnknownMethod => 0x03,
            ReturnCode::NotReady => 0x04,
            ReturnCode::NotReachable => 0x05,
            ReturnCode::Timeout => 0x06,
            ReturnCode::WrongProtocolVersion => 0x07,
            ReturnCode::WrongInterfaceVersion => 0x08,
            ReturnCode::MalformedMessage => 0x09,
            ReturnCode::WrongMessageType => 0x0A,
            ReturnCode::E2eRepeated => 0x0B,
            ReturnCode::E2eWrongSequence => 0x0C,
            ReturnCode::E2e => 0x0D,
            ReturnCode::E2eNotAvailable => 0x0E,
            ReturnCode::E2eNoNewData => 0x0F,
            ReturnCode::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SomeIpHeader {
    pub message_id: MessageId,
    /// Bytes following the length field: request ID, the four single-byte fields and the payload.
    pub length: u32,
    pub request_id: RequestId,
    pub protocol_version: u8,
    pub interface_version: u8,
    pub message_type: MessageType,
    pub return_code: ReturnCode,
}

impl SomeIpHeader {
    pub const HEADER_LENGTH: usize = 16;
    /// Part of the header counted by the length field.
    pub const HEADER_TAIL_LENGTH: usize = 8;
    /// Part of the header in front of (and including) the length field.
    pub const HEADER_PREFIX_LENGTH: usize = Self::HEADER_LENGTH - Self::HEADER_TAIL_LENGTH;
    pub const SOMEIP_PROTOCOL_VERSION: u8 = 0x01;

    /// Builds a header with `length` left at zero; the message builder fills it in on finalize.
    pub fn new(
        message_id: MessageId,
        request_id: RequestId,
        interface_version: u8,
        message_type: MessageType,
        return_code: ReturnCode,
    ) -> Self {
        SomeIpHeader {
            message_id,
            length: 0,
            request_id,
            protocol_version: Self::SOMEIP_PROTOCOL_VERSION,
            interface_version,
            message_type,
            return_code,
        }
    }

    /// Copies the addressing fields of `request` into a reply header.
    pub fn reply_to(request: &SomeIpHeader, message_type: MessageType, return_code: ReturnCode) -> Self {
        SomeIpHeader {
            length: 0,
            message_type,
            return_code,
            ..*request
        }
    }

    /// Datagram size announced by the length field.
    pub fn total_length(&self) -> usize {
        self.length as usize + Self::HEADER_PREFIX_LENGTH
    }

    /// Packs the last four single-byte fields the way the diagnostics sink expects them.
    pub fn flags_word(&self) -> u32 {
        (u32::from(u8::from(self.message_type)) << 24)
            | (u32::from(u8::from(self.return_code)) << 16)
            | (u32::from(self.protocol_version) << 8)
            | u32::from(self.interface_version)
    }

    pub fn serialize(&self) -> [u8; 16] {
        let mut buffer = [0u8; 16];

        put_u16(&mut buffer, 0, self.message_id.service_id);
        put_u16(&mut buffer, 2, self.message_id.method_id);
        put_u32(&mut buffer, 4, self.length);
        put_u16(&mut buffer, 8, self.request_id.client_id);
        put_u16(&mut buffer, 10, self.request_id.session_id);
        buffer[12] = self.protocol_version;
        buffer[13] = self.interface_version;
        buffer[14] = self.message_type.into();
        buffer[15] = self.return_code.into();

        buffer
    }

    /// Decodes the 16 header bytes. Every byte pattern yields a header; use
    /// [`validate`](crate::codec::validate::validate) to check it.
    pub fn deserialize(buffer: &[u8; 16]) -> Self {
        SomeIpHeader {
            message_id: MessageId::new(get_u16(buffer, 0), get_u16(buffer, 2)),
            length: get_u32(buffer, 4),
            request_id: RequestId::new(get_u16(buffer, 8), get_u16(buffer, 10)),
            protocol_version: buffer[12],
            interface_version: buffer[13],
            message_type: buffer[14].into(),
            return_code: buffer[15].into(),
        }
    }

    /// Decodes the header from the front of `buffer`, `None` if fewer than 16 bytes are present.
    pub fn parse(buffer: &[u8]) -> Option<Self> {
        buffer.first_chunk::<16>().map(Self::deserialize)
    }
}
