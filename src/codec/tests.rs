#[cfg(test)]
mod tests {
    use crate::codec::header::{MessageId, MessageType, RequestId, ReturnCode, SomeIpHeader};
    use crate::codec::session::SessionHandling;
    use crate::codec::traits::{SomeIpDeserialize, SomeIpSerialize};
    use crate::codec::validate::{self, HeaderError};
    use std::io::Cursor;

    fn request_header() -> SomeIpHeader {
        SomeIpHeader::new(
            MessageId::new(0x1234, 0x5678),
            RequestId::new(0x0001, 0x0002),
            0x03,
            MessageType::Request,
            ReturnCode::Ok,
        )
    }

    #[test]
    fn test_header_serialization_layout() {
        let mut header = request_header();
        header.length = 108;
        let bytes = header.serialize();

        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes[0..2], [0x12, 0x34]);
        assert_eq!(bytes[2..4], [0x56, 0x78]);
        assert_eq!(bytes[4..8], [0, 0, 0, 108]);
        assert_eq!(bytes[8..10], [0x00, 0x01]);
        assert_eq!(bytes[10..12], [0x00, 0x02]);
        assert_eq!(bytes[12], 0x01);
        assert_eq!(bytes[13], 0x03);
        assert_eq!(bytes[14], 0x00);
        assert_eq!(bytes[15], 0x00);
    }

    #[test]
    fn test_header_round_trip_keeps_unknown_codes() {
        let mut header = request_header();
        header.message_type = MessageType::Unknown(0x42);
        header.return_code = ReturnCode::Other(0x21);
        header.length = 0xDEAD_BEEF;

        let decoded = SomeIpHeader::deserialize(&header.serialize());
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_header_round_trip_over_codes_and_id_ranges() {
        for byte in 0..=u8::MAX {
            assert_eq!(u8::from(MessageType::from(byte)), byte);
            assert_eq!(u8::from(ReturnCode::from(byte)), byte);
        }

        let ids = [0x0000, 0x0001, 0x7FFF, 0x8000, 0xFFFE, 0xFFFF];
        let types = [
            MessageType::Request,
            MessageType::RequestNoReturn,
            MessageType::Notification,
            MessageType::Response,
            MessageType::Error,
        ];
        for service_id in ids {
            for method_id in ids {
                for message_type in types {
                    for code in 0x00..=0x0F {
                        let mut header = SomeIpHeader::new(
                            MessageId::new(service_id, method_id),
                            RequestId::new(method_id, service_id),
                            0xFF,
                            message_type,
                            ReturnCode::from(code),
                        );
                        header.length = (u32::from(method_id) << 16) | u32::from(service_id);
                        assert_eq!(SomeIpHeader::deserialize(&header.serialize()), header);
                    }
                }
            }
        }
    }

    #[test]
    fn test_parse_rejects_short_buffer() {
        assert!(SomeIpHeader::parse(&[0u8; 15]).is_none());
        assert!(SomeIpHeader::parse(&[0u8; 20]).is_some());
    }

    #[test]
    fn test_validate_accepts_request() {
        assert_eq!(validate::validate(&request_header(), SessionHandling::Enabled), Ok(()));
    }

    #[test]
    fn test_validate_session_rules() {
        let mut header = request_header();
        header.request_id.session_id = 0;
        assert!(matches!(
            validate::validate(&header, SessionHandling::Enabled),
            Err(HeaderError::InvalidRequestId(_))
        ));
        assert_eq!(validate::validate(&header, SessionHandling::Disabled), Ok(()));
    }

    #[test]
    fn test_validate_protocol_version() {
        let mut header = request_header();
        header.protocol_version = 2;
        assert_eq!(
            validate::validate(&header, SessionHandling::Enabled),
            Err(HeaderError::WrongProtocolVersion(2))
        );
    }

    #[test]
    fn test_return_code_depends_on_message_type() {
        assert!(validate::check_return_code(MessageType::Request, ReturnCode::Ok));
        assert!(!validate::check_return_code(MessageType::Request, ReturnCode::NotOk));
        assert!(!validate::check_return_code(MessageType::Notification, ReturnCode::UnknownMethod));
        assert!(validate::check_return_code(MessageType::Response, ReturnCode::NotReady));
        assert!(validate::check_return_code(MessageType::Response, ReturnCode::Ok));
        assert!(validate::check_return_code(MessageType::Error, ReturnCode::UnknownService));
        assert!(!validate::check_return_code(MessageType::Error, ReturnCode::Ok));
    }

    #[test]
    fn test_unknown_message_type_fails_before_return_code() {
        let mut header = request_header();
        header.message_type = MessageType::Unknown(0x33);
        assert_eq!(
            validate::validate(&header, SessionHandling::Enabled),
            Err(HeaderError::InvalidMessageType(MessageType::Unknown(0x33)))
        );
    }

    #[test]
    fn test_setters_refuse_invalid_values() {
        let mut header = request_header();
        assert!(header.set_protocol_version(7).is_err());
        assert_eq!(header.protocol_version, 1);

        assert!(header.set_message_type(MessageType::Error).is_ok());
        assert!(header.set_return_code(ReturnCode::Ok).is_err());
        assert!(header.set_return_code(ReturnCode::UnknownMethod).is_ok());
        assert_eq!(header.return_code, ReturnCode::UnknownMethod);
    }

    #[test]
    fn test_reply_header_copies_addressing() {
        let request = request_header();
        let reply = SomeIpHeader::reply_to(&request, MessageType::Error, ReturnCode::UnknownService);
        assert_eq!(reply.message_id, request.message_id);
        assert_eq!(reply.request_id, request.request_id);
        assert_eq!(reply.interface_version, request.interface_version);
        assert_eq!(reply.length, 0);
        assert_eq!(reply.message_type, MessageType::Error);
    }

    #[test]
    fn test_primitive_payload_serialization() {
        let mut buf = Vec::new();
        0xDEADBEEFu32.serialize(&mut buf).unwrap();
        (-2i16).serialize(&mut buf).unwrap();
        true.serialize(&mut buf).unwrap();
        assert_eq!(buf, vec![0xDE, 0xAD, 0xBE, 0xEF, 0xFF, 0xFE, 0x01]);

        let mut reader = Cursor::new(buf);
        assert_eq!(u32::deserialize(&mut reader).unwrap(), 0xDEADBEEF);
        assert_eq!(i16::deserialize(&mut reader).unwrap(), -2);
        assert!(bool::deserialize(&mut reader).unwrap());
        assert!(u8::deserialize(&mut reader).is_err());
    }
}
