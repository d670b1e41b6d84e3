//! Classification of inbound SOME/IP messages.
//!
//! [`dispatch`] decides from the header alone whether a handler may run, whether the sender
//! expects an answer and what the answer is when the message cannot be served. Service and method
//! lookup happen afterwards in [`process_unicast`](super::process::process_unicast).

use crate::codec::validate::validate;
use crate::codec::{HeaderError, MessageType, ReturnCode, SessionHandling, SomeIpHeader};

/// Which stage rejected a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchFailure {
    /// A header field violates its rule.
    Syntactic(HeaderError),
    /// Method/event ID does not fit the message type.
    Semantic,
    /// Message type no valid header can carry.
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStatus {
    pub call_handler: bool,
    pub send_response: bool,
    pub error: bool,
    pub error_message_type: MessageType,
    pub error_return_code: ReturnCode,
    pub failure: Option<DispatchFailure>,
}

impl Default for DispatchStatus {
    fn default() -> Self {
        DispatchStatus {
            call_handler: false,
            send_response: false,
            error: false,
            error_message_type: MessageType::Error,
            error_return_code: ReturnCode::Ok,
            failure: None,
        }
    }
}

impl DispatchStatus {
    /// The message failed and the sender cannot be told.
    pub fn is_silent_failure(&self) -> bool {
        self.error && !self.send_response
    }

    fn fail(&mut self, failure: DispatchFailure, return_code: ReturnCode) {
        self.call_handler = false;
        self.error = true;
        self.error_message_type = MessageType::Error;
        self.error_return_code = return_code;
        self.failure = Some(failure);
    }
}

pub fn dispatch(header: &SomeIpHeader, handling: SessionHandling) -> DispatchStatus {
    let mut status = DispatchStatus {
        send_response: header.message_type.expects_response(),
        ..Default::default()
    };

    if let Err(e) = validate(header, handling) {
        status.fail(DispatchFailure::Syntactic(e), ReturnCode::MalformedMessage);
        return status;
    }

    let id = header.message_id;
    match header.message_type {
        MessageType::Request
        | MessageType::RequestNoReturn
        | MessageType::Response
        | MessageType::Error => {
            status.call_handler = id.is_method();
        }
        MessageType::Notification => {
            status.call_handler = id.is_event();
        }
        MessageType::Unknown(_) => {
            status.send_response = false;
            status.fail(DispatchFailure::Unreachable, ReturnCode::WrongMessageType);
            return status;
        }
    }

    if !status.call_handler {
        status.fail(DispatchFailure::Semantic, ReturnCode::WrongMessageType);
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{MessageId, RequestId};

    fn header(method_id: u16, message_type: MessageType) -> SomeIpHeader {
        SomeIpHeader::new(
            MessageId::new(0x0007, method_id),
            RequestId::new(0x0001, 0x0001),
            1,
            message_type,
            ReturnCode::Ok,
        )
    }

    #[test]
    fn test_request_to_method_calls_handler() {
        let status = dispatch(&header(0x0002, MessageType::Request), SessionHandling::Enabled);
        assert!(status.call_handler && status.send_response && !status.error);
    }

    #[test]
    fn test_request_to_event_is_wrong_message_type() {
        let status = dispatch(&header(0x8001, MessageType::Request), SessionHandling::Enabled);
        assert!(status.error && status.send_response && !status.call_handler);
        assert_eq!(status.error_message_type, MessageType::Error);
        assert_eq!(status.error_return_code, ReturnCode::WrongMessageType);
        assert!(!status.is_silent_failure());
    }

    #[test]
    fn test_notification_to_method_is_silent_failure() {
        let status = dispatch(&header(0x0002, MessageType::Notification), SessionHandling::Enabled);
        assert!(status.error && !status.send_response);
        assert!(status.is_silent_failure());
        assert_eq!(status.failure, Some(DispatchFailure::Semantic));

        let event = dispatch(&header(0x8002, MessageType::Notification), SessionHandling::Enabled);
        assert!(event.call_handler && !event.error);
    }

    #[test]
    fn test_fire_and_forget_needs_method_range() {
        for message_type in [MessageType::RequestNoReturn, MessageType::Response] {
            let ok = dispatch(&header(0x0002, message_type), SessionHandling::Enabled);
            assert!(ok.call_handler && !ok.send_response);

            let bad = dispatch(&header(0x9000, message_type), SessionHandling::Enabled);
            assert!(bad.is_silent_failure());
        }
    }

    #[test]
    fn test_malformed_request_still_gets_an_answer() {
        let mut request = header(0x0002, MessageType::Request);
        request.protocol_version = 2;

        let status = dispatch(&request, SessionHandling::Enabled);
        assert!(status.error && status.send_response);
        assert_eq!(status.error_return_code, ReturnCode::MalformedMessage);
        assert_eq!(
            status.failure,
            Some(DispatchFailure::Syntactic(HeaderError::WrongProtocolVersion(2)))
        );
    }

    #[test]
    fn test_unknown_message_type_fails_without_response() {
        let request = header(0x0002, MessageType::Unknown(0x42));
        let status = dispatch(&request, SessionHandling::Enabled);
        assert!(status.is_silent_failure());
        assert!(matches!(status.failure, Some(DispatchFailure::Syntactic(_))));
    }
}
