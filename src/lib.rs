pub mod codec;
pub mod diagnostics;
pub mod logging;
pub mod message;
pub mod runtime;
pub mod sd;
pub mod service;
pub mod transport;

pub use codec::{
    HeaderError, MessageId, MessageType, RequestId, ReturnCode, SessionHandling, SomeIpDeserialize,
    SomeIpHeader, SomeIpSerialize,
};
pub use diagnostics::{DiagnosticSink, ErrorKind, ErrorReport, ErrorReportBuffer};
pub use message::{MessageBuilder, TxPool};
pub use runtime::{RuntimeError, SomeIpRuntime};
pub use sd::{RemoteService, ServiceDiscovery, ServiceOffer};
pub use service::{LocalServiceRegistry, MethodHandler, Request};
pub use transport::{RecordingTransport, SomeIpTransport, UdpTransport};
