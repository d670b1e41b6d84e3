//! # Local Services
//!
//! Services this node provides, looked up by the rx path for every inbound request.
//!
//! A method is served by a [`MethodHandler`]; plain closures implement it:
//!
//! ```
//! use someip_stack::codec::ReturnCode;
//! use someip_stack::message::MessageBuilder;
//! use someip_stack::service::{LocalServiceRegistry, Request};
//! use std::sync::Arc;
//!
//! let mut registry = LocalServiceRegistry::new(8, 8);
//! registry.add_service(0x1234, 1, 1, 5005).unwrap();
//! registry
//!     .add_method(0x1234, 0x0001, Arc::new(|request: &Request<'_>, response: &mut MessageBuilder| {
//!         match response.put(request.payload) {
//!             Ok(()) => ReturnCode::Ok,
//!             Err(_) => ReturnCode::NotOk,
//!         }
//!     }))
//!     .unwrap();
//! assert!(registry.find_service(0x1234).and_then(|s| s.find_method(0x0001)).is_some());
//! ```

pub mod registry;

pub use registry::*;

use crate::codec::{ReturnCode, SomeIpHeader};
use crate::message::MessageBuilder;
use std::net::SocketAddr;

/// An inbound request as seen by a method handler.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub header: SomeIpHeader,
    pub payload: &'a [u8],
    pub source: SocketAddr,
}

/// Serves one method of a local service.
///
/// The handler writes its response payload into `response` and returns the return code placed
/// in the response header. For fire-and-forget requests and notifications `response` is a
/// [detached](MessageBuilder::detached) builder that refuses every write.
pub trait MethodHandler: Send + Sync {
    fn handle(&self, request: &Request<'_>, response: &mut MessageBuilder) -> ReturnCode;
}

impl<F> MethodHandler for F
where
    F: Fn(&Request<'_>, &mut MessageBuilder) -> ReturnCode + Send + Sync,
{
    fn handle(&self, request: &Request<'_>, response: &mut MessageBuilder) -> ReturnCode {
        self(request, response)
    }
}
