use super::dispatcher::{DispatchFailure, DispatchStatus, dispatch};
use crate::codec::{MessageType, ReturnCode, SessionHandling, SomeIpHeader};
use crate::diagnostics::{DiagnosticSink, ErrorKind, header_fields};
use crate::message::{BuildError, MessageBuilder, PoolError, TxPool};
use crate::service::{LocalServiceRegistry, Request};
use crate::transport::SomeIpTransport;
use log::{debug, warn};
use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("datagram of {0} bytes is shorter than a SOME/IP header")]
    TooShort(usize),
    #[error("length field announces {announced} bytes, datagram has {actual}")]
    LengthMismatch { announced: usize, actual: usize },
    #[error("no IPv4 route back to {0}")]
    UnsupportedSource(SocketAddr),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("response send failed: {0}")]
    Io(#[from] io::Error),
}

/// What happened to one inbound datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxOutcome {
    pub status: DispatchStatus,
    /// Code placed in the response, or the code that would have been sent.
    pub return_code: ReturnCode,
    pub handler_called: bool,
    /// Bytes of the RESPONSE/ERROR datagram that was sent.
    pub response_len: Option<usize>,
}

/// Everything the rx path touches besides the datagram itself.
pub struct RxContext<'a> {
    pub registry: &'a LocalServiceRegistry,
    pub pool: &'a mut TxPool,
    pub transport: &'a dyn SomeIpTransport,
    pub diag: &'a mut dyn DiagnosticSink,
    pub handling: SessionHandling,
}

/// Checks the framing of a SOME/IP datagram and splits off the payload.
pub fn parse_datagram(data: &[u8]) -> Result<(SomeIpHeader, &[u8]), ProcessError> {
    let header = SomeIpHeader::parse(data).ok_or(ProcessError::TooShort(data.len()))?;
    let announced = header.total_length();
    if announced != data.len() {
        return Err(ProcessError::LengthMismatch {
            announced,
            actual: data.len(),
        });
    }
    Ok((header, &data[SomeIpHeader::HEADER_LENGTH..]))
}

/// Handles one datagram received on the unicast socket: classify, look up the service, run the
/// handler and answer if the sender expects it. Only an answer takes a tx slot, and that slot is
/// always returned to the pool.
pub fn process_unicast(
    ctx: &mut RxContext<'_>,
    data: &[u8],
    source: SocketAddr,
) -> Result<RxOutcome, ProcessError> {
    let (header, payload) = parse_datagram(data).map_err(|e| {
        ctx.diag.report(ErrorKind::UdpRxError, [data.len() as u32, 0, 0, 0, 0, 0]);
        debug!(target: "someip::rx", "dropping datagram from {}: {}", source, e);
        e
    })?;

    let status = dispatch(&header, ctx.handling);
    let mut outcome = RxOutcome {
        status,
        return_code: ReturnCode::Ok,
        handler_called: false,
        response_len: None,
    };

    if status.error {
        let kind = match status.failure {
            Some(DispatchFailure::Syntactic(_)) => ErrorKind::RequestHeaderSyntactic,
            Some(DispatchFailure::Semantic) => ErrorKind::RequestHeaderSemantic,
            _ => ErrorKind::Unreachable,
        };
        ctx.diag.report(kind, header_fields(&header));
        return answer_error(ctx, &header, status.error_return_code, source, outcome);
    }

    let registry = ctx.registry;
    let Some(service) = registry.find_service(header.message_id.service_id) else {
        ctx.diag.report(ErrorKind::LocalServiceNotFound, header_fields(&header));
        return answer_error(ctx, &header, ReturnCode::UnknownService, source, outcome);
    };
    if registry
        .find_service_matching(header.message_id.service_id, None, Some(header.interface_version))
        .is_none()
    {
        let mut fields = header_fields(&header);
        fields[4] = u32::from(service.interface_version);
        ctx.diag.report(ErrorKind::LocalServiceInterfaceMismatch, fields);
        return answer_error(ctx, &header, ReturnCode::WrongInterfaceVersion, source, outcome);
    }
    let Some(handler) = service.find_method(header.message_id.method_id) else {
        ctx.diag.report(ErrorKind::LocalServiceUnknownMethod, header_fields(&header));
        return answer_error(ctx, &header, ReturnCode::UnknownMethod, source, outcome);
    };

    let request = Request {
        header,
        payload,
        source,
    };
    if !status.send_response {
        outcome.return_code = handler.handle(&request, &mut MessageBuilder::detached());
        outcome.handler_called = true;
        return Ok(outcome);
    }

    let mut builder = MessageBuilder::init(ctx.pool).map_err(|e| {
        ctx.diag.report(ErrorKind::TxPoolExhausted, header_fields(&header));
        warn!(target: "someip::pool", "no tx buffer for {:04x}.{:04x}", header.message_id.service_id, header.message_id.method_id);
        e
    })?;
    outcome.return_code = handler.handle(&request, &mut builder);
    outcome.handler_called = true;

    let mut response = SomeIpHeader::reply_to(&header, MessageType::Response, outcome.return_code);
    let sent = send_built(ctx, &mut builder, &mut response, source, ResponseKinds::RESPONSE);
    release(ctx, &mut builder, &header, ErrorKind::ResponseInvalidateFail)?;

    outcome.response_len = Some(sent?);
    Ok(outcome)
}

/// Sends an ERROR message if the sender waits for one, otherwise escalates the silent failure.
fn answer_error(
    ctx: &mut RxContext<'_>,
    request: &SomeIpHeader,
    return_code: ReturnCode,
    source: SocketAddr,
    mut outcome: RxOutcome,
) -> Result<RxOutcome, ProcessError> {
    outcome.return_code = return_code;
    if !outcome.status.send_response {
        ctx.diag.report(ErrorKind::RequestFailedWithoutResponse, header_fields(request));
        return Ok(outcome);
    }

    let mut builder = MessageBuilder::init(ctx.pool).map_err(|e| {
        ctx.diag.report(ErrorKind::TxPoolExhausted, header_fields(request));
        e
    })?;
    let mut response = SomeIpHeader::reply_to(request, MessageType::Error, return_code);
    response.protocol_version = SomeIpHeader::SOMEIP_PROTOCOL_VERSION;

    let sent = send_built(ctx, &mut builder, &mut response, source, ResponseKinds::ERROR);
    release(ctx, &mut builder, request, ErrorKind::TxMessageInvalidateFail)?;

    outcome.response_len = Some(sent?);
    Ok(outcome)
}

/// Diagnostic codes for the finalize and send steps of one kind of answer.
struct ResponseKinds {
    finalize: ErrorKind,
    send: ErrorKind,
}

impl ResponseKinds {
    const RESPONSE: ResponseKinds = ResponseKinds {
        finalize: ErrorKind::ResponseFinalizeFail,
        send: ErrorKind::ResponseUdpTxFail,
    };
    const ERROR: ResponseKinds = ResponseKinds {
        finalize: ErrorKind::FinalizeFail,
        send: ErrorKind::UdpTxFail,
    };
}

fn send_built(
    ctx: &mut RxContext<'_>,
    builder: &mut MessageBuilder,
    response: &mut SomeIpHeader,
    source: SocketAddr,
    kinds: ResponseKinds,
) -> Result<usize, ProcessError> {
    if let Err(e) = response.validate(ctx.handling) {
        ctx.diag.report(ErrorKind::ResponseHeaderInvalid, header_fields(response));
        return Err(BuildError::Header(e).into());
    }
    let total = builder.finalize(response, ctx.handling).map_err(|e| {
        ctx.diag.report(kinds.finalize, header_fields(response));
        e
    })?;

    let SocketAddr::V4(destination) = source else {
        ctx.diag.report(kinds.send, header_fields(response));
        return Err(ProcessError::UnsupportedSource(source));
    };
    send_to(ctx, builder.as_bytes(), destination).map_err(|e| {
        ctx.diag.report(kinds.send, header_fields(response));
        e
    })?;

    debug!(target: "someip::rx", "{:?} {:?} -> {} ({} bytes)",
        response.message_type, response.return_code, destination, total);
    Ok(total)
}

fn send_to(ctx: &RxContext<'_>, bytes: &[u8], destination: SocketAddrV4) -> Result<usize, ProcessError> {
    Ok(ctx.transport.send(bytes, destination)?)
}

fn release(
    ctx: &mut RxContext<'_>,
    builder: &mut MessageBuilder,
    request: &SomeIpHeader,
    kind: ErrorKind,
) -> Result<(), ProcessError> {
    builder.invalidate(ctx.pool).map_err(|e| {
        ctx.diag.report(kind, header_fields(request));
        e.into()
    })
}
