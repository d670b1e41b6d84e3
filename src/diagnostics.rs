//! Error report sink shared by the SOME/IP and SD paths.
//!
//! Reports never interrupt processing. The default sink keeps them in a fixed-size buffer and
//! forgets anything that arrives after it is full.

use crate::codec::SomeIpHeader;
use log::{error, warn};

/// Diagnostic codes. The numeric values are stable and appear in exported reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorKind {
    None = 0,
    RequestHeaderSyntactic = 1,
    RequestHeaderSemantic = 2,
    RequestFailedWithoutResponse = 3,
    LocalServiceNotFound = 4,
    LocalServiceInterfaceMismatch = 5,
    LocalServiceUnknownMethod = 6,
    FinalizeFail = 7,
    UdpTxFail = 8,
    TxMessageInvalidateFail = 9,
    ResponseHeaderInvalid = 10,
    ResponseFinalizeFail = 11,
    ResponseUdpTxFail = 12,
    ResponseInvalidateFail = 13,
    SdPortFallback = 14,
    InvalidTxHandler = 15,
    Unreachable = 16,
    UdpRxError = 17,
    TxPoolExhausted = 18,
    SdOptionTypeInvalid = 23,
}

impl ErrorKind {
    /// Defects and conditions nobody can be told about. Everything else is a degraded-but-normal path.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::RequestFailedWithoutResponse
                | ErrorKind::FinalizeFail
                | ErrorKind::TxMessageInvalidateFail
                | ErrorKind::ResponseFinalizeFail
                | ErrorKind::ResponseInvalidateFail
                | ErrorKind::InvalidTxHandler
                | ErrorKind::Unreachable
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub fields: [u32; 6],
}

pub trait DiagnosticSink: Send {
    fn report(&mut self, kind: ErrorKind, fields: [u32; 6]);
}

/// Header context in the layout the report consumers decode.
pub fn header_fields(header: &SomeIpHeader) -> [u32; 6] {
    [
        header.message_id.as_u32(),
        header.request_id.as_u32(),
        header.flags_word(),
        header.length,
        0,
        0,
    ]
}

pub const DEFAULT_REPORT_CAPACITY: usize = 255;

#[derive(Debug, Clone)]
pub struct ErrorReportBuffer {
    reports: Vec<ErrorReport>,
    capacity: usize,
}

impl ErrorReportBuffer {
    pub fn new(capacity: usize) -> Self {
        ErrorReportBuffer {
            reports: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn reports(&self) -> &[ErrorReport] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.reports.len() >= self.capacity
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.reports.iter().filter(|r| r.kind == kind).count()
    }

    pub fn clear(&mut self) {
        self.reports.clear();
    }
}

impl Default for ErrorReportBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_CAPACITY)
    }
}

impl DiagnosticSink for ErrorReportBuffer {
    fn report(&mut self, kind: ErrorKind, fields: [u32; 6]) {
        if kind.is_fatal() {
            error!(target: "someip::diag", "{:?} ({}) {:08x?}", kind, kind as u8, fields);
        } else {
            warn!(target: "someip::diag", "{:?} ({}) {:08x?}", kind, kind as u8, fields);
        }

        if self.is_full() {
            return;
        }
        self.reports.push(ErrorReport { kind, fields });
    }
}
