use super::traits::SomeIpTransport;
use std::collections::VecDeque;
use std::io::{Error, ErrorKind, Result};
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory transport. Records every sent datagram and replays queued inbound ones, which makes
/// the stack drivable without sockets.
pub struct RecordingTransport {
    local: SocketAddrV4,
    sent: Mutex<Vec<(Vec<u8>, SocketAddrV4)>>,
    inbox: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
    fail_sends: AtomicBool,
}

impl RecordingTransport {
    pub fn new(local: SocketAddrV4) -> Self {
        RecordingTransport {
            local,
            sent: Mutex::new(Vec::new()),
            inbox: Mutex::new(VecDeque::new()),
            fail_sends: AtomicBool::new(false),
        }
    }

    /// Queue a datagram for the next `receive`.
    pub fn push_inbound(&self, data: &[u8], source: SocketAddr) {
        if let Ok(mut inbox) = self.inbox.lock() {
            inbox.push_back((data.to_vec(), source));
        }
    }

    /// Everything sent so far, oldest first.
    pub fn sent(&self) -> Vec<(Vec<u8>, SocketAddrV4)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn take_sent(&self) -> Vec<(Vec<u8>, SocketAddrV4)> {
        self.sent
            .lock()
            .map(|mut sent| std::mem::take(&mut *sent))
            .unwrap_or_default()
    }

    /// Make every following `send` fail with `BrokenPipe`.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::Relaxed);
    }
}

impl SomeIpTransport for RecordingTransport {
    fn send(&self, data: &[u8], destination: SocketAddrV4) -> Result<usize> {
        if self.fail_sends.load(Ordering::Relaxed) {
            return Err(Error::new(ErrorKind::BrokenPipe, "send disabled"));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| Error::other("recording transport poisoned"))?;
        sent.push((data.to_vec(), destination));
        Ok(data.len())
    }

    fn receive(&self, buffer: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let mut inbox = self
            .inbox
            .lock()
            .map_err(|_| Error::other("recording transport poisoned"))?;
        let (data, source) = inbox
            .pop_front()
            .ok_or_else(|| Error::from(ErrorKind::WouldBlock))?;
        let len = data.len().min(buffer.len());
        buffer[..len].copy_from_slice(&data[..len]);
        Ok((len, source))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(SocketAddr::V4(self.local))
    }
}
