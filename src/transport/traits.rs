use std::io::Result;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;

/// Datagram channel the stack sends through and receives from.
/// Object-safe so sockets and test doubles can be swapped behind a `Box<dyn SomeIpTransport>`.
pub trait SomeIpTransport: Send + Sync {
    /// Send one datagram to `destination`. Returns the number of bytes handed to the network.
    fn send(&self, data: &[u8], destination: SocketAddrV4) -> Result<usize>;

    /// Receive one datagram.
    /// Returns the number of bytes read and the source address; `WouldBlock` when nothing is queued
    /// on a non-blocking channel.
    fn receive(&self, buffer: &mut [u8]) -> Result<(usize, SocketAddr)>;

    fn local_addr(&self) -> Result<SocketAddr>;
}

impl<T: SomeIpTransport + ?Sized> SomeIpTransport for Arc<T> {
    fn send(&self, data: &[u8], destination: SocketAddrV4) -> Result<usize> {
        (**self).send(data, destination)
    }

    fn receive(&self, buffer: &mut [u8]) -> Result<(usize, SocketAddr)> {
        (**self).receive(buffer)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        (**self).local_addr()
    }
}
