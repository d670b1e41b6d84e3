use super::traits::SomeIpTransport;
use log::debug;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::Result;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Plain unicast socket.
    pub fn new(bind_addr: SocketAddrV4) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr)?;
        debug!(target: "someip::transport", "udp bound to {}", socket.local_addr()?);
        Ok(UdpTransport { socket })
    }

    /// SD socket: bound to `0.0.0.0:port` with address reuse, member of `group` on `interface`,
    /// multicast loopback enabled so nodes on one host see each other.
    pub fn new_multicast(group: Ipv4Addr, interface: Ipv4Addr, port: u16) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket.bind(&bind_addr.into())?;
        socket.join_multicast_v4(&group, &interface)?;
        socket.set_multicast_loop_v4(true)?;
        socket.set_multicast_if_v4(&interface)?;

        let socket: UdpSocket = socket.into();
        debug!(target: "someip::transport", "udp joined {} on {} port {}", group, interface, port);
        Ok(UdpTransport { socket })
    }

    pub fn try_clone(&self) -> Result<Self> {
        Ok(UdpTransport {
            socket: self.socket.try_clone()?,
        })
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.socket.set_nonblocking(nonblocking)
    }
}

impl SomeIpTransport for UdpTransport {
    fn send(&self, data: &[u8], destination: SocketAddrV4) -> Result<usize> {
        #[cfg(feature = "packet-dump")]
        log::trace!(target: "someip::tx", "{} <- {:02x?}", destination, data);
        self.socket.send_to(data, destination)
    }

    fn receive(&self, buffer: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let (len, source) = self.socket.recv_from(buffer)?;
        #[cfg(feature = "packet-dump")]
        log::trace!(target: "someip::rx", "{} -> {:02x?}", source, &buffer[..len]);
        Ok((len, source))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr()
    }
}
