use crate::codec::primitives::{get_u16, get_u32, put_u16, put_u32};
use std::net::{Ipv4Addr, SocketAddrV4};

pub const TRANSPORT_UDP: u8 = 0x11;
pub const TRANSPORT_TCP: u8 = 0x06;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionType {
    #[default]
    Ipv4Endpoint,
    Ipv4Multicast,
    Ipv4SdEndpoint,
    Other(u8),
}

impl From<u8> for OptionType {
    fn from(v: u8) -> Self {
        match v {
            0x04 => OptionType::Ipv4Endpoint,
            0x14 => OptionType::Ipv4Multicast,
            0x24 => OptionType::Ipv4SdEndpoint,
            other => OptionType::Other(other),
        }
    }
}

impl From<OptionType> for u8 {
    fn from(ot: OptionType) -> u8 {
        match ot {
            OptionType::Ipv4Endpoint => 0x04,
            OptionType::Ipv4Multicast => 0x14,
            OptionType::Ipv4SdEndpoint => 0x24,
            OptionType::Other(other) => other,
        }
    }
}

/// 12-byte IPv4 Endpoint Option:
/// `[Len:2][Type:1][Discardable:1|Res:7][IPv4:4][Res:1][L4:1][Port:2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4EndpointOption {
    /// Bytes after the type field, 0x0009 for this option.
    pub length: u16,
    pub option_type: OptionType,
    pub discardable: bool,
    pub address: Ipv4Addr,
    pub transport_proto: u8,
    pub port: u16,
}

impl Default for Ipv4EndpointOption {
    fn default() -> Self {
        Ipv4EndpointOption {
            length: Self::LENGTH_FIELD,
            option_type: OptionType::Ipv4Endpoint,
            discardable: false,
            address: Ipv4Addr::UNSPECIFIED,
            transport_proto: TRANSPORT_UDP,
            port: 0,
        }
    }
}

impl Ipv4EndpointOption {
    pub const LENGTH: usize = 12;
    pub const LENGTH_FIELD: u16 = 0x0009;

    /// Only IPv4 endpoint options can be built; other types give `None`.
    pub fn new(option_type: OptionType, address: Ipv4Addr, transport_proto: u8, port: u16) -> Option<Self> {
        if option_type != OptionType::Ipv4Endpoint {
            return None;
        }
        Some(Ipv4EndpointOption {
            address,
            transport_proto,
            port,
            ..Default::default()
        })
    }

    pub fn udp(endpoint: SocketAddrV4) -> Self {
        Ipv4EndpointOption {
            address: *endpoint.ip(),
            port: endpoint.port(),
            ..Default::default()
        }
    }

    pub fn endpoint(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.address, self.port)
    }

    pub fn serialize(&self) -> [u8; 12] {
        let mut buf = [0u8; 12];
        put_u16(&mut buf, 0, self.length);
        buf[2] = self.option_type.into();
        buf[3] = if self.discardable { 0x80 } else { 0x00 };
        put_u32(&mut buf, 4, u32::from(self.address));
        buf[9] = self.transport_proto;
        put_u16(&mut buf, 10, self.port);
        buf
    }

    pub fn deserialize(buf: &[u8; 12]) -> Self {
        Ipv4EndpointOption {
            length: get_u16(buf, 0),
            option_type: buf[2].into(),
            discardable: buf[3] & 0x80 != 0,
            address: Ipv4Addr::from(get_u32(buf, 4)),
            transport_proto: buf[9],
            port: get_u16(buf, 10),
        }
    }
}
