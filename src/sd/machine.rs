use super::entries::{EntryType, ServiceEntry, TTL_MAX};
use super::options::Ipv4EndpointOption;
use super::packet::{SD_DEFAULT_PORT, SdHeader};
use super::parser::{self, EntryAction, ReceivedServices, SdError};
use super::registry::{RemoteService, RemoteServiceRegistry};
use crate::codec::primitives::put_u32;
use crate::codec::{SessionCounter, SessionHandling};
use crate::diagnostics::{DiagnosticSink, ErrorKind, header_fields};
use crate::message::{BuildError, MessageBuilder, PoolError, TxPool};
use crate::runtime::config::SdConfig;
use crate::transport::SomeIpTransport;
use log::{debug, info, warn};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("local address {0} equals the sd multicast address")]
    AddressConflict(Ipv4Addr),
    #[error(transparent)]
    Parse(#[from] SdError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("sd send failed: {0}")]
    Io(#[from] io::Error),
}

/// A local service instance as announced in Offer entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOffer {
    pub service_id: u16,
    pub instance_id: u16,
    pub major_version: u8,
    pub minor_version: u32,
    /// Where requests for the service go.
    pub endpoint: SocketAddrV4,
}

impl ServiceOffer {
    /// True if a Find entry asks for this instance (0xFFFF matches any instance).
    pub fn answers(&self, find: &ServiceEntry) -> bool {
        find.entry_type == EntryType::FindService
            && find.service_id == self.service_id
            && (find.instance_id == 0xFFFF || find.instance_id == self.instance_id)
    }
}

/// Process-wide SD state: addresses, session counters, reboot flag and the remote service cache.
pub struct ServiceDiscovery {
    transport: Box<dyn SomeIpTransport>,
    local_addr: Ipv4Addr,
    multicast_addr: Ipv4Addr,
    port: u16,
    multicast_session: SessionCounter,
    unicast_session: SessionCounter,
    reboot: bool,
    offer_ttl: u32,
    registry: RemoteServiceRegistry,
    received: ReceivedServices,
}

impl ServiceDiscovery {
    pub fn new(
        transport: Box<dyn SomeIpTransport>,
        local_addr: Ipv4Addr,
        config: &SdConfig,
        diag: &mut dyn DiagnosticSink,
    ) -> Result<Self, DiscoveryError> {
        if local_addr == config.multicast_ip {
            return Err(DiscoveryError::AddressConflict(local_addr));
        }

        let port = if config.port == 0 {
            warn!(target: "someip::sd", "sd port 0 configured, using {}", SD_DEFAULT_PORT);
            diag.report(ErrorKind::SdPortFallback, [0, u32::from(SD_DEFAULT_PORT), 0, 0, 0, 0]);
            SD_DEFAULT_PORT
        } else {
            config.port
        };

        // The wire field is 24 bits wide
        let offer_ttl = config.offer_ttl.min(TTL_MAX);
        if offer_ttl != config.offer_ttl {
            warn!(target: "someip::sd", "offer ttl {} exceeds 0x{:06x}, clamping", config.offer_ttl, TTL_MAX);
        }

        info!(target: "someip::sd", "sd on {} group {}:{}", local_addr, config.multicast_ip, port);
        Ok(ServiceDiscovery {
            transport,
            local_addr,
            multicast_addr: config.multicast_ip,
            port,
            multicast_session: SessionCounter::new(SessionHandling::Enabled),
            unicast_session: SessionCounter::new(SessionHandling::Enabled),
            reboot: true,
            offer_ttl,
            registry: RemoteServiceRegistry::new(config.max_remote_services),
            received: ReceivedServices::new(config.max_entries),
        })
    }

    pub fn local_addr(&self) -> Ipv4Addr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn multicast_destination(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.multicast_addr, self.port)
    }

    /// Set until the multicast session counter has gone through one full cycle.
    pub fn reboot(&self) -> bool {
        self.reboot
    }

    pub fn ttl_timebase(&self) -> u64 {
        self.registry.ttl_timebase()
    }

    pub fn registry(&self) -> &RemoteServiceRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &dyn SomeIpTransport {
        self.transport.as_ref()
    }

    pub fn lookup(&self, service_id: u16, instance_id: u16, major_version: u8) -> Option<&RemoteService> {
        self.registry.lookup(service_id, instance_id, major_version)
    }

    pub fn tick(&mut self, elapsed: u32) {
        self.registry.tick(elapsed);
    }

    /// Handles one datagram received on the SD socket and returns how many Find entries it
    /// carried. They stay available through [`find_requests`](Self::find_requests) until the next
    /// datagram.
    pub fn process_multicast(
        &mut self,
        data: &[u8],
        source: SocketAddr,
        diag: &mut dyn DiagnosticSink,
    ) -> Result<usize, DiscoveryError> {
        let (header, payload) = parser::parse_datagram(data, SessionHandling::Enabled).map_err(|e| {
            debug!(target: "someip::sd", "dropping sd datagram from {}: {}", source, e);
            e
        })?;

        if let Err(e) = parser::parse_payload(payload, &self.registry, &mut self.received) {
            if let SdError::UnsupportedOption(option_type) = e {
                let mut fields = header_fields(&header.header);
                fields[4] = u32::from(option_type);
                diag.report(ErrorKind::SdOptionTypeInvalid, fields);
            }
            debug!(target: "someip::sd", "rejecting sd payload from {}: {}", source, e);
            return Err(e.into());
        }

        self.registry.resolve(&self.received);
        Ok(self.received.provide_requests().count())
    }

    /// Find entries of the last processed datagram.
    pub fn find_requests(&self) -> impl Iterator<Item = &ServiceEntry> {
        self.received.provide_requests()
    }

    /// Answers every pending Find with a unicast Offer to `peer` for each matching local offer.
    /// Returns the number of Offers sent; failed sends are logged and skipped.
    pub fn answer_finds<'o, I>(
        &mut self,
        pool: &mut TxPool,
        offers: I,
        peer: SocketAddrV4,
        diag: &mut dyn DiagnosticSink,
    ) -> usize
    where
        I: Iterator<Item = &'o ServiceOffer> + Clone,
    {
        let mut answered = 0;
        for index in 0..self.received.capacity() {
            let Some(slot) = self.received.slots().get(index).copied() else {
                break;
            };
            if !slot.used || slot.entry_action != EntryAction::Provide {
                continue;
            }
            for offer in offers.clone().filter(|offer| offer.answers(&slot.entry)) {
                match self.send_offer(pool, offer, peer, diag) {
                    Ok(_) => answered += 1,
                    Err(e) => warn!(target: "someip::sd", "answering find from {} failed: {}", peer, e),
                }
            }
        }
        answered
    }

    pub fn send_offer(
        &mut self,
        pool: &mut TxPool,
        offer: &ServiceOffer,
        destination: SocketAddrV4,
        diag: &mut dyn DiagnosticSink,
    ) -> Result<usize, DiscoveryError> {
        self.send_offer_with_ttl(pool, offer, self.offer_ttl, destination, diag)
    }

    /// Offer with ttl 0.
    pub fn send_stop_offer(
        &mut self,
        pool: &mut TxPool,
        offer: &ServiceOffer,
        destination: SocketAddrV4,
        diag: &mut dyn DiagnosticSink,
    ) -> Result<usize, DiscoveryError> {
        self.send_offer_with_ttl(pool, offer, 0, destination, diag)
    }

    pub fn send_find(
        &mut self,
        pool: &mut TxPool,
        service_id: u16,
        instance_id: u16,
        major_version: u8,
        destination: SocketAddrV4,
        diag: &mut dyn DiagnosticSink,
    ) -> Result<usize, DiscoveryError> {
        let entry = ServiceEntry {
            entry_type: EntryType::FindService,
            service_id,
            instance_id,
            major_version,
            minor_version: 0xFFFF_FFFF,
            ttl: self.offer_ttl,
            ..Default::default()
        };
        self.send_entry(pool, &entry, None, destination, diag)
    }

    fn send_offer_with_ttl(
        &mut self,
        pool: &mut TxPool,
        offer: &ServiceOffer,
        ttl: u32,
        destination: SocketAddrV4,
        diag: &mut dyn DiagnosticSink,
    ) -> Result<usize, DiscoveryError> {
        let entry = ServiceEntry {
            entry_type: EntryType::OfferService,
            service_id: offer.service_id,
            instance_id: offer.instance_id,
            major_version: offer.major_version,
            minor_version: offer.minor_version,
            ttl,
            ..Default::default()
        }
        .with_options(0, 1);
        let option = Ipv4EndpointOption::udp(offer.endpoint);
        self.send_entry(pool, &entry, Some(&option), destination, diag)
    }

    fn next_session(&mut self, destination: SocketAddrV4) -> u16 {
        if *destination.ip() != self.multicast_addr {
            return self.unicast_session.next();
        }
        let session = self.multicast_session.next();
        if self.reboot && self.multicast_session.has_wrapped() {
            info!(target: "someip::sd", "multicast session wrapped, clearing reboot flag");
            self.reboot = false;
        }
        session
    }

    fn send_entry(
        &mut self,
        pool: &mut TxPool,
        entry: &ServiceEntry,
        option: Option<&Ipv4EndpointOption>,
        destination: SocketAddrV4,
        diag: &mut dyn DiagnosticSink,
    ) -> Result<usize, DiscoveryError> {
        let mut builder = MessageBuilder::init_sd(pool).map_err(|e| {
            diag.report(ErrorKind::TxPoolExhausted, [pool.capacity() as u32, 0, 0, 0, 0, 0]);
            e
        })?;

        let session = self.next_session(destination);
        let mut header = SdHeader::new(session, self.reboot, true);
        let result = self.write_and_send(&mut builder, &mut header, entry, option, destination, diag);

        if let Err(e) = builder.invalidate(pool) {
            diag.report(ErrorKind::TxMessageInvalidateFail, header_fields(&header.header));
            return Err(e.into());
        }
        result
    }

    fn write_and_send(
        &self,
        builder: &mut MessageBuilder,
        header: &mut SdHeader,
        entry: &ServiceEntry,
        option: Option<&Ipv4EndpointOption>,
        destination: SocketAddrV4,
        diag: &mut dyn DiagnosticSink,
    ) -> Result<usize, DiscoveryError> {
        let mut length = [0u8; 4];
        put_u32(&mut length, 0, ServiceEntry::LENGTH as u32);
        builder.put(&length)?;
        builder.put(&entry.serialize())?;

        let options_len = if option.is_some() { Ipv4EndpointOption::LENGTH } else { 0 };
        put_u32(&mut length, 0, options_len as u32);
        builder.put(&length)?;
        if let Some(option) = option {
            builder.put(&option.serialize())?;
        }

        let total = builder
            .finalize_sd(header, SessionHandling::Enabled)
            .map_err(|e| {
                diag.report(ErrorKind::FinalizeFail, header_fields(&header.header));
                e
            })?;

        self.transport
            .send(builder.as_bytes(), destination)
            .map_err(|e| {
                diag.report(ErrorKind::UdpTxFail, header_fields(&header.header));
                e
            })?;
        debug!(target: "someip::sd", "sent {:?} {:04x}.{:04x} ttl={} to {} ({} bytes)",
            entry.entry_type, entry.service_id, entry.instance_id, entry.ttl, destination, total);
        Ok(total)
    }
}
