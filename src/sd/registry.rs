use super::parser::{EntryAction, ReceivedServices};
use log::{debug, info};
use std::net::{Ipv4Addr, SocketAddrV4};

/// A remote service instance learned from an Offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteService {
    pub service_id: u16,
    pub instance_id: u16,
    pub major_version: u8,
    pub minor_version: u32,
    pub endpoint: SocketAddrV4,
    /// Seconds left before the record goes stale.
    pub ttl: u32,
    pub valid: bool,
}

impl Default for RemoteService {
    fn default() -> Self {
        RemoteService {
            service_id: 0,
            instance_id: 0,
            major_version: 0,
            minor_version: 0,
            endpoint: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0),
            ttl: 0,
            valid: false,
        }
    }
}

impl RemoteService {
    fn matches(&self, service_id: u16, instance_id: u16, major_version: u8) -> bool {
        self.service_id == service_id
            && self.instance_id == instance_id
            && self.major_version == major_version
    }
}

/// How a slot for a newly offered service was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationPolicy {
    /// A free (invalid) slot was reused.
    Soft,
    /// The valid record closest to expiry was evicted.
    Force,
}

/// Fixed-size cache of remote services, refreshed by Offers and aged by [`tick`](Self::tick).
#[derive(Debug, Clone)]
pub struct RemoteServiceRegistry {
    services: Vec<RemoteService>,
    ttl_timebase: u64,
}

impl RemoteServiceRegistry {
    pub fn new(capacity: usize) -> Self {
        RemoteServiceRegistry {
            services: vec![RemoteService::default(); capacity],
            ttl_timebase: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.services.len()
    }

    pub fn services(&self) -> &[RemoteService] {
        &self.services
    }

    pub fn valid_count(&self) -> usize {
        self.services.iter().filter(|s| s.valid).count()
    }

    /// Total seconds passed to [`tick`](Self::tick) so far.
    pub fn ttl_timebase(&self) -> u64 {
        self.ttl_timebase
    }

    /// Valid record for the given service instance.
    pub fn lookup(&self, service_id: u16, instance_id: u16, major_version: u8) -> Option<&RemoteService> {
        self.services
            .iter()
            .find(|s| s.valid && s.matches(service_id, instance_id, major_version))
    }

    fn position(&self, service_id: u16, instance_id: u16, major_version: u8) -> Option<usize> {
        self.services
            .iter()
            .position(|s| s.valid && s.matches(service_id, instance_id, major_version))
    }

    /// Picks the slot `policy` would hand out, without modifying anything.
    pub fn allocate(&self, policy: AllocationPolicy) -> Option<usize> {
        match policy {
            AllocationPolicy::Soft => self.services.iter().position(|s| !s.valid),
            AllocationPolicy::Force => self
                .services
                .iter()
                .enumerate()
                .filter(|(_, s)| s.valid)
                .min_by_key(|(_, s)| s.ttl)
                .map(|(index, _)| index),
        }
    }

    /// Soft allocation first, force allocation when the table is full.
    pub fn allocate_slot(&self) -> Option<(usize, AllocationPolicy)> {
        self.allocate(AllocationPolicy::Soft)
            .map(|index| (index, AllocationPolicy::Soft))
            .or_else(|| {
                self.allocate(AllocationPolicy::Force)
                    .map(|index| (index, AllocationPolicy::Force))
            })
    }

    /// Applies a decoded SD message: first refresh or drop cached services, then store new ones.
    /// Returns the number of records written.
    pub fn resolve(&mut self, received: &ReceivedServices) -> usize {
        let mut written = 0;

        for slot in received.used() {
            if !matches!(slot.entry_action, EntryAction::Update | EntryAction::Delete) {
                continue;
            }
            let entry = &slot.entry;
            if let Some(index) = self.position(entry.service_id, entry.instance_id, entry.major_version) {
                let service = &mut self.services[index];
                service.ttl = entry.ttl;
                service.minor_version = entry.minor_version;
                service.endpoint = slot.option.endpoint();
                service.valid = entry.ttl != 0;
                debug!(target: "someip::sd", "refreshed {:04x}.{:04x} ttl={}", entry.service_id, entry.instance_id, entry.ttl);
                written += 1;
            }
        }

        for slot in received.used() {
            if slot.entry_action != EntryAction::Save || slot.entry.ttl == 0 {
                continue;
            }
            let entry = &slot.entry;
            let index = match self.position(entry.service_id, entry.instance_id, entry.major_version) {
                // Same service offered twice in one message
                Some(index) => index,
                None => match self.allocate_slot() {
                    Some((index, policy)) => {
                        if policy == AllocationPolicy::Force {
                            let evicted = &self.services[index];
                            info!(target: "someip::sd", "evicting {:04x}.{:04x} (ttl={}) for {:04x}.{:04x}",
                                evicted.service_id, evicted.instance_id, evicted.ttl,
                                entry.service_id, entry.instance_id);
                        }
                        index
                    }
                    None => continue,
                },
            };
            self.services[index] = RemoteService {
                service_id: entry.service_id,
                instance_id: entry.instance_id,
                major_version: entry.major_version,
                minor_version: entry.minor_version,
                endpoint: slot.option.endpoint(),
                ttl: entry.ttl,
                valid: true,
            };
            info!(target: "someip::sd", "discovered {:04x}.{:04x} v{} at {}",
                entry.service_id, entry.instance_id, entry.major_version, slot.option.endpoint());
            written += 1;
        }
        written
    }

    /// Ages every valid record by `elapsed` seconds; records reaching zero become invalid.
    pub fn tick(&mut self, elapsed: u32) {
        self.ttl_timebase = self.ttl_timebase.saturating_add(u64::from(elapsed));
        for service in self.services.iter_mut().filter(|s| s.valid) {
            service.ttl = service.ttl.saturating_sub(elapsed);
            if service.ttl == 0 {
                service.valid = false;
                info!(target: "someip::sd", "{:04x}.{:04x} expired", service.service_id, service.instance_id);
            }
        }
    }

    /// Drops every cached record.
    pub fn clear(&mut self) {
        self.services.fill(RemoteService::default());
    }
}
