//! Inbound SD payload decoding.
//!
//! The payload is read under a single-entry/single-option model: entry `i` is paired with option
//! `i` and the option run indices inside the entry are not followed. Messages carrying any option
//! other than an IPv4 endpoint are rejected as a whole.

use super::entries::{EntryType, ServiceEntry};
use super::options::{Ipv4EndpointOption, OptionType};
use super::packet::SdHeader;
use super::registry::RemoteServiceRegistry;
use crate::codec::primitives::get_u32;
use crate::codec::{HeaderError, SessionHandling};
use log::debug;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SdError {
    #[error("sd datagram of {0} bytes is shorter than the minimal sd message")]
    TooShort(usize),
    #[error("invalid sd header: {0}")]
    Header(#[from] HeaderError),
    #[error("length field announces {announced} bytes, datagram has {actual}")]
    LengthMismatch { announced: usize, actual: usize },
    #[error("entries or options array runs past the end of the datagram")]
    Truncated,
    #[error("unsupported sd option type 0x{0:02x}")]
    UnsupportedOption(u8),
}

/// What the remote registry should do with a received entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryAction {
    #[default]
    None,
    /// Offer for a service not cached yet.
    Save,
    /// Offer refreshing a cached service.
    Update,
    /// StopOffer for a cached service.
    Delete,
    /// Find; answered by the caller, not the registry.
    Provide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionAction {
    #[default]
    None,
    Save,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceivedService {
    pub entry: ServiceEntry,
    pub entry_action: EntryAction,
    pub option: Ipv4EndpointOption,
    pub option_action: OptionAction,
    pub used: bool,
}

/// Scratch table one SD message is decoded into before it is resolved against the registry.
#[derive(Debug, Clone)]
pub struct ReceivedServices {
    slots: Vec<ReceivedService>,
}

impl ReceivedServices {
    pub fn new(capacity: usize) -> Self {
        ReceivedServices {
            slots: vec![ReceivedService::default(); capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn clear(&mut self) {
        self.slots.fill(ReceivedService::default());
    }

    pub fn slots(&self) -> &[ReceivedService] {
        &self.slots
    }

    pub fn used(&self) -> impl Iterator<Item = &ReceivedService> {
        self.slots.iter().filter(|slot| slot.used)
    }

    /// Entries the peer asked about with a Find.
    pub fn provide_requests(&self) -> impl Iterator<Item = &ServiceEntry> {
        self.used()
            .filter(|slot| slot.entry_action == EntryAction::Provide)
            .map(|slot| &slot.entry)
    }
}

/// Checks the SD framing of a whole datagram and returns its header and the payload behind the
/// preamble.
pub fn parse_datagram(data: &[u8], handling: SessionHandling) -> Result<(SdHeader, &[u8]), SdError> {
    if data.len() < SdHeader::MIN_MESSAGE_LENGTH {
        return Err(SdError::TooShort(data.len()));
    }
    let header = SdHeader::parse(data).ok_or(SdError::TooShort(data.len()))?;
    header.validate(handling)?;

    let announced = header.header.total_length();
    if announced != data.len() {
        return Err(SdError::LengthMismatch {
            announced,
            actual: data.len(),
        });
    }
    Ok((header, &data[SdHeader::HEADER_LENGTH..]))
}

/// Decides what a single entry means given what the registry already knows.
pub fn classify_entry(entry: &ServiceEntry, registry: &RemoteServiceRegistry) -> EntryAction {
    match entry.entry_type {
        EntryType::FindService => EntryAction::Provide,
        EntryType::OfferService => {
            let known = registry
                .lookup(entry.service_id, entry.instance_id, entry.major_version)
                .is_some();
            match (entry.ttl, known) {
                (0, true) => EntryAction::Delete,
                (0, false) => EntryAction::None,
                (_, true) => EntryAction::Update,
                (_, false) => EntryAction::Save,
            }
        }
        EntryType::Other(_) => EntryAction::None,
    }
}

/// Decodes the entries and options arrays into `received`, returning the number of used slots.
///
/// Counts beyond the table capacity are dropped. `received` is left cleared when the payload is
/// rejected.
pub fn parse_payload(
    payload: &[u8],
    registry: &RemoteServiceRegistry,
    received: &mut ReceivedServices,
) -> Result<usize, SdError> {
    received.clear();

    let (entries, options) = split_arrays(payload)?;
    let capacity = received.capacity();
    let entry_count = (entries.len() / ServiceEntry::LENGTH).min(capacity);
    let option_count = (options.len() / Ipv4EndpointOption::LENGTH).min(capacity);

    let decoded_options = move || {
        options
            .chunks_exact(Ipv4EndpointOption::LENGTH)
            .take(option_count)
            .filter_map(|chunk| chunk.first_chunk::<12>())
            .map(Ipv4EndpointOption::deserialize)
    };
    // Reject before touching the table
    if let Some(bad) = decoded_options().find(|o| o.option_type != OptionType::Ipv4Endpoint) {
        return Err(SdError::UnsupportedOption(bad.option_type.into()));
    }

    let entries = entries
        .chunks_exact(ServiceEntry::LENGTH)
        .take(entry_count)
        .filter_map(|chunk| chunk.first_chunk::<16>())
        .map(ServiceEntry::deserialize);

    for (slot, entry) in received.slots.iter_mut().zip(entries) {
        slot.entry = entry;
        slot.entry_action = classify_entry(&entry, registry);
    }
    for (slot, option) in received.slots.iter_mut().zip(decoded_options()) {
        slot.option = option;
        slot.option_action = OptionAction::Save;
    }

    let mut used = 0;
    for slot in received.slots.iter_mut() {
        slot.used = slot.entry_action != EntryAction::None || slot.option_action != OptionAction::None;
        if slot.used {
            used += 1;
        }
    }
    debug!(target: "someip::sd", "decoded {} entries, {} options, {} used", entry_count, option_count, used);
    Ok(used)
}

fn split_arrays(payload: &[u8]) -> Result<(&[u8], &[u8]), SdError> {
    let entries_len = read_length(payload, 0)?;
    let entries_start: usize = 4;
    let entries_end = entries_start
        .checked_add(entries_len)
        .ok_or(SdError::Truncated)?;
    if entries_end > payload.len() {
        return Err(SdError::Truncated);
    }

    let options_len = read_length(payload, entries_end)?;
    let options_start = entries_end + 4;
    let options_end = options_start
        .checked_add(options_len)
        .ok_or(SdError::Truncated)?;
    if options_end > payload.len() {
        return Err(SdError::Truncated);
    }

    Ok((
        &payload[entries_start..entries_end],
        &payload[options_start..options_end],
    ))
}

fn read_length(payload: &[u8], offset: usize) -> Result<usize, SdError> {
    if payload.len() < offset.saturating_add(4) {
        return Err(SdError::Truncated);
    }
    Ok(get_u32(payload, offset) as usize)
}
