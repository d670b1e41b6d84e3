use crate::codec::primitives::{get_u16, get_u24, get_u32, put_u16, put_u24, put_u32};

/// Largest value the 24-bit TTL field can carry.
pub const TTL_MAX: u32 = 0x00FF_FFFF;

/// SD entry types. Only the Type 1 service entries are handled; eventgroup entries and anything
/// else decode as [`EntryType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryType {
    #[default]
    FindService,
    /// OfferService with ttl > 0, StopOfferService with ttl = 0.
    OfferService,
    Other(u8),
}

impl From<u8> for EntryType {
    fn from(v: u8) -> Self {
        match v {
            0x00 => EntryType::FindService,
            0x01 => EntryType::OfferService,
            other => EntryType::Other(other),
        }
    }
}

impl From<EntryType> for u8 {
    fn from(et: EntryType) -> u8 {
        match et {
            EntryType::FindService => 0x00,
            EntryType::OfferService => 0x01,
            EntryType::Other(other) => other,
        }
    }
}

/// 16-byte SD Service Entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServiceEntry {
    pub entry_type: EntryType,
    pub index_1: u8,
    pub index_2: u8,
    /// 4 bits on the wire.
    pub number_of_opts_1: u8,
    /// 4 bits on the wire.
    pub number_of_opts_2: u8,
    pub service_id: u16,
    pub instance_id: u16,
    pub major_version: u8,
    /// 24 bits on the wire, in seconds.
    pub ttl: u32,
    pub minor_version: u32,
}

impl ServiceEntry {
    pub const LENGTH: usize = 16;

    /// Find or Offer entry referencing a single option run; `None` for any other entry type.
    pub fn new(
        entry_type: EntryType,
        service_id: u16,
        instance_id: u16,
        major_version: u8,
        minor_version: u32,
        ttl: u32,
    ) -> Option<Self> {
        if matches!(entry_type, EntryType::Other(_)) {
            return None;
        }
        Some(ServiceEntry {
            entry_type,
            service_id,
            instance_id,
            major_version,
            minor_version,
            ttl: ttl.min(TTL_MAX),
            ..Default::default()
        })
    }

    /// Points the first option run at `count` options starting at `index`.
    pub fn with_options(mut self, index: u8, count: u8) -> Self {
        self.index_1 = index;
        self.number_of_opts_1 = count & 0x0F;
        self
    }

    pub fn is_offer(&self) -> bool {
        self.entry_type == EntryType::OfferService
    }

    pub fn serialize(&self) -> [u8; 16] {
        let mut buf = [0u8; 16];
        buf[0] = self.entry_type.into();
        buf[1] = self.index_1;
        buf[2] = self.index_2;
        buf[3] = (self.number_of_opts_1 << 4) | (self.number_of_opts_2 & 0x0F);
        put_u16(&mut buf, 4, self.service_id);
        put_u16(&mut buf, 6, self.instance_id);
        buf[8] = self.major_version;
        put_u24(&mut buf, 9, self.ttl);
        put_u32(&mut buf, 12, self.minor_version);
        buf
    }

    pub fn deserialize(buf: &[u8; 16]) -> Self {
        ServiceEntry {
            entry_type: buf[0].into(),
            index_1: buf[1],
            index_2: buf[2],
            number_of_opts_1: buf[3] >> 4,
            number_of_opts_2: buf[3] & 0x0F,
            service_id: get_u16(buf, 4),
            instance_id: get_u16(buf, 6),
            major_version: buf[8],
            ttl: get_u24(buf, 9),
            minor_version: get_u32(buf, 12),
        }
    }
}
