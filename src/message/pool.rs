use crate::codec::{SomeIpHeader, UDP_MTU_LENGTH};
use log::{debug, warn};
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

// 0 is reserved for detached builders
static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("all {0} tx buffers are in use")]
    Exhausted(usize),
    #[error("buffer does not belong to this pool")]
    ForeignBuffer,
    #[error("buffer was already returned to the pool")]
    AlreadyReleased,
}

/// Fixed set of equally sized tx buffers, allocated once up front.
///
/// A slot is free while its buffer sits in the pool and in use while a
/// [`MessageBuilder`](super::MessageBuilder) holds it.
#[derive(Debug)]
pub struct TxPool {
    id: u32,
    block_size: usize,
    slots: Vec<Option<Box<[u8]>>>,
}

impl TxPool {
    /// `block_size` is clamped to `16..=1400`, the range a single UDP datagram can carry.
    pub fn new(slot_count: usize, block_size: usize) -> Self {
        let block_size = block_size.clamp(SomeIpHeader::HEADER_LENGTH, UDP_MTU_LENGTH);
        let slots = (0..slot_count)
            .map(|_| Some(vec![0u8; block_size].into_boxed_slice()))
            .collect();

        TxPool {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            block_size,
            slots,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn available(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub(crate) fn id(&self) -> u32 {
        self.id
    }

    /// Hands out the first free slot.
    pub(crate) fn allocate(&mut self) -> Result<(usize, Box<[u8]>), PoolError> {
        let Some(index) = self.slots.iter().position(Option::is_some) else {
            warn!(target: "someip::pool", "tx pool exhausted ({} slots)", self.slots.len());
            return Err(PoolError::Exhausted(self.slots.len()));
        };
        match self.slots[index].take() {
            Some(buffer) => {
                debug!(target: "someip::pool", "allocated slot {}", index);
                Ok((index, buffer))
            }
            None => Err(PoolError::Exhausted(self.slots.len())),
        }
    }

    pub(crate) fn release(&mut self, pool_id: u32, slot: usize, buffer: Box<[u8]>) -> Result<(), PoolError> {
        if pool_id != self.id || buffer.len() != self.block_size {
            return Err(PoolError::ForeignBuffer);
        }
        let Some(entry) = self.slots.get_mut(slot) else {
            return Err(PoolError::ForeignBuffer);
        };
        if entry.is_some() {
            return Err(PoolError::AlreadyReleased);
        }
        *entry = Some(buffer);
        debug!(target: "someip::pool", "released slot {}", slot);
        Ok(())
    }
}
