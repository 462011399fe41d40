//! Slot pool
//!
//! Fixed-shape records are recycled through an arena of indexed slots with a
//! free list. The arena lock only covers acquire/release/lookup; each slot's
//! payload sits behind its own mutex, so work on one record never blocks
//! lookups of another.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::StreamError;

const INDEX_BITS: u32 = 16;

/// Largest number of slots a pool can hold
pub const MAX_SLOTS: usize = (1 << INDEX_BITS) - 1;

// Generations wrap at whatever fits beside the index in a usize.
const GENERATION_MASK: u32 = (usize::MAX >> INDEX_BITS) as u32;

/// Identifies one occupancy of one slot. Keys from earlier occupancies of the
/// same slot no longer resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    index: u32,
    generation: u32,
}

impl SlotKey {
    /// Pack into a non-zero value suitable for an opaque C handle
    pub fn into_raw(self) -> usize {
        ((self.generation as usize) << INDEX_BITS) | (self.index as usize + 1)
    }

    /// Inverse of [`SlotKey::into_raw`]; zero is never a key
    pub fn from_raw(raw: usize) -> Option<Self> {
        let low = raw & MAX_SLOTS;
        if low == 0 {
            return None;
        }
        Some(Self {
            index: (low - 1) as u32,
            generation: (raw >> INDEX_BITS) as u32 & GENERATION_MASK,
        })
    }
}

// Payload plus the generation it was stored under. Checked after the cell
// lock is taken, since the slot may have been recycled since the lookup.
struct Occupant<T> {
    generation: u32,
    value: T,
}

type SlotCell<T> = Arc<Mutex<Option<Occupant<T>>>>;

struct Slot<T> {
    generation: u32,
    occupied: bool,
    cell: SlotCell<T>,
}

struct PoolInner<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

/// Capacity-bounded, internally synchronized object pool
pub struct Pool<T> {
    name: &'static str,
    capacity: usize,
    inner: Mutex<PoolInner<T>>,
}

impl<T> Pool<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.min(MAX_SLOTS),
            inner: Mutex::new(PoolInner {
                slots: Vec::new(),
                free: Vec::new(),
            }),
        }
    }

    /// Store `value` in a free slot, growing the arena if none is free.
    pub fn acquire(&self, value: T) -> Result<SlotKey, StreamError> {
        let mut inner = self.inner.lock();

        let index = match inner.free.pop() {
            Some(index) => index,
            None => {
                if inner.slots.len() >= self.capacity {
                    return Err(StreamError::OutOfMemory(self.name));
                }
                inner.slots.push(Slot {
                    generation: 0,
                    occupied: false,
                    cell: Arc::new(Mutex::new(None)),
                });
                (inner.slots.len() - 1) as u32
            }
        };

        let slot = &mut inner.slots[index as usize];
        slot.occupied = true;
        *slot.cell.lock() = Some(Occupant {
            generation: slot.generation,
            value,
        });

        Ok(SlotKey {
            index,
            generation: slot.generation,
        })
    }

    /// Run `f` on the payload of a live key while holding its slot lock.
    /// Stale or unknown keys yield `None` and never reach a newer payload.
    pub fn with<R>(&self, key: SlotKey, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let cell = self.cell(key)?;
        Self::run_locked(&cell, key, f)
    }

    fn cell(&self, key: SlotKey) -> Option<SlotCell<T>> {
        let inner = self.inner.lock();
        let slot = inner.slots.get(key.index as usize)?;
        (slot.occupied && slot.generation == key.generation).then(|| Arc::clone(&slot.cell))
    }

    fn run_locked<R>(cell: &SlotCell<T>, key: SlotKey, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = cell.lock();
        match guard.as_mut() {
            Some(occupant) if occupant.generation == key.generation => Some(f(&mut occupant.value)),
            _ => None,
        }
    }

    /// Take the payload out and return the slot to the free list.
    /// Stale or unknown keys yield `None`.
    pub fn release(&self, key: SlotKey) -> Option<T> {
        let cell = {
            let mut inner = self.inner.lock();
            let slot = inner.slots.get_mut(key.index as usize)?;
            if !slot.occupied || slot.generation != key.generation {
                return None;
            }
            slot.occupied = false;
            slot.generation = slot.generation.wrapping_add(1) & GENERATION_MASK;
            Arc::clone(&slot.cell)
        };

        // Waits for any caller still working on this payload. The slot is
        // off the free list until then, so nobody else can claim it.
        let value = cell
            .lock()
            .take_if(|occupant| occupant.generation == key.generation)
            .map(|occupant| occupant.value);
        self.inner.lock().free.push(key.index);
        value
    }

    /// Number of occupied slots
    pub fn in_use(&self) -> usize {
        self.inner.lock().slots.iter().filter(|slot| slot.occupied).count()
    }
}
