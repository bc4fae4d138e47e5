//! Sink registry - shared attach bookkeeping
//!
//! A fixed-capacity open-addressed table keyed by [`SinkId`]. An entry
//! exists while at least one channel is attached to the sink; it carries
//! the attach refcount and a weak handle to the sink.
//!
//! Structural changes happen under one lock, which is never held while a
//! backend is written.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use contracts::{ContractError, SinkId};

use crate::sink::SinkInner;

#[derive(Debug)]
struct Entry {
    id: SinkId,
    refcount: u32,
    handle: Weak<SinkInner>,
}

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Empty,
    /// Previously occupied; keeps probe chains through it intact
    Tombstone,
    Occupied(Entry),
}

enum Probe {
    Found(usize),
    Vacant(usize),
}

#[derive(Debug)]
struct SinkTable {
    slots: Vec<Slot>,
    len: usize,
}

impl SinkTable {
    fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Slot::default);
        Self { slots, len: 0 }
    }

    /// Linear probe from `id % capacity`, bounded by the table size.
    fn probe(&self, id: SinkId) -> Result<Probe, ContractError> {
        let capacity = self.slots.len();
        let start = (id.as_u64() % capacity as u64) as usize;
        let mut vacant = None;

        for step in 0..capacity {
            let index = (start + step) % capacity;
            match &self.slots[index] {
                Slot::Occupied(entry) if entry.id == id => return Ok(Probe::Found(index)),
                Slot::Occupied(_) => {}
                Slot::Tombstone => {
                    vacant.get_or_insert(index);
                }
                Slot::Empty => return Ok(Probe::Vacant(vacant.unwrap_or(index))),
            }
        }

        vacant
            .map(Probe::Vacant)
            .ok_or(ContractError::SinkTableFull { capacity })
    }

    fn find(&self, id: SinkId) -> Option<usize> {
        match self.probe(id) {
            Ok(Probe::Found(index)) => Some(index),
            _ => None,
        }
    }

    fn entry(&self, id: SinkId) -> Option<&Entry> {
        match &self.slots[self.find(id)?] {
            Slot::Occupied(entry) => Some(entry),
            _ => None,
        }
    }

    fn entry_mut(&mut self, index: usize) -> Option<&mut Entry> {
        match &mut self.slots[index] {
            Slot::Occupied(entry) => Some(entry),
            _ => None,
        }
    }

    fn remove(&mut self, index: usize) -> Option<Entry> {
        match std::mem::replace(&mut self.slots[index], Slot::Tombstone) {
            Slot::Occupied(entry) => {
                self.len -= 1;
                Some(entry)
            }
            other => {
                self.slots[index] = other;
                None
            }
        }
    }
}

/// Attach refcounts for every sink shared by at least one channel
#[derive(Debug)]
pub struct SinkRegistry {
    table: Mutex<SinkTable>,
    capacity: usize,
}

impl SinkRegistry {
    /// `capacity` must be non-zero; the context validates it.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            table: Mutex::new(SinkTable::new(capacity)),
            capacity,
        }
    }

    /// Attach one more channel to `sink`, returning the new refcount.
    ///
    /// On 0→1 the sink becomes a broadcast target.
    pub(crate) fn attach(&self, sink: &Arc<SinkInner>) -> Result<u32, ContractError> {
        let mut table = self.table.lock();
        let id = sink.id();

        match table.probe(id)? {
            Probe::Found(index) => {
                let entry = table
                    .entry_mut(index)
                    .ok_or_else(|| ContractError::UnknownSink(id.to_string()))?;
                entry.refcount += 1;
                Ok(entry.refcount)
            }
            Probe::Vacant(index) => {
                table.slots[index] = Slot::Occupied(Entry {
                    id,
                    refcount: 1,
                    handle: Arc::downgrade(sink),
                });
                table.len += 1;
                sink.set_broadcast_target(true);

                debug!(sink = %sink.name(), %id, slot = index, "Sink attached");
                observability::record_attached_sinks(table.len);
                Ok(1)
            }
        }
    }

    /// Detach one channel from the sink `id`, returning the remaining refcount.
    ///
    /// On 1→0 the slot is cleared and the sink goes back to standalone use.
    pub(crate) fn detach(&self, id: SinkId) -> u32 {
        // The upgraded handle must be dropped after the lock: dropping the
        // last strong reference re-enters the registry.
        let released: Option<Arc<SinkInner>>;
        {
            let mut table = self.table.lock();
            let Some(index) = table.find(id) else {
                return 0;
            };
            let Some(entry) = table.entry_mut(index) else {
                return 0;
            };

            entry.refcount = entry.refcount.saturating_sub(1);
            if entry.refcount > 0 {
                return entry.refcount;
            }

            released = table.remove(index).and_then(|entry| entry.handle.upgrade());
            if let Some(sink) = &released {
                sink.set_broadcast_target(false);
                debug!(sink = %sink.name(), %id, "Sink detached");
            }
            observability::record_attached_sinks(table.len);
        }
        drop(released);
        0
    }

    /// Drop the entry of a sink that is being destroyed.
    ///
    /// Returns the refcount it still had, if it was attached.
    pub(crate) fn evict(&self, id: SinkId) -> Option<u32> {
        let mut table = self.table.lock();
        let index = table.find(id)?;
        let entry = table.remove(index)?;
        observability::record_attached_sinks(table.len);
        Some(entry.refcount)
    }

    /// Attach refcount of `id`; `0` when not attached.
    pub fn refcount(&self, id: SinkId) -> u32 {
        self.table
            .lock()
            .entry(id)
            .map(|entry| entry.refcount)
            .unwrap_or(0)
    }

    pub fn is_attached(&self, id: SinkId) -> bool {
        self.refcount(id) > 0
    }

    /// Number of attached sinks.
    pub fn len(&self) -> usize {
        self.table.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slot currently holding `id`, for inspection.
    pub fn slot_of(&self, id: SinkId) -> Option<usize> {
        self.table.lock().find(id)
    }

    /// Ids of every attached sink whose owner is gone.
    pub fn dangling(&self) -> Vec<SinkId> {
        self.table
            .lock()
            .slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Occupied(entry) if entry.handle.strong_count() == 0 => Some(entry.id),
                _ => None,
            })
            .collect()
    }
}

impl Drop for SinkRegistry {
    fn drop(&mut self) {
        let len = self.table.get_mut().len;
        if len > 0 {
            warn!(attached = len, "Sink registry dropped with attached sinks");
        }
    }
}
