//! Settings registry - one settings slot per channel id
//!
//! Every channel constructed with the same id shares the slot's settings.
//! The first channel to claim an idle id seeds it; later channels inherit
//! whatever is there.

use parking_lot::Mutex;
use tracing::{debug, trace};

use contracts::{ChannelId, ChannelSettings, SettingsSnapshot, MAX_CHANNELS};

#[derive(Debug, Default)]
struct SettingsSlot {
    settings: ChannelSettings,
    /// Live channels using this id. Guards the seed on 0→1.
    refcount: Mutex<u32>,
}

/// Per-id settings table owned by a broadcast context
#[derive(Debug)]
pub struct SettingsRegistry {
    slots: [SettingsSlot; MAX_CHANNELS],
}

impl Default for SettingsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsRegistry {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| SettingsSlot::default()),
        }
    }

    /// Settings shared by every channel with `id`.
    pub fn get(&self, id: ChannelId) -> &ChannelSettings {
        &self.slots[id.index()].settings
    }

    /// Register one more channel for `id` and return the new refcount.
    ///
    /// Only the 0→1 transition applies `initial`.
    pub(crate) fn acquire(&self, id: ChannelId, initial: SettingsSnapshot) -> u32 {
        let slot = &self.slots[id.index()];
        let mut refcount = slot.refcount.lock();

        if *refcount == 0 {
            slot.settings.seed(initial);
            debug!(channel = %id, ?initial, "Channel settings seeded");
        } else {
            trace!(channel = %id, "Channel settings inherited");
        }
        *refcount += 1;
        *refcount
    }

    /// Deregister one channel for `id` and return the remaining refcount.
    pub(crate) fn release(&self, id: ChannelId) -> u32 {
        let mut refcount = self.slots[id.index()].refcount.lock();
        *refcount = refcount.saturating_sub(1);
        if *refcount == 0 {
            debug!(channel = %id, "Last channel for id released");
        }
        *refcount
    }

    /// Number of live channels using `id`.
    pub fn refcount(&self, id: ChannelId) -> u32 {
        *self.slots[id.index()].refcount.lock()
    }

    /// Number of live channels across all ids.
    pub fn live_channels(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| *slot.refcount.lock() as usize)
            .sum()
    }

    pub fn can_be_output(&self, id: ChannelId) -> bool {
        self.get(id).can_be_output()
    }
}
