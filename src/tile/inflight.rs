//! Tracking of display tile loads that are still running.
//!
//! Every load registers its key on entry and receives a [`LoadTicket`]
//! carrying the key's current generation. Unloading a key bumps the
//! generation of its entry, so every ticket issued before the unload becomes
//! stale. Entries exist only while at least one ticket for the key is alive;
//! unloading a key with no running load records nothing.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::display::ViewportTileKey;

#[derive(Debug, Default)]
struct Entry {
    generation: u64,
    loads: usize,
}

/// Generations of display tiles with at least one running load.
#[derive(Debug, Default)]
pub(crate) struct InFlightLoads {
    entries: Mutex<HashMap<ViewportTileKey, Entry>>,
}

impl InFlightLoads {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a load of `key`. The entry lives until the ticket drops.
    pub(crate) fn begin(&self, key: ViewportTileKey) -> LoadTicket<'_> {
        let mut entries = self.lock();
        let entry = entries.entry(key).or_default();
        entry.loads += 1;
        LoadTicket {
            loads: self,
            key,
            generation: entry.generation,
        }
    }

    /// Mark every running load of `key` stale.
    ///
    /// Returns whether any load was running.
    pub(crate) fn unload(&self, key: &ViewportTileKey) -> bool {
        match self.lock().get_mut(key) {
            Some(entry) => {
                entry.generation += 1;
                true
            }
            None => false,
        }
    }

    /// Number of keys with a running load.
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn is_current(&self, key: &ViewportTileKey, generation: u64) -> bool {
        self.lock()
            .get(key)
            .is_some_and(|entry| entry.generation == generation)
    }

    fn finish(&self, key: &ViewportTileKey) {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.loads = entry.loads.saturating_sub(1);
            if entry.loads == 0 {
                entries.remove(key);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ViewportTileKey, Entry>> {
        // Entries stay consistent even if a holder panicked
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A registered load. Dropping it deregisters the load, on every exit path
/// including cancellation of the surrounding future.
#[derive(Debug)]
pub(crate) struct LoadTicket<'a> {
    loads: &'a InFlightLoads,
    key: ViewportTileKey,
    generation: u64,
}

impl LoadTicket<'_> {
    /// Whether the key was unloaded after this load began.
    pub(crate) fn is_stale(&self) -> bool {
        !self.loads.is_current(&self.key, self.generation)
    }
}

impl Drop for LoadTicket<'_> {
    fn drop(&mut self) {
        self.loads.finish(&self.key);
    }
}
