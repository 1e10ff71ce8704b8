//! The planning context: sample tracking and the inventory catalogue.
//!
//! One context is constructed per top-level plan invocation and passed
//! explicitly into tree building, so the core carries no hidden
//! process-wide state. Both members sit behind mutexes because a
//! context may be shared (via `Arc`) between concurrently executing
//! protocols; neither lock participates in the single-threaded
//! per-plan generation walk itself.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::liquid::{LiquidId, LiquidLocation};
use crate::resources::inventory::Inventory;

/// Shared planning context: where samples are, and the catalogue.
#[derive(Debug)]
pub struct PlanContext {
    locations: Mutex<BTreeMap<LiquidId, LiquidLocation>>,
    inventory: Mutex<Inventory>,
}

impl PlanContext {
    /// Creates a context around a catalogue.
    #[must_use]
    pub fn new(inventory: Inventory) -> Self {
        Self {
            locations: Mutex::new(BTreeMap::new()),
            inventory: Mutex::new(inventory),
        }
    }

    /// Records where a liquid sits.
    pub fn record_location(&self, liquid: LiquidId, location: LiquidLocation) {
        if let Ok(mut map) = self.locations.lock() {
            map.insert(liquid, location);
        }
    }

    /// Looks up where a liquid sits, if tracked.
    #[must_use]
    pub fn location_of(&self, liquid: LiquidId) -> Option<LiquidLocation> {
        self.locations.lock().ok().and_then(|map| map.get(&liquid).copied())
    }

    /// Forgets a liquid's location.
    pub fn forget(&self, liquid: LiquidId) {
        if let Ok(mut map) = self.locations.lock() {
            map.remove(&liquid);
        }
    }

    /// Number of tracked samples.
    #[must_use]
    pub fn tracked_samples(&self) -> usize {
        self.locations.lock().map_or(0, |map| map.len())
    }

    /// Runs `f` with the inventory catalogue.
    pub fn with_inventory<T>(&self, f: impl FnOnce(&mut Inventory) -> T) -> T {
        let mut guard = match self.inventory.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

impl Default for PlanContext {
    fn default() -> Self {
        Self::new(Inventory::with_standard_types())
    }
}
