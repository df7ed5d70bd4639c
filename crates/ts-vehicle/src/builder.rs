//! Fluent builder for constructing `VehicleStore` + `VehicleRngs` in one step.
//!
//! # Usage
//!
//! ```rust
//! use ts_vehicle::VehicleStoreBuilder;
//!
//! let (store, rngs) = VehicleStoreBuilder::new(/*seed=*/ 42)
//!     .capacity(1_000)
//!     .build();
//!
//! assert!(store.is_empty());
//! assert_eq!(rngs.seed(), 42);
//! ```

use crate::{VehicleRngs, VehicleStore};

/// Fluent builder for [`VehicleStore`] + [`VehicleRngs`].
///
/// Vehicles are added later through the simulation's spawn entry point; the
/// capacity hint only pre-allocates the arena.
pub struct VehicleStoreBuilder {
    seed:     u64,
    capacity: usize,
}

impl VehicleStoreBuilder {
    /// Create a builder using `seed` as the global RNG seed.
    pub fn new(seed: u64) -> Self {
        Self { seed, capacity: 0 }
    }

    /// Expected peak number of simultaneous vehicles.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn build(self) -> (VehicleStore, VehicleRngs) {
        let store = VehicleStore::with_capacity(self.capacity);
        let mut rngs = VehicleRngs::new(self.seed);
        rngs.inner.reserve(self.capacity);
        (store, rngs)
    }
}
