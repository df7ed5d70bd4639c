//! Vehicle storage: `VehicleStore` (generational arena) and `VehicleRngs`
//! (per-slot RNG).
//!
//! # Why two structs?
//!
//! The parallel think phase needs `&VehicleStore` (shared read access to
//! every vehicle) and exclusive access to each thinking vehicle's RNG at the
//! same time.  Keeping the RNGs in a separate table indexed by slot lets the
//! phase zip the two without any unsafe aliasing:
//!
//! ```ignore
//! // ts-sim think phase (simplified):
//! let store: &VehicleStore = &sim.vehicles;
//! let decisions = sim.rngs.inner
//!     .par_iter_mut()
//!     .enumerate()
//!     .filter_map(|(slot, rng)| store.slot(slot).map(|v| (v.id, driver.think(v, &ctx, rng))))
//!     .collect::<Vec<_>>();
//! ```

use ts_core::{TsError, TsResult, VehicleId, VehicleRng};

use crate::Vehicle;

// ── VehicleRngs ───────────────────────────────────────────────────────────────

/// Per-slot deterministic RNG state, separated from [`VehicleStore`] so the
/// think phase can borrow both at once.
///
/// Slot `i` is reseeded from the global seed and the full `VehicleId`
/// whenever a vehicle is allocated there, so a recycled slot never replays
/// its previous occupant's stream.
pub struct VehicleRngs {
    pub inner: Vec<VehicleRng>,
    seed:      u64,
}

impl VehicleRngs {
    pub fn new(global_seed: u64) -> Self {
        Self { inner: Vec::new(), seed: global_seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Seed the RNG for a freshly allocated `vehicle`, growing the table if
    /// its slot is new.
    pub fn reseed(&mut self, vehicle: VehicleId) -> &mut VehicleRng {
        let seed = self.seed;
        while self.inner.len() <= vehicle.index() {
            let slot = self.inner.len() as u32;
            self.inner.push(VehicleRng::new(seed, VehicleId::new(slot, 0)));
        }
        self.inner[vehicle.index()] = VehicleRng::new(seed, vehicle);
        &mut self.inner[vehicle.index()]
    }

    /// Mutable reference to one vehicle's RNG.
    ///
    /// # Panics
    ///
    /// If the slot was never seeded with [`reseed`](Self::reseed).
    #[inline]
    pub fn get_mut(&mut self, vehicle: VehicleId) -> &mut VehicleRng {
        &mut self.inner[vehicle.index()]
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

// ── VehicleStore ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    vehicle:    Option<Vehicle>,
}

/// Generational arena of live vehicles.
///
/// Removing a vehicle bumps its slot's generation, so stale `VehicleId`s held
/// by registrations or yield requests resolve to `None` instead of aliasing
/// the slot's next occupant.  Iteration is always in ascending slot order,
/// which is the order the move phase applies decisions in.
#[derive(Clone, Debug, Default)]
pub struct VehicleStore {
    slots: Vec<Slot>,
    free:  Vec<u32>,
    live:  usize,
}

impl VehicleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { slots: Vec::with_capacity(capacity), free: Vec::new(), live: 0 }
    }

    /// Number of live vehicles.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots ever allocated.  Bounds `VehicleId::index()`.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn contains(&self, id: VehicleId) -> bool {
        self.get(id).is_some()
    }

    #[inline]
    pub fn get(&self, id: VehicleId) -> Option<&Vehicle> {
        let slot = self.slots.get(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.vehicle.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, id: VehicleId) -> Option<&mut Vehicle> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.vehicle.as_mut()
    }

    pub fn try_get(&self, id: VehicleId) -> TsResult<&Vehicle> {
        self.get(id).ok_or(TsError::VehicleNotFound(id))
    }

    /// The vehicle in slot `index`, whatever its generation.
    #[inline]
    pub fn slot(&self, index: usize) -> Option<&Vehicle> {
        self.slots.get(index).and_then(|s| s.vehicle.as_ref())
    }

    /// The ID the next [`insert_with`](Self::insert_with) will hand out.
    pub fn next_id(&self) -> VehicleId {
        match self.free.last() {
            Some(&slot) => VehicleId::new(slot, self.slots[slot as usize].generation),
            None        => VehicleId::new(self.slots.len() as u32, 0),
        }
    }

    /// Allocate an ID and store the vehicle `make` builds for it.
    pub fn insert_with(&mut self, make: impl FnOnce(VehicleId) -> Vehicle) -> VehicleId {
        let id = self.next_id();
        let vehicle = make(id);
        debug_assert_eq!(vehicle.id, id, "vehicle built with a foreign id");
        match self.free.pop() {
            Some(slot) => self.slots[slot as usize].vehicle = Some(vehicle),
            None       => self.slots.push(Slot { generation: 0, vehicle: Some(vehicle) }),
        }
        self.live += 1;
        id
    }

    /// Remove a live vehicle and retire its ID.
    pub fn remove(&mut self, id: VehicleId) -> Option<Vehicle> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        let vehicle = slot.vehicle.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.slot);
        self.live -= 1;
        Some(vehicle)
    }

    /// Live IDs in ascending slot order.
    pub fn ids(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.iter().map(|v| v.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vehicle> + '_ {
        self.slots.iter().filter_map(|s| s.vehicle.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Vehicle> + '_ {
        self.slots.iter_mut().filter_map(|s| s.vehicle.as_mut())
    }
}
