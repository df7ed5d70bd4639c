//! Deterministic random streams.
//!
//! Every vehicle draws from its own `SmallRng`, seeded from the run seed and
//! the vehicle's packed ID:
//!
//!   seed = global_seed ^ (id.to_raw() * GOLDEN)
//!
//! The generation lives in the high half of the packed ID, so a recycled
//! arena slot starts a fresh stream instead of replaying its previous
//! occupant's.  Parallel thinks each own one stream, which keeps a run
//! bit-identical regardless of thread count.

use rand::distributions::{Distribution, Standard};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::VehicleId;

/// Fractional part of the golden ratio in 64 bits; spreads consecutive IDs.
const GOLDEN: u64 = 0x9e37_79b9_7f4a_7c15;

/// Draws shared by both stream types.
macro_rules! draws {
    ($name:ident) => {
        impl $name {
            /// A `Standard`-distributed value.
            #[inline]
            pub fn random<T>(&mut self) -> T
            where
                Standard: Distribution<T>,
            {
                self.0.r#gen()
            }

            /// `true` with probability `p`, clamped into `[0, 1]`.
            #[inline]
            pub fn gen_bool(&mut self, p: f64) -> bool {
                self.0.gen_bool(p.clamp(0.0, 1.0))
            }
        }
    };
}

/// One vehicle's stream.  Lives in `VehicleRngs`, beside the vehicle arena,
/// so think can read the store while each task owns its stream mutably.
#[derive(Clone, Debug)]
pub struct VehicleRng(SmallRng);

impl VehicleRng {
    pub fn new(global_seed: u64, vehicle: VehicleId) -> Self {
        Self(SmallRng::seed_from_u64(global_seed ^ vehicle.to_raw().wrapping_mul(GOLDEN)))
    }

    /// `base` scaled by a uniform factor in `[1 - spread, 1 + spread]`.
    /// Consumes nothing when `spread <= 0`.
    #[inline]
    pub fn jitter(&mut self, base: f64, spread: f64) -> f64 {
        if spread > 0.0 {
            base * self.0.gen_range((1.0 - spread)..=(1.0 + spread))
        } else {
            base
        }
    }
}

draws!(VehicleRng);

/// Run-level stream for draws outside any one vehicle, such as demand
/// generation.  Single-threaded use only.
#[derive(Clone, Debug)]
pub struct SimRng(SmallRng);

impl SimRng {
    pub fn new(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }

    /// Split off an independent stream; `offset` separates siblings.
    pub fn child(&mut self, offset: u64) -> SimRng {
        let seed = self.0.r#gen::<u64>() ^ offset.wrapping_mul(GOLDEN);
        Self(SmallRng::seed_from_u64(seed))
    }

    /// Uniform pick from `items`; `None` when empty.
    #[inline]
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.0)
    }
}

draws!(SimRng);
