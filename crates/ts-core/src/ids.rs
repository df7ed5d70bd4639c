//! Strongly typed, zero-cost identifier wrappers.
//!
//! Graph entities (`NodeId`, `EdgeId`, `IntersectionId`) are plain indices
//! into the arenas owned by `RoadNetwork`.  They are never reused, so the raw
//! integer doubles as the stable identity a persistence layer needs to
//! re-resolve references after reload.
//!
//! Vehicles come and go every tick, so `VehicleId` carries a generation next
//! to its slot index: a stale ID held across a vehicle's death can never
//! resolve to the slot's next occupant.

use std::fmt;

/// Declare a `u32`-backed arena index with `INVALID` as its default.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(pub $inner);

        impl $name {
            pub const INVALID: $name = $name(<$inner>::MAX);

            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub fn is_valid(self) -> bool {
                self != Self::INVALID
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}#{}", stringify!($name), self.0)
                } else {
                    write!(f, "{}#invalid", stringify!($name))
                }
            }
        }

        impl TryFrom<usize> for $name {
            type Error = std::num::TryFromIntError;
            fn try_from(n: usize) -> Result<$name, Self::Error> {
                <$inner>::try_from(n).map($name)
            }
        }
    };
}

typed_id! {
    /// Index of a road-network node.
    pub struct NodeId(u32);
}

typed_id! {
    /// Index of a directed road-network edge.
    pub struct EdgeId(u32);
}

typed_id! {
    /// Index of a conflict point between two crossing edges.
    pub struct IntersectionId(u32);
}

// ── VehicleId ─────────────────────────────────────────────────────────────────

/// Generational handle into the vehicle arena.
///
/// Ordering is by slot first, then generation, which is the order the
/// simulation applies per-vehicle decisions in.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleId {
    pub slot:       u32,
    pub generation: u32,
}

impl VehicleId {
    #[inline]
    pub fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// Slot index into the arena's `Vec`s.
    #[inline(always)]
    pub fn index(self) -> usize {
        self.slot as usize
    }

    /// Pack into a single integer (generation in the high half).
    #[inline]
    pub fn to_raw(self) -> u64 {
        ((self.generation as u64) << 32) | self.slot as u64
    }

    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self { slot: raw as u32, generation: (raw >> 32) as u32 }
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vehicle {}.{}", self.slot, self.generation)
    }
}
