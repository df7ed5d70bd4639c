//! `ts-mobility` — vehicle insertion and the move phase.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                      |
//! |---------------|---------------------------------------------------------------|
//! | [`engine`]    | `MobilityEngine<R>` — insertion and ordered decision apply    |
//! | [`spawn`]     | `SpawnOptions`                                                |
//! | [`event`]     | `VehicleEvent` — spawn, arrival, death, lane-change, reroute  |
//! | [`error`]     | `MobilityError`, `MobilityResult<T>`                          |
//!
//! # Move phase
//!
//! Decisions are applied one vehicle at a time in ascending `VehicleId`
//! order:
//!
//! 1. A fate removes the vehicle with its occupancy and conflict claims.
//! 2. Intents are applied in the order think emitted them.  Lane changes
//!    re-check the target gap, since an earlier vehicle may have taken it.
//! 3. New route, acceleration and drive state are stored.
//!
//! Then every surviving vehicle is integrated
//! (`v₁ = v + a·dt`, stopping at zero).  Edge transitions, with reroutes
//! at branching nodes, are planned only once all vehicles have moved, and
//! committed in id order.  Finally occupancy is re-sorted by `(arc, id)`,
//! edge speed statistics are sampled and poses refreshed.
//!
//! A route that arrives together with a lane change is discarded when the
//! change is refused.

pub mod engine;
pub mod error;
pub mod event;
pub(crate) mod movement;
pub mod spawn;

#[cfg(test)]
mod tests;

pub use engine::MobilityEngine;
pub use error::{MobilityError, MobilityResult};
pub use event::VehicleEvent;
pub use spawn::SpawnOptions;
