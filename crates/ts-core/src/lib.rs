//! `ts-core` — foundational types for the `rust_ts` traffic kernel.
//!
//! This crate is a dependency of every other `ts-*` crate.  It intentionally
//! has no `ts-*` dependencies and minimal external ones (only `rand` and
//! `thiserror`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module        | Contents                                                 |
//! |---------------|----------------------------------------------------------|
//! | [`ids`]       | `NodeId`, `EdgeId`, `IntersectionId`, `VehicleId`        |
//! | [`geom`]      | `Vec2`, `Aabb`                                           |
//! | [`time`]      | `Tick`, `SimClock`                                       |
//! | [`config`]    | `SimConfig`, `KernelConfig`                              |
//! | [`rng`]       | `VehicleRng` (per-vehicle), `SimRng` (global)            |
//! | [`class`]     | `VehicleClass`, `ClassMask`, `LayerMask`                 |
//! | [`error`]     | `TsError`, `TsResult`                                    |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to IDs, geometry, configs.  |

pub mod class;
pub mod config;
pub mod error;
pub mod geom;
pub mod ids;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use class::{ClassMask, LayerMask, VehicleClass};
pub use config::{KernelConfig, SimConfig};
pub use error::{TsError, TsResult};
pub use geom::{Aabb, Vec2};
pub use ids::{EdgeId, IntersectionId, NodeId, VehicleId};
pub use rng::{SimRng, VehicleRng};
pub use time::{SimClock, Tick};
