//! `ts-vehicle` — vehicle records and storage for the `rust_ts` traffic kernel.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                        |
//! |---------------|-----------------------------------------------------------------|
//! | [`vehicle`]   | `Vehicle`, `DriverParams`, `LaneChange`, `DriveState`, stats    |
//! | [`profile`]   | `ClassProfile` (per-class body and parameter defaults)          |
//! | [`store`]     | `VehicleStore` (generational arena), `VehicleRngs` (per slot)   |
//! | [`builder`]   | `VehicleStoreBuilder` (fluent construction)                     |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                      |
//! |---------|-------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on the plain-data types.  |

pub mod builder;
pub mod profile;
pub mod store;
pub mod vehicle;


pub use builder::VehicleStoreBuilder;
pub use profile::{ClassProfile, DEFAULT_POLITENESS};
pub use store::{VehicleRngs, VehicleStore};
pub use vehicle::{DriveState, DriverParams, LaneChange, Vehicle, VehicleStats, YieldRequest};
