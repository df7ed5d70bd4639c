//! `ts-sim` — tick driver for the rust_ts traffic kernel.
//!
//! # Two-phase tick
//!
//! ```text
//! advance(dt):
//!   ① Approaches — index vehicles about to enter each edge (for converging
//!                  leaders).
//!   ② Think      — DriverModel::think for every live vehicle against one
//!                  immutable ThinkContext (parallel with `parallel`).
//!   ③ Move       — MobilityEngine::apply in ascending VehicleId order:
//!                    fates, conflict claims, lane changes, yield requests,
//!                    new routes, integration, edge transitions.
//!   ④ Log        — move-phase events appended to the event log.
//!   ⑤ Clock      — advanced by dt.
//! ```
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                 |
//! |------------|--------------------------------------------------------|
//! | `parallel` | Runs the think phase on Rayon's thread pool.           |
//! | `fx-hash`  | FxHash for the per-tick approach index.                |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use ts_behavior::TrafficDriver;
//! use ts_core::{SimConfig, VehicleClass};
//! use ts_sim::{NoopObserver, SimBuilder};
//! use ts_spatial::AStarRouter;
//!
//! let driver = TrafficDriver::new(&config.kernel)?;
//! let mut sim = SimBuilder::new(config, network, driver, AStarRouter).build()?;
//! sim.insert_vehicle(VehicleClass::Car, entry, [exit])?;
//! sim.run(&mut NoopObserver)?;
//! for e in sim.drain_events() { println!("{:?}", e); }
//! ```

pub mod builder;
pub mod error;
pub mod event;
pub mod observer;
pub mod sim;
pub mod telemetry;

#[cfg(test)]
mod tests;

pub use builder::SimBuilder;
pub use error::{SimError, SimResult};
pub use event::{SimEvent, TickReport};
pub use observer::{NoopObserver, SimObserver};
pub use sim::Sim;
pub use telemetry::{EdgeTelemetry, VehicleTelemetry};
