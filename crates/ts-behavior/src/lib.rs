//! `ts-behavior` — driver models and the per-tick think kernel.
//!
//! Think is pure: given a vehicle and a read-only [`ThinkContext`] it returns
//! a [`Decision`] (acceleration, drive state and deferred [`Intent`]s).  The
//! move phase in `ts-mobility` applies decisions in ascending `VehicleId`
//! order.
//!
//! # Crate layout
//!
//! | Module           | Contents                                                  |
//! |------------------|-----------------------------------------------------------|
//! | [`model`]        | `CarFollowingModel` trait, `Obstacle`                     |
//! | [`idm`]          | `Idm` (Intelligent Driver Model)                          |
//! | [`mobil`]        | `Mobil` lane-change criterion, `MobilInput`               |
//! | [`estimator`]    | `VehicleEstimator` (arrival times for conflict windows)   |
//! | [`context`]      | `ThinkContext`, `ApproachIndex`                           |
//! | [`intent`]       | `Intent`, `Decision`, `Fate`                              |
//! | [`driver`]       | `DriverModel` trait                                       |
//! | [`kernel`]       | `TrafficDriver` (default `DriverModel`)                   |
//! | [`path`]         | path-ahead stretches                                      |
//! | [`leader`]       | leader search                                             |
//! | [`stops`]        | stop signs and signals                                    |
//! | [`arbitration`]  | conflict registration intents, deadlock-safe stops        |
//! | [`lane_change`]  | merge gap checks                                          |
//! | [`error`]        | `BehaviorError`, `BehaviorResult`                         |
//!
//! # Feature flags
//!
//! | Flag      | Effect                                                 |
//! |-----------|--------------------------------------------------------|
//! | `fx-hash` | FxHash for the per-tick `ApproachIndex`.               |

pub mod arbitration;
pub mod context;
pub mod driver;
pub mod error;
pub mod estimator;
pub mod idm;
pub mod intent;
pub mod kernel;
pub mod lane_change;
pub mod leader;
pub mod mobil;
pub mod model;
pub mod path;
pub mod stops;


pub use context::{Approach, ApproachIndex, ThinkContext};
pub use driver::DriverModel;
pub use error::{BehaviorError, BehaviorResult};
pub use estimator::VehicleEstimator;
pub use idm::Idm;
pub use intent::{Decision, Fate, Intent};
pub use kernel::TrafficDriver;
pub use lane_change::merge_entry_arc;
pub use mobil::{Mobil, MobilInput};
pub use model::{CarFollowingModel, Obstacle};
