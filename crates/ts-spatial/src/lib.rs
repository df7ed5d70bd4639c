//! `ts-spatial` — curves, road graph, conflicts and routing.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                     |
//! |--------------|--------------------------------------------------------------|
//! | [`curve`]    | `CubicBezier`, `Curve` (arc-length table, subdivision)       |
//! | [`network`]  | `RoadNetwork`, `Node`, `Edge`, `NodeSpec`, `EdgeSpec`        |
//! | [`builder`]  | `RoadNetworkBuilder` (bulk load + one-shot discovery)        |
//! | [`lanes`]    | `LaneChangePoint`, `LaneChangeInterval`, discovery           |
//! | [`conflict`] | `Intersection`, `ConflictIndex`, `Registration`, arbitration |
//! | [`route`]    | `Route`, `RouteSegment`                                      |
//! | [`router`]   | `Router` trait, `AStarRouter`, `RouteRequest`                |
//! | [`signal`]   | `SignalSource` trait, `SignalBoard`, `NoSignals`             |
//! | [`error`]    | `SpatialError`, `SpatialResult<T>`                           |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on specs and routes.       |

pub mod builder;
pub mod conflict;
pub mod curve;
pub mod error;
pub mod lanes;
pub mod network;
pub mod route;
pub mod router;
pub mod signal;


pub use builder::RoadNetworkBuilder;
pub use conflict::{
    Arbitration, ArrivalEstimator, BlockingWindow, ConflictIndex, Intersection, Registration, Side,
};
pub use curve::{CubicBezier, Curve, CurveHit};
pub use error::{SpatialError, SpatialResult};
pub use lanes::{LaneChangeInterval, LaneChangePoint};
pub use network::{Edge, EdgeSpec, Node, NodeSpec, RoadNetwork, SpeedStats};
pub use route::{Route, RouteSegment};
pub use router::{AStarRouter, RouteRequest, RouteStart, Router};
pub use signal::{NoSignals, SignalBoard, SignalSource};
