//! Deferred writes produced by the think phase.

use ts_core::{EdgeId, IntersectionId, VehicleId};
use ts_spatial::{LaneChangePoint, Route};
use ts_vehicle::DriveState;

/// A write a vehicle wants applied during the move phase.
///
/// Think never mutates shared state; every side effect is one of these,
/// applied in ascending `VehicleId` order.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// First registration on `intersection`, approaching along `edge`.
    RegisterConflict {
        intersection: IntersectionId,
        edge:         EdgeId,
        remaining:    f64,
        will_wait:    bool,
    },

    /// Refresh an existing registration.
    UpdateConflict {
        intersection: IntersectionId,
        remaining:    f64,
        will_wait:    bool,
    },

    UnregisterConflict(IntersectionId),

    /// Move onto `target` at `point`.  The move phase re-checks that the
    /// target lane has room.
    BeginLaneChange {
        target: EdgeId,
        point:  LaneChangePoint,
        forced: bool,
    },

    /// Ask `to` to leave room for a merge at `arc` on its edge.
    RequestYield {
        to:  VehicleId,
        arc: f64,
    },
}

/// Why a vehicle is removed before it reaches a destination.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Fate {
    /// No destination is reachable.
    NoRoute,
    /// Non-finite kinematic state.
    Degenerate,
}

impl Fate {
    pub fn as_str(self) -> &'static str {
        match self {
            Fate::NoRoute    => "no_route",
            Fate::Degenerate => "degenerate",
        }
    }
}

impl std::fmt::Display for Fate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one think produces for one vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub acceleration: f64,
    pub state:        DriveState,
    pub intents:      Vec<Intent>,
    /// Replaces the vehicle's route after the intents are applied.
    pub new_route:    Option<Route>,
    /// `Some` removes the vehicle instead of moving it.
    pub fate:         Option<Fate>,
}

impl Decision {
    pub fn drive(acceleration: f64, state: DriveState) -> Self {
        Self { acceleration, state, intents: Vec::new(), new_route: None, fate: None }
    }

    pub fn die(fate: Fate) -> Self {
        Self { fate: Some(fate), ..Decision::drive(0.0, DriveState::FreeDrive) }
    }
}
