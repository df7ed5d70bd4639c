//! Lifecycle events emitted by the move phase.

use ts_behavior::Fate;
use ts_core::{EdgeId, NodeId, VehicleId};

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum VehicleEvent {
    Spawned { vehicle: VehicleId, edge: EdgeId },
    /// Reached one of its destinations and left the network.
    Arrived { vehicle: VehicleId, node: NodeId },
    Died { vehicle: VehicleId, reason: Fate },
    LaneChangeStarted {
        vehicle: VehicleId,
        from:    EdgeId,
        to:      EdgeId,
        forced:  bool,
    },
    LaneChangeCompleted { vehicle: VehicleId, edge: EdgeId },
    /// The route was replaced mid-trip.
    Rerouted { vehicle: VehicleId },
}

impl VehicleEvent {
    pub fn vehicle(&self) -> VehicleId {
        match *self {
            VehicleEvent::Spawned { vehicle, .. }
            | VehicleEvent::Arrived { vehicle, .. }
            | VehicleEvent::Died { vehicle, .. }
            | VehicleEvent::LaneChangeStarted { vehicle, .. }
            | VehicleEvent::LaneChangeCompleted { vehicle, .. }
            | VehicleEvent::Rerouted { vehicle } => vehicle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleEvent::Spawned { .. }             => "spawned",
            VehicleEvent::Arrived { .. }             => "arrived",
            VehicleEvent::Died { .. }                => "died",
            VehicleEvent::LaneChangeStarted { .. }   => "lane_change_started",
            VehicleEvent::LaneChangeCompleted { .. } => "lane_change_completed",
            VehicleEvent::Rerouted { .. }            => "rerouted",
        }
    }
}
