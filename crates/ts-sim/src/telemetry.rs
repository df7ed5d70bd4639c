//! Read-only views of vehicles and edges for renderers and output writers.

use ts_core::{Aabb, EdgeId, Vec2, VehicleClass, VehicleId};
use ts_spatial::Edge;
use ts_vehicle::{DriveState, Vehicle};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VehicleTelemetry {
    pub id:            VehicleId,
    pub class:         VehicleClass,
    pub edge:          EdgeId,
    pub arc:           f64,
    pub position:      Vec2,
    pub heading:       f64,
    pub bounds:        Aabb,
    pub velocity:      f64,
    pub acceleration:  f64,
    pub state:         DriveState,
    pub lane_changing: bool,
}

impl VehicleTelemetry {
    pub fn of(v: &Vehicle) -> Self {
        Self {
            id:            v.id,
            class:         v.class,
            edge:          v.edge,
            arc:           v.arc,
            position:      v.position,
            heading:       v.heading,
            bounds:        v.bounding_box(),
            velocity:      v.velocity,
            acceleration:  v.acceleration,
            state:         v.state,
            lane_changing: v.is_lane_changing(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EdgeTelemetry {
    pub id:         EdgeId,
    pub occupancy:  usize,
    /// Mean of the speeds sampled since the last reset; 0 with no samples.
    pub mean_speed: f64,
    pub samples:    u64,
}

impl EdgeTelemetry {
    pub fn of(edge: &Edge) -> Self {
        Self {
            id:         edge.id,
            occupancy:  edge.occupancy.len(),
            mean_speed: edge.speed.mean,
            samples:    edge.speed.samples,
        }
    }
}
