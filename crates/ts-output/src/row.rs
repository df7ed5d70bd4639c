//! Plain data row types written by output backends.

use ts_core::Tick;
use ts_spatial::Edge;
use ts_vehicle::Vehicle;

/// One vehicle's kinematic state at a snapshot tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleSnapshotRow {
    /// `VehicleId::to_raw`, so a recycled slot gets a distinct value.
    pub vehicle_id: u64,
    pub tick:       u64,
    pub edge:       u32,
    pub arc:        f64,
    pub x:          f64,
    pub y:          f64,
    pub heading:    f64,
    pub velocity:   f64,
    /// `DriveState::as_str` label.
    pub state:      &'static str,
}

impl VehicleSnapshotRow {
    pub fn of(tick: Tick, v: &Vehicle) -> Self {
        Self {
            vehicle_id: v.id.to_raw(),
            tick:       tick.0,
            edge:       v.edge.0,
            arc:        v.arc,
            x:          v.position.x,
            y:          v.position.y,
            heading:    v.heading,
            velocity:   v.velocity,
            state:      v.state.as_str(),
        }
    }
}

/// Occupancy and running mean speed of one edge at a snapshot tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeSnapshotRow {
    pub tick:       u64,
    pub edge:       u32,
    pub occupancy:  u32,
    pub mean_speed: f64,
}

impl EdgeSnapshotRow {
    pub fn of(tick: Tick, edge: &Edge) -> Self {
        Self {
            tick:       tick.0,
            edge:       edge.id.0,
            occupancy:  edge.occupancy.len() as u32,
            mean_speed: edge.speed.mean,
        }
    }
}

/// Summary counts for one simulation tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSummaryRow {
    pub tick:          u64,
    /// Simulated seconds at the start of the tick.
    pub sim_time_secs: f64,
    pub live:          u64,
    pub arrived:       u64,
    pub died:          u64,
}
