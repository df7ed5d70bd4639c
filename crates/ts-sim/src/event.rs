//! The event log and per-tick reports.

use ts_core::Tick;
use ts_mobility::VehicleEvent;

/// A vehicle event stamped with the tick it happened in.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SimEvent {
    pub tick:  Tick,
    pub event: VehicleEvent,
}

/// What one call to [`Sim::advance`][crate::Sim::advance] did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick:    Tick,
    /// Vehicles that ran think this tick.
    pub thought: usize,
    pub arrived: usize,
    pub died:    usize,
    /// Vehicles on the network after the move phase.
    pub live:    usize,
}
