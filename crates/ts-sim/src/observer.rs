//! Simulation observer trait for progress reporting and data collection.

use ts_core::Tick;
use ts_spatial::RoadNetwork;
use ts_vehicle::VehicleStore;

use crate::TickReport;

/// Callbacks invoked by [`Sim::run`][crate::Sim::run] and
/// [`Sim::run_ticks`][crate::Sim::run_ticks] at key points in the tick loop.
///
/// All methods have default no-op implementations so implementors only need to
/// override what they care about.
///
/// # Example: progress printer
///
/// ```rust,ignore
/// struct ProgressPrinter { interval: u64 }
///
/// impl SimObserver for ProgressPrinter {
///     fn on_tick_end(&mut self, tick: Tick, report: &TickReport) {
///         if tick.0 % self.interval == 0 {
///             println!("{tick}: {} vehicles live", report.live);
///         }
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called at the very start of each tick, before think.
    fn on_tick_start(&mut self, _tick: Tick) {}

    /// Called after the move phase of each tick.
    fn on_tick_end(&mut self, _tick: Tick, _report: &TickReport) {}

    /// Called at snapshot intervals (every `config.output_interval_ticks`
    /// ticks) with read-only access to the vehicles and the network, so that
    /// output writers can record positions without the sim knowing any
    /// output format.
    fn on_snapshot(
        &mut self,
        _tick:     Tick,
        _vehicles: &VehicleStore,
        _network:  &RoadNetwork,
    ) {}

    /// Called once after the final tick of [`Sim::run`][crate::Sim::run].
    fn on_sim_end(&mut self, _final_tick: Tick) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}
