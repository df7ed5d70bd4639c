//! Adapter from [`SimObserver`] callbacks to an [`OutputWriter`].

use ts_core::{SimConfig, Tick};
use ts_sim::{SimObserver, TickReport};
use ts_spatial::RoadNetwork;
use ts_vehicle::VehicleStore;

use crate::row::{EdgeSnapshotRow, TickSummaryRow, VehicleSnapshotRow};
use crate::writer::OutputWriter;
use crate::{OutputError, OutputResult};

/// Records a summary row every tick and vehicle plus edge rows at every
/// snapshot tick.
///
/// Observer hooks cannot fail, so the first write error is parked and the
/// rest are dropped.  Check [`take_error`](Self::take_error) once the run
/// returns.
pub struct SimOutputObserver<W: OutputWriter> {
    writer:     W,
    tick_secs:  f64,
    first_err:  Option<OutputError>,
}

impl<W: OutputWriter> SimOutputObserver<W> {
    pub fn new(writer: W, config: &SimConfig) -> Self {
        Self { writer, tick_secs: config.tick_secs, first_err: None }
    }

    pub fn take_error(&mut self) -> Option<OutputError> {
        self.first_err.take()
    }

    /// Finish the backend.  `Sim::run_ticks` never reaches `on_sim_end`, so
    /// callers stepping in chunks end the output here.
    pub fn finish(&mut self) {
        let result = self.writer.finish();
        self.record(result);
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    fn record(&mut self, result: OutputResult<()>) {
        if let Err(e) = result {
            log::warn!("output write failed: {e}");
            self.first_err.get_or_insert(e);
        }
    }
}

impl<W: OutputWriter> SimObserver for SimOutputObserver<W> {
    fn on_tick_end(&mut self, tick: Tick, report: &TickReport) {
        let summary = TickSummaryRow {
            tick:          tick.0,
            sim_time_secs: tick.0 as f64 * self.tick_secs,
            live:          report.live as u64,
            arrived:       report.arrived as u64,
            died:          report.died as u64,
        };
        let result = self.writer.write_tick_summary(&summary);
        self.record(result);
    }

    fn on_snapshot(&mut self, tick: Tick, vehicles: &VehicleStore, network: &RoadNetwork) {
        let cars: Vec<_> = vehicles.iter().map(|v| VehicleSnapshotRow::of(tick, v)).collect();
        if !cars.is_empty() {
            let result = self.writer.write_vehicles(&cars);
            self.record(result);
        }

        let edges: Vec<_> = network.edges.iter().map(|e| EdgeSnapshotRow::of(tick, e)).collect();
        let result = self.writer.write_edges(&edges);
        self.record(result);
    }

    fn on_sim_end(&mut self, _final_tick: Tick) {
        self.finish();
    }
}
