//! CSV output backend.
//!
//! Creates three files in the output directory: `vehicle_snapshots.csv`,
//! `edge_snapshots.csv` and `tick_summaries.csv`.

use std::fs::File;
use std::path::Path;

use csv::Writer;

use crate::writer::OutputWriter;
use crate::{EdgeSnapshotRow, OutputError, OutputResult, TickSummaryRow, VehicleSnapshotRow};

/// One CSV file; `None` once finished.
struct Table {
    name:   &'static str,
    writer: Option<Writer<File>>,
}

impl Table {
    fn create(dir: &Path, name: &'static str, header: &[&str]) -> OutputResult<Self> {
        let mut writer = Writer::from_path(dir.join(name))?;
        writer.write_record(header)?;
        Ok(Self { name, writer: Some(writer) })
    }

    fn open(&mut self) -> OutputResult<&mut Writer<File>> {
        self.writer.as_mut().ok_or(OutputError::Finished(self.name))
    }

    fn close(&mut self) -> OutputResult<()> {
        if let Some(mut w) = self.writer.take() {
            w.flush()?;
        }
        Ok(())
    }
}

/// Writes simulation output to CSV files.
///
/// Floats are written with millimetre (or milli-unit) precision.
pub struct CsvWriter {
    vehicles:  Table,
    edges:     Table,
    summaries: Table,
}

impl CsvWriter {
    /// Create (truncating) the three files in `dir` and write their headers.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        Ok(Self {
            vehicles: Table::create(
                dir,
                "vehicle_snapshots.csv",
                &["vehicle_id", "tick", "edge", "arc", "x", "y", "heading", "velocity", "state"],
            )?,
            edges: Table::create(
                dir,
                "edge_snapshots.csv",
                &["tick", "edge", "occupancy", "mean_speed"],
            )?,
            summaries: Table::create(
                dir,
                "tick_summaries.csv",
                &["tick", "sim_time_secs", "live", "arrived", "died"],
            )?,
        })
    }
}

impl OutputWriter for CsvWriter {
    fn write_vehicles(&mut self, rows: &[VehicleSnapshotRow]) -> OutputResult<()> {
        let w = self.vehicles.open()?;
        for r in rows {
            w.write_record(&[
                r.vehicle_id.to_string(),
                r.tick.to_string(),
                r.edge.to_string(),
                format!("{:.3}", r.arc),
                format!("{:.3}", r.x),
                format!("{:.3}", r.y),
                format!("{:.4}", r.heading),
                format!("{:.3}", r.velocity),
                r.state.to_owned(),
            ])?;
        }
        Ok(())
    }

    fn write_edges(&mut self, rows: &[EdgeSnapshotRow]) -> OutputResult<()> {
        let w = self.edges.open()?;
        for r in rows {
            w.write_record(&[
                r.tick.to_string(),
                r.edge.to_string(),
                r.occupancy.to_string(),
                format!("{:.3}", r.mean_speed),
            ])?;
        }
        Ok(())
    }

    fn write_tick_summary(&mut self, r: &TickSummaryRow) -> OutputResult<()> {
        self.summaries.open()?.write_record(&[
            r.tick.to_string(),
            format!("{:.3}", r.sim_time_secs),
            r.live.to_string(),
            r.arrived.to_string(),
            r.died.to_string(),
        ])?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        self.vehicles.close()?;
        self.edges.close()?;
        self.summaries.close()
    }
}
