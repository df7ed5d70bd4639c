//! Parquet output backend (feature `parquet`).
//!
//! Creates `vehicle_snapshots.parquet`, `edge_snapshots.parquet` and
//! `tick_summaries.parquet`, Snappy-compressed.  The footer is only written
//! by [`OutputWriter::finish`]; a file dropped before that is unreadable.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::writer::OutputWriter;
use crate::{EdgeSnapshotRow, OutputError, OutputResult, TickSummaryRow, VehicleSnapshotRow};

/// One Parquet file and its schema; `writer` is `None` once closed.
struct Sink {
    name:   &'static str,
    schema: SchemaRef,
    writer: Option<ArrowWriter<File>>,
}

impl Sink {
    fn create(dir: &Path, name: &'static str, fields: Vec<Field>) -> OutputResult<Self> {
        let schema: SchemaRef = Arc::new(Schema::new(fields));
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let writer = ArrowWriter::try_new(File::create(dir.join(name))?, Arc::clone(&schema), Some(props))?;
        Ok(Self { name, schema, writer: Some(writer) })
    }

    /// Append one record batch built from `columns` (in schema order).
    fn append(&mut self, columns: Vec<ArrayRef>) -> OutputResult<()> {
        let writer = self.writer.as_mut().ok_or(OutputError::Finished(self.name))?;
        let batch = RecordBatch::try_new(Arc::clone(&self.schema), columns)?;
        writer.write(&batch)?;
        Ok(())
    }

    fn ensure_open(&self) -> OutputResult<()> {
        match self.writer {
            Some(_) => Ok(()),
            None    => Err(OutputError::Finished(self.name)),
        }
    }

    fn close(&mut self) -> OutputResult<()> {
        if let Some(w) = self.writer.take() {
            w.close()?;
        }
        Ok(())
    }
}

fn u64s(values: impl IntoIterator<Item = u64>) -> ArrayRef {
    Arc::new(UInt64Array::from_iter_values(values))
}

fn u32s(values: impl IntoIterator<Item = u32>) -> ArrayRef {
    Arc::new(UInt32Array::from_iter_values(values))
}

fn f64s(values: impl IntoIterator<Item = f64>) -> ArrayRef {
    Arc::new(Float64Array::from_iter_values(values))
}

/// Writes simulation output to three Parquet files.
pub struct ParquetWriter {
    vehicles:  Sink,
    edges:     Sink,
    summaries: Sink,
}

impl ParquetWriter {
    pub fn new(dir: &Path) -> OutputResult<Self> {
        let vehicles = Sink::create(dir, "vehicle_snapshots.parquet", vec![
            Field::new("vehicle_id", DataType::UInt64,  false),
            Field::new("tick",       DataType::UInt64,  false),
            Field::new("edge",       DataType::UInt32,  false),
            Field::new("arc",        DataType::Float64, false),
            Field::new("x",          DataType::Float64, false),
            Field::new("y",          DataType::Float64, false),
            Field::new("heading",    DataType::Float64, false),
            Field::new("velocity",   DataType::Float64, false),
            Field::new("state",      DataType::Utf8,    false),
        ])?;
        let edges = Sink::create(dir, "edge_snapshots.parquet", vec![
            Field::new("tick",       DataType::UInt64,  false),
            Field::new("edge",       DataType::UInt32,  false),
            Field::new("occupancy",  DataType::UInt32,  false),
            Field::new("mean_speed", DataType::Float64, false),
        ])?;
        let summaries = Sink::create(dir, "tick_summaries.parquet", vec![
            Field::new("tick",          DataType::UInt64,  false),
            Field::new("sim_time_secs", DataType::Float64, false),
            Field::new("live",          DataType::UInt64,  false),
            Field::new("arrived",       DataType::UInt64,  false),
            Field::new("died",          DataType::UInt64,  false),
        ])?;
        Ok(Self { vehicles, edges, summaries })
    }
}

impl OutputWriter for ParquetWriter {
    fn write_vehicles(&mut self, rows: &[VehicleSnapshotRow]) -> OutputResult<()> {
        if rows.is_empty() {
            return self.vehicles.ensure_open();
        }
        self.vehicles.append(vec![
            u64s(rows.iter().map(|r| r.vehicle_id)),
            u64s(rows.iter().map(|r| r.tick)),
            u32s(rows.iter().map(|r| r.edge)),
            f64s(rows.iter().map(|r| r.arc)),
            f64s(rows.iter().map(|r| r.x)),
            f64s(rows.iter().map(|r| r.y)),
            f64s(rows.iter().map(|r| r.heading)),
            f64s(rows.iter().map(|r| r.velocity)),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.state))),
        ])
    }

    fn write_edges(&mut self, rows: &[EdgeSnapshotRow]) -> OutputResult<()> {
        if rows.is_empty() {
            return self.edges.ensure_open();
        }
        self.edges.append(vec![
            u64s(rows.iter().map(|r| r.tick)),
            u32s(rows.iter().map(|r| r.edge)),
            u32s(rows.iter().map(|r| r.occupancy)),
            f64s(rows.iter().map(|r| r.mean_speed)),
        ])
    }

    fn write_tick_summary(&mut self, r: &TickSummaryRow) -> OutputResult<()> {
        self.summaries.append(vec![
            u64s([r.tick]),
            f64s([r.sim_time_secs]),
            u64s([r.live]),
            u64s([r.arrived]),
            u64s([r.died]),
        ])
    }

    fn finish(&mut self) -> OutputResult<()> {
        self.vehicles.close()?;
        self.edges.close()?;
        self.summaries.close()
    }
}
