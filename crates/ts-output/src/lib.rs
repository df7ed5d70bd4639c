//! `ts-output` — simulation output writers for the rust_ts traffic kernel.
//!
//! Three backends are provided behind Cargo features:
//!
//! | Feature   | Backend | Files created                                                                   |
//! |-----------|---------|---------------------------------------------------------------------------------|
//! | *(none)*  | CSV     | `vehicle_snapshots.csv`, `edge_snapshots.csv`, `tick_summaries.csv`             |
//! | `sqlite`  | SQLite  | `output.db` (one table per stream)                                              |
//! | `parquet` | Parquet | `vehicle_snapshots.parquet`, `edge_snapshots.parquet`, `tick_summaries.parquet` |
//!
//! All backends implement [`OutputWriter`] and are driven by
//! [`SimOutputObserver`], which implements `ts_sim::SimObserver`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ts_output::{CsvWriter, SimOutputObserver};
//!
//! let writer = CsvWriter::new(Path::new("./output"))?;
//! let mut obs = SimOutputObserver::new(writer, &config);
//! sim.run(&mut obs)?;
//! if let Some(e) = obs.take_error() {
//!     eprintln!("output error: {e}");
//! }
//! ```

pub mod csv;
pub mod error;
pub mod observer;
pub mod row;
pub mod writer;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "parquet")]
pub mod parquet;

#[cfg(test)]
mod tests;

pub use csv::CsvWriter;
pub use error::{OutputError, OutputResult};
pub use observer::SimOutputObserver;
pub use row::{EdgeSnapshotRow, TickSummaryRow, VehicleSnapshotRow};
pub use writer::OutputWriter;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteWriter;

#[cfg(feature = "parquet")]
pub use parquet::ParquetWriter;
