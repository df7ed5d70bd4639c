//! The `OutputWriter` trait implemented by all backend writers.

use crate::{EdgeSnapshotRow, OutputResult, TickSummaryRow, VehicleSnapshotRow};

/// A sink for the three output tables.
///
/// The observer reports errors through
/// [`SimOutputObserver::take_error`][crate::SimOutputObserver::take_error],
/// never by panicking.  Writing after [`finish`](Self::finish) fails with
/// [`OutputError::Finished`][crate::OutputError::Finished].
pub trait OutputWriter {
    fn write_vehicles(&mut self, rows: &[VehicleSnapshotRow]) -> OutputResult<()>;

    fn write_edges(&mut self, rows: &[EdgeSnapshotRow]) -> OutputResult<()>;

    fn write_tick_summary(&mut self, row: &TickSummaryRow) -> OutputResult<()>;

    /// Flush and close every table.  Idempotent.
    fn finish(&mut self) -> OutputResult<()>;
}
