//! SQLite output backend (feature `sqlite`).
//!
//! Creates a single `output.db` in the output directory with the tables
//! `vehicle_snapshots`, `edge_snapshots` and `tick_summaries`.  Each snapshot
//! batch is one transaction.

use std::path::Path;

use rusqlite::{Connection, params};

use crate::writer::OutputWriter;
use crate::{EdgeSnapshotRow, OutputError, OutputResult, TickSummaryRow, VehicleSnapshotRow};

const SCHEMA: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous  = NORMAL;
    CREATE TABLE IF NOT EXISTS vehicle_snapshots (
        vehicle_id INTEGER NOT NULL,
        tick       INTEGER NOT NULL,
        edge       INTEGER NOT NULL,
        arc        REAL    NOT NULL,
        x          REAL    NOT NULL,
        y          REAL    NOT NULL,
        heading    REAL    NOT NULL,
        velocity   REAL    NOT NULL,
        state      TEXT    NOT NULL
    );
    CREATE TABLE IF NOT EXISTS edge_snapshots (
        tick       INTEGER NOT NULL,
        edge       INTEGER NOT NULL,
        occupancy  INTEGER NOT NULL,
        mean_speed REAL    NOT NULL,
        PRIMARY KEY (tick, edge)
    );
    CREATE TABLE IF NOT EXISTS tick_summaries (
        tick          INTEGER PRIMARY KEY,
        sim_time_secs REAL    NOT NULL,
        live          INTEGER NOT NULL,
        arrived       INTEGER NOT NULL,
        died          INTEGER NOT NULL
    );";

pub struct SqliteWriter {
    conn:     Connection,
    finished: bool,
}

impl SqliteWriter {
    /// Open (or create) `output.db` in `dir` and initialise the schema.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        let conn = Connection::open(dir.join("output.db"))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, finished: false })
    }

    fn check_open(&self) -> OutputResult<()> {
        if self.finished {
            return Err(OutputError::Finished("output.db"));
        }
        Ok(())
    }
}

impl OutputWriter for SqliteWriter {
    fn write_vehicles(&mut self, rows: &[VehicleSnapshotRow]) -> OutputResult<()> {
        self.check_open()?;
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO vehicle_snapshots \
                 (vehicle_id, tick, edge, arc, x, y, heading, velocity, state) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for r in rows {
                // SQLite integers are i64; the raw id keeps its bit pattern.
                stmt.execute(params![
                    r.vehicle_id as i64,
                    r.tick as i64,
                    r.edge,
                    r.arc,
                    r.x,
                    r.y,
                    r.heading,
                    r.velocity,
                    r.state,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn write_edges(&mut self, rows: &[EdgeSnapshotRow]) -> OutputResult<()> {
        self.check_open()?;
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO edge_snapshots (tick, edge, occupancy, mean_speed) \
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for r in rows {
                stmt.execute(params![r.tick as i64, r.edge, r.occupancy, r.mean_speed])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn write_tick_summary(&mut self, r: &TickSummaryRow) -> OutputResult<()> {
        self.check_open()?;
        self.conn.execute(
            "INSERT INTO tick_summaries (tick, sim_time_secs, live, arrived, died) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![r.tick as i64, r.sim_time_secs, r.live as i64, r.arrived as i64, r.died as i64],
        )?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if !self.finished {
            self.finished = true;
            self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        }
        Ok(())
    }
}
