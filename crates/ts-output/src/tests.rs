//! Integration tests for ts-output.

#[cfg(test)]
mod fixtures {
    use crate::row::{EdgeSnapshotRow, TickSummaryRow, VehicleSnapshotRow};

    pub fn tmp() -> tempfile::TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    pub fn snap_row(vehicle_id: u64, tick: u64) -> VehicleSnapshotRow {
        VehicleSnapshotRow {
            vehicle_id,
            tick,
            edge:     vehicle_id as u32,
            arc:      12.5,
            x:        12.5,
            y:        -3.25,
            heading:  0.0,
            velocity: 8.0,
            state:    "following",
        }
    }

    pub fn edge_row(edge: u32, tick: u64) -> EdgeSnapshotRow {
        EdgeSnapshotRow { tick, edge, occupancy: 3, mean_speed: 11.25 }
    }

    pub fn summary_row(tick: u64) -> TickSummaryRow {
        TickSummaryRow { tick, sim_time_secs: tick as f64 * 0.1, live: 4, arrived: 1, died: 0 }
    }
}

#[cfg(test)]
mod csv_tests {
    use super::fixtures::*;
    use crate::OutputError;
    use crate::csv::CsvWriter;
    use crate::writer::OutputWriter;

    #[test]
    fn csv_files_created() {
        let dir = tmp();
        let _w = CsvWriter::new(dir.path()).unwrap();
        for name in ["vehicle_snapshots.csv", "edge_snapshots.csv", "tick_summaries.csv"] {
            assert!(dir.path().join(name).exists(), "{name} missing");
        }
    }

    #[test]
    fn csv_headers_correct() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.finish().unwrap();

        let mut rdr = csv::Reader::from_path(dir.path().join("vehicle_snapshots.csv")).unwrap();
        let headers: Vec<_> = rdr.headers().unwrap().iter().map(str::to_owned).collect();
        assert_eq!(headers, ["vehicle_id", "tick", "edge", "arc", "x", "y", "heading", "velocity", "state"]);

        let mut rdr = csv::Reader::from_path(dir.path().join("edge_snapshots.csv")).unwrap();
        let headers: Vec<_> = rdr.headers().unwrap().iter().map(str::to_owned).collect();
        assert_eq!(headers, ["tick", "edge", "occupancy", "mean_speed"]);

        let mut rdr = csv::Reader::from_path(dir.path().join("tick_summaries.csv")).unwrap();
        let headers: Vec<_> = rdr.headers().unwrap().iter().map(str::to_owned).collect();
        assert_eq!(headers, ["tick", "sim_time_secs", "live", "arrived", "died"]);
    }

    #[test]
    fn csv_snapshot_rows() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.write_vehicles(&[snap_row(0, 5), snap_row(1, 5), snap_row(2, 5)]).unwrap();
        w.finish().unwrap();

        let mut rdr = csv::Reader::from_path(dir.path().join("vehicle_snapshots.csv")).unwrap();
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][0], "0");          // vehicle_id
        assert_eq!(&rows[0][1], "5");          // tick
        assert_eq!(&rows[1][2], "1");          // edge
        assert_eq!(&rows[2][3], "12.500");     // arc
        assert_eq!(&rows[2][5], "-3.250");     // y
        assert_eq!(&rows[2][8], "following");  // state
    }

    #[test]
    fn csv_edge_rows() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.write_edges(&[edge_row(0, 10), edge_row(4, 10)]).unwrap();
        w.finish().unwrap();

        let mut rdr = csv::Reader::from_path(dir.path().join("edge_snapshots.csv")).unwrap();
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][1], "4");
        assert_eq!(&rows[1][2], "3");
        assert_eq!(&rows[1][3], "11.250");
    }

    #[test]
    fn csv_tick_summary_row() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.write_tick_summary(&summary_row(30)).unwrap();
        w.finish().unwrap();

        let mut rdr = csv::Reader::from_path(dir.path().join("tick_summaries.csv")).unwrap();
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "30");
        assert_eq!(&rows[0][1], "3.000");
        assert_eq!(&rows[0][2], "4");
        assert_eq!(&rows[0][3], "1");
        assert_eq!(&rows[0][4], "0");
    }

    #[test]
    fn csv_finish_idempotent() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.finish().unwrap();
        w.finish().unwrap();
    }

    #[test]
    fn csv_write_after_finish_fails() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.finish().unwrap();
        let err = w.write_tick_summary(&summary_row(1)).unwrap_err();
        assert!(matches!(err, OutputError::Finished("tick_summaries.csv")));
        assert!(w.write_vehicles(&[]).is_err());
    }

    #[test]
    fn csv_empty_snapshot_ok() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.write_vehicles(&[]).unwrap();
        w.write_edges(&[]).unwrap();
    }
}

// ── Observer ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod observer_tests {
    use ts_behavior::TrafficDriver;
    use ts_core::{EdgeId, NodeId, SimConfig, Vec2, VehicleClass};
    use ts_mobility::SpawnOptions;
    use ts_sim::SimBuilder;
    use ts_spatial::{AStarRouter, EdgeSpec, NodeSpec, RoadNetworkBuilder};

    use super::fixtures::tmp;
    use crate::csv::CsvWriter;
    use crate::observer::SimOutputObserver;

    #[test]
    fn integration_csv() {
        let mut b = RoadNetworkBuilder::new();
        let a = b.add_node(NodeSpec::at(Vec2::new(0.0, 0.0)));
        let z = b.add_node(NodeSpec::at(Vec2::new(500.0, 0.0)));
        let edge = b.add_edge(a, z, EdgeSpec::default());
        let network = b.build().unwrap();

        let config = SimConfig {
            seed:                  1,
            tick_secs:             0.1,
            total_ticks:           6,
            num_threads:           Some(1),
            output_interval_ticks: 2,
            kernel:                network.kernel().clone(),
        };
        let driver = TrafficDriver::new(&config.kernel).unwrap();
        let mut sim = SimBuilder::new(config.clone(), network, driver, AStarRouter).build().unwrap();
        sim.insert_vehicle(VehicleClass::Car, edge, [z]).unwrap();
        sim.insert_vehicle_with(&moving_car(edge, z)).unwrap();

        let dir = tmp();
        let writer = CsvWriter::new(dir.path()).unwrap();
        let mut obs = SimOutputObserver::new(writer, &config);
        sim.run(&mut obs).unwrap();
        assert!(obs.take_error().is_none(), "no write errors expected");

        // output_interval = 2 → snapshots at ticks 0, 2, 4 (3 ticks × 2 vehicles)
        let mut rdr = csv::Reader::from_path(dir.path().join("vehicle_snapshots.csv")).unwrap();
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 6, "expected 3 ticks × 2 vehicles, got {}", rows.len());

        let mut rdr = csv::Reader::from_path(dir.path().join("tick_summaries.csv")).unwrap();
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 6);
        assert_eq!(&rows[5][0], "5");
        assert_eq!(&rows[5][2], "2");

        // One edge per snapshot tick, both cars on it.
        let mut rdr = csv::Reader::from_path(dir.path().join("edge_snapshots.csv")).unwrap();
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        let ticks: Vec<_> = rows.iter().map(|r| r[0].to_owned()).collect();
        assert_eq!(ticks, ["0", "2", "4"]);
        assert!(rows.iter().all(|r| &r[2] == "2"));
    }

    #[test]
    fn stepping_then_finish_flushes() {
        let mut b = RoadNetworkBuilder::new();
        let a = b.add_node(NodeSpec::at(Vec2::new(0.0, 0.0)));
        let z = b.add_node(NodeSpec::at(Vec2::new(300.0, 0.0)));
        let edge = b.add_edge(a, z, EdgeSpec::default());
        let network = b.build().unwrap();
        let config = SimConfig { output_interval_ticks: 1, kernel: network.kernel().clone(), ..SimConfig::default() };

        let driver = TrafficDriver::new(&config.kernel).unwrap();
        let mut sim = SimBuilder::new(config.clone(), network, driver, AStarRouter).build().unwrap();
        sim.insert_vehicle(VehicleClass::Car, edge, [z]).unwrap();

        let dir = tmp();
        let mut obs = SimOutputObserver::new(CsvWriter::new(dir.path()).unwrap(), &config);
        sim.run_ticks(3, &mut obs).unwrap();
        obs.finish();
        assert!(obs.take_error().is_none());

        let mut rdr = csv::Reader::from_path(dir.path().join("vehicle_snapshots.csv")).unwrap();
        assert_eq!(rdr.records().count(), 3);
    }

    /// A second car further along the edge, already moving.
    fn moving_car(edge: EdgeId, dest: NodeId) -> SpawnOptions {
        SpawnOptions::new(VehicleClass::Car, edge, [dest]).at_arc(100.0).velocity(10.0)
    }
}

// ── SQLite tests ──────────────────────────────────────────────────────────────

#[cfg(all(test, feature = "sqlite"))]
mod sqlite_tests {
    use super::fixtures::*;
    use crate::OutputError;
    use crate::sqlite::SqliteWriter;
    use crate::writer::OutputWriter;

    #[test]
    fn sqlite_db_created() {
        let dir = tmp();
        let _w = SqliteWriter::new(dir.path()).unwrap();
        assert!(dir.path().join("output.db").exists());
    }

    #[test]
    fn sqlite_snapshot_count() {
        let dir = tmp();
        let mut w = SqliteWriter::new(dir.path()).unwrap();
        w.write_vehicles(&[snap_row(0, 1), snap_row(1, 1), snap_row(2, 1)]).unwrap();
        w.finish().unwrap();

        let conn = rusqlite::Connection::open(dir.path().join("output.db")).unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM vehicle_snapshots", [], |r| r.get(0)
        ).unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn sqlite_state_and_position_stored() {
        let dir = tmp();
        let mut w = SqliteWriter::new(dir.path()).unwrap();
        w.write_vehicles(&[snap_row(7, 0)]).unwrap();
        w.finish().unwrap();

        let conn = rusqlite::Connection::open(dir.path().join("output.db")).unwrap();
        let (state, y): (String, f64) = conn.query_row(
            "SELECT state, y FROM vehicle_snapshots WHERE vehicle_id = 7", [], |r| Ok((r.get(0)?, r.get(1)?))
        ).unwrap();
        assert_eq!(state, "following");
        assert_eq!(y, -3.25);
    }

    #[test]
    fn sqlite_edge_rows() {
        let dir = tmp();
        let mut w = SqliteWriter::new(dir.path()).unwrap();
        w.write_edges(&[edge_row(0, 3), edge_row(1, 3)]).unwrap();
        w.finish().unwrap();

        let conn = rusqlite::Connection::open(dir.path().join("output.db")).unwrap();
        let (occupancy, speed): (i64, f64) = conn.query_row(
            "SELECT occupancy, mean_speed FROM edge_snapshots WHERE edge = 1", [], |r| Ok((r.get(0)?, r.get(1)?))
        ).unwrap();
        assert_eq!(occupancy, 3);
        assert_eq!(speed, 11.25);
    }

    #[test]
    fn sqlite_write_after_finish_fails() {
        let dir = tmp();
        let mut w = SqliteWriter::new(dir.path()).unwrap();
        w.finish().unwrap();
        w.finish().unwrap();
        assert!(matches!(w.write_edges(&[edge_row(0, 0)]), Err(OutputError::Finished("output.db"))));
    }

    #[test]
    fn sqlite_tick_summary() {
        let dir = tmp();
        let mut w = SqliteWriter::new(dir.path()).unwrap();
        w.write_tick_summary(&summary_row(7)).unwrap();
        w.finish().unwrap();

        let conn = rusqlite::Connection::open(dir.path().join("output.db")).unwrap();
        let (tick, live, arrived): (i64, i64, i64) = conn.query_row(
            "SELECT tick, live, arrived FROM tick_summaries WHERE tick = 7",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        ).unwrap();
        assert_eq!(tick, 7);
        assert_eq!(live, 4);
        assert_eq!(arrived, 1);
    }
}

// ── Parquet tests ─────────────────────────────────────────────────────────────

#[cfg(all(test, feature = "parquet"))]
mod parquet_tests {
    use arrow::datatypes::DataType;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    use super::fixtures::*;
    use crate::OutputError;
    use crate::parquet::ParquetWriter;
    use crate::writer::OutputWriter;

    #[test]
    fn parquet_files_created() {
        let dir = tmp();
        let mut w = ParquetWriter::new(dir.path()).unwrap();
        w.finish().unwrap();
        for name in ["vehicle_snapshots.parquet", "edge_snapshots.parquet", "tick_summaries.parquet"] {
            assert!(dir.path().join(name).exists(), "{name} missing");
        }
    }

    #[test]
    fn parquet_snapshot_rows_and_schema() {
        let dir = tmp();
        let mut w = ParquetWriter::new(dir.path()).unwrap();
        w.write_vehicles(&[snap_row(0, 2), snap_row(1, 2)]).unwrap();
        w.finish().unwrap();

        let file = std::fs::File::open(dir.path().join("vehicle_snapshots.parquet")).unwrap();
        let builder = ParquetRecordBatchReaderBuilder::try_new(file).unwrap();
        let schema = builder.schema().clone();
        let reader = builder.build().unwrap();

        let total_rows: usize = reader.map(|b| b.unwrap().num_rows()).sum();
        assert_eq!(total_rows, 2);

        let field_names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(field_names, ["vehicle_id", "tick", "edge", "arc", "x", "y", "heading", "velocity", "state"]);
        assert_eq!(*schema.field_with_name("state").unwrap().data_type(), DataType::Utf8);
    }

    #[test]
    fn parquet_edge_and_summary_rows() {
        let dir = tmp();
        let mut w = ParquetWriter::new(dir.path()).unwrap();
        w.write_edges(&[edge_row(0, 1), edge_row(1, 1), edge_row(2, 1)]).unwrap();
        w.write_tick_summary(&summary_row(0)).unwrap();
        w.write_tick_summary(&summary_row(1)).unwrap();
        w.finish().unwrap();

        for (name, expected) in [("edge_snapshots.parquet", 3), ("tick_summaries.parquet", 2)] {
            let file = std::fs::File::open(dir.path().join(name)).unwrap();
            let reader = ParquetRecordBatchReaderBuilder::try_new(file).unwrap().build().unwrap();
            let rows: usize = reader.map(|b| b.unwrap().num_rows()).sum();
            assert_eq!(rows, expected, "{name}");
        }
    }

    #[test]
    fn parquet_write_after_finish_fails() {
        let dir = tmp();
        let mut w = ParquetWriter::new(dir.path()).unwrap();
        w.finish().unwrap();
        assert!(matches!(
            w.write_vehicles(&[snap_row(0, 0)]),
            Err(OutputError::Finished("vehicle_snapshots.parquet"))
        ));
        assert!(w.write_edges(&[]).is_err());
    }

    #[test]
    fn parquet_finish_required() {
        let dir = tmp();
        {
            let mut w = ParquetWriter::new(dir.path()).unwrap();
            w.write_vehicles(&[snap_row(0, 0)]).unwrap();
            // Dropped without finish(): no footer.
        }

        let file = std::fs::File::open(dir.path().join("vehicle_snapshots.parquet")).unwrap();
        assert!(ParquetRecordBatchReaderBuilder::try_new(file).is_err());
    }
}
