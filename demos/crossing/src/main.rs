//! crossing — a two-lane arterial crossed by a signalised side road.
//!
//! Cars enter on both arterial lanes and on the side road, heading for one
//! of the exits.  Cars entering lane 1 for exit `x` must change lanes;
//! side-road cars wait for the signal and for gaps in arterial traffic.
//!
//! Usage: `crossing [config.json]`.  The optional file overrides any
//! `SimConfig` field; missing fields keep their defaults.  Set `RUST_LOG`
//! (e.g. `RUST_LOG=debug`) for kernel logging.

mod network;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use ts_behavior::TrafficDriver;
use ts_core::{SimConfig, SimRng, VehicleClass};
use ts_mobility::VehicleEvent;
use ts_output::{CsvWriter, SimOutputObserver};
use ts_sim::{SimBuilder, SimError};
use ts_spatial::AStarRouter;

use network::build_network;

// ── Constants ─────────────────────────────────────────────────────────────────

const OUTPUT_DIR:       &str = "output/crossing";
/// Ticks between spawn attempts.
const SPAWN_INTERVAL:   u64  = 25;
/// Ticks between signal phase changes.
const SIGNAL_PHASE:     u64  = 300;

fn load_config() -> Result<SimConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let file = File::open(&path).with_context(|| format!("opening {path}"))?;
            let config = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("parsing {path}"))?;
            Ok(config)
        }
        None => Ok(SimConfig::default()),
    }
}

fn main() -> Result<()> {
    env_logger::init();

    println!("=== crossing — rust_ts traffic kernel ===");

    // 1. Configuration and network.
    let config = load_config()?;
    let (network, layout) = build_network(config.kernel.clone())?;
    println!(
        "Road network: {} nodes, {} edges, {} intersections",
        network.node_count(),
        network.edge_count(),
        network.conflicts.len(),
    );
    println!(
        "Sim: {} ticks of {} s, seed {}, output every {} ticks",
        config.total_ticks, config.tick_secs, config.seed, config.output_interval_ticks
    );
    println!();

    // 2. Build sim.  Signals start red for the side road.
    let driver = TrafficDriver::new(&config.kernel)?;
    let mut sim = SimBuilder::new(config.clone(), network, driver, AStarRouter).build()?;
    sim.signals.set_red(layout.signal, true);

    // 3. Set up output.
    std::fs::create_dir_all(OUTPUT_DIR)?;
    let writer = CsvWriter::new(Path::new(OUTPUT_DIR))?;
    let mut obs = SimOutputObserver::new(writer, &config);

    // 4. Run in spawn-interval chunks.
    let mut demand = SimRng::new(config.seed).child(1);
    let entries = [
        (layout.lane1_entry, [layout.exit_x, layout.exit_y]),
        (layout.lane2_entry, [layout.exit_x, layout.exit_y]),
        (layout.side_entry,  [layout.exit_north, layout.exit_north]),
    ];
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut rejected = 0usize;

    let t0 = Instant::now();
    while sim.now().0 < config.total_ticks {
        for (edge, exits) in &entries {
            if !demand.gen_bool(0.5) {
                continue;
            }
            let Some(&exit) = demand.choose(exits) else { continue };
            match sim.insert_vehicle(VehicleClass::Car, *edge, [exit]) {
                Ok(_) => {}
                Err(SimError::Rejected(e)) => {
                    log::debug!("spawn skipped: {e}");
                    rejected += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        let chunk = SPAWN_INTERVAL.min(config.total_ticks - sim.now().0);
        sim.run_ticks(chunk, &mut obs)?;

        if sim.now().0 % SIGNAL_PHASE < SPAWN_INTERVAL {
            let red = sim.signals.toggle(layout.signal);
            log::info!("{}: side-road signal {}", sim.clock, if red { "red" } else { "green" });
        }

        for e in sim.drain_events() {
            *counts.entry(e.event.as_str()).or_default() += 1;
            if let VehicleEvent::Died { vehicle, reason } = e.event {
                log::warn!("{}: {vehicle} died ({reason})", e.tick);
            }
        }
    }
    obs.finish();
    let elapsed = t0.elapsed();

    if let Some(e) = obs.take_error() {
        eprintln!("output error: {e}");
    }

    // 5. Summary.
    println!("Simulation complete in {:.3} s ({})", elapsed.as_secs_f64(), sim.clock);
    println!("  spawns rejected    : {rejected}");
    println!("  vehicles still live: {}", sim.vehicles.len());
    println!();
    println!("{:<22} {:>8}", "Event", "Count");
    println!("{}", "-".repeat(31));
    for (kind, n) in &counts {
        println!("{kind:<22} {n:>8}");
    }
    println!();

    println!("{:<8} {:>10} {:>10}", "Edge", "Vehicles", "Mean m/s");
    println!("{}", "-".repeat(30));
    for edge in &sim.network.edges {
        let t = sim.edge_telemetry(edge.id)?;
        println!("{:<8} {:>10} {:>10.2}", t.id.0, t.occupancy, t.mean_speed);
    }

    Ok(())
}
