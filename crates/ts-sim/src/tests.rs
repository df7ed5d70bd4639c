//! Integration tests for ts-sim.

#[cfg(test)]
mod helpers {
    use ts_behavior::TrafficDriver;
    use ts_core::{KernelConfig, NodeId, SimConfig, Vec2};
    use ts_spatial::{AStarRouter, EdgeSpec, NodeSpec, RoadNetwork, RoadNetworkBuilder};

    use crate::{Sim, SimBuilder};

    pub type TestSim = Sim<TrafficDriver, AStarRouter>;

    pub fn test_config(kernel: KernelConfig, total_ticks: u64) -> SimConfig {
        SimConfig {
            seed:                  42,
            tick_secs:             0.1,
            total_ticks,
            num_threads:           Some(1),
            output_interval_ticks: 10,
            kernel,
        }
    }

    /// Kernel constants without per-vehicle parameter jitter.
    pub fn exact_kernel() -> KernelConfig {
        KernelConfig { parameter_spread: 0.0, ..KernelConfig::default() }
    }

    pub fn sim_on(network: RoadNetwork, total_ticks: u64) -> TestSim {
        let kernel = network.kernel().clone();
        let driver = TrafficDriver::new(&kernel).unwrap();
        SimBuilder::new(test_config(kernel, total_ticks), network, driver, AStarRouter)
            .build()
            .unwrap()
    }

    pub fn node(b: &mut RoadNetworkBuilder, x: f64, y: f64) -> NodeId {
        b.add_node(NodeSpec::at(Vec2::new(x, y)))
    }

    /// Straight road split in two at x = 100:  a → b → c.
    pub fn two_segments(signal_at_b: bool) -> (RoadNetwork, [NodeId; 3]) {
        let mut bld = RoadNetworkBuilder::new();
        let a = node(&mut bld, 0.0, 0.0);
        let mut mid = NodeSpec::at(Vec2::new(100.0, 0.0));
        if signal_at_b {
            mid = mid.with_signal();
        }
        let b = bld.add_node(mid);
        let c = node(&mut bld, 200.0, 0.0);
        bld.add_edge(a, b, EdgeSpec::default());
        bld.add_edge(b, c, EdgeSpec::default());
        (bld.build().unwrap(), [a, b, c])
    }

    /// Entry Z(-50,0) → A(0,0); A → B(60,0) is an arch of about 100 m and
    /// A → C(30,0) → B is a straight 60 m.
    ///
    ///   edge 0: Z → A
    ///   edge 1: A → B (arch)
    ///   edge 2: A → C
    ///   edge 3: C → B
    pub fn detour() -> (RoadNetwork, [NodeId; 4]) {
        let mut b = RoadNetworkBuilder::new();
        let z = node(&mut b, -50.0, 0.0);
        let a = node(&mut b, 0.0, 0.0);
        let c = node(&mut b, 30.0, 0.0);
        let bb = node(&mut b, 60.0, 0.0);
        b.add_edge(z, a, EdgeSpec::default());
        b.add_edge(a, bb, EdgeSpec::default().handles(Vec2::new(0.0, 44.0), Vec2::new(0.0, 44.0)));
        b.add_edge(a, c, EdgeSpec::default());
        b.add_edge(c, bb, EdgeSpec::default());
        (b.build().unwrap(), [z, a, bb, c])
    }

    /// Two parallel 300 m lanes 3.5 m apart, no jitter.
    ///
    ///   edge 0: n0(0,0)   → n1(300,0)
    ///   edge 1: n2(0,3.5) → n3(300,3.5)
    pub fn two_lanes() -> (RoadNetwork, [NodeId; 4]) {
        let mut b = RoadNetworkBuilder::new().kernel(exact_kernel());
        let n0 = node(&mut b, 0.0, 0.0);
        let n1 = node(&mut b, 300.0, 0.0);
        let n2 = node(&mut b, 0.0, 3.5);
        let n3 = node(&mut b, 300.0, 3.5);
        b.add_edge(n0, n1, EdgeSpec::default());
        b.add_edge(n2, n3, EdgeSpec::default());
        (b.build().unwrap(), [n0, n1, n2, n3])
    }

    /// Perpendicular crossing at the origin, equal priority, no jitter.
    ///
    ///   edge 0: W(-50,0) → E(50,0)
    ///   edge 1: S(0,-50) → N(0,50)
    pub fn crossing() -> (RoadNetwork, [NodeId; 4]) {
        let mut b = RoadNetworkBuilder::new().kernel(exact_kernel());
        let w = node(&mut b, -50.0, 0.0);
        let e = node(&mut b, 50.0, 0.0);
        let s = node(&mut b, 0.0, -50.0);
        let n = node(&mut b, 0.0, 50.0);
        b.add_edge(w, e, EdgeSpec::default());
        b.add_edge(s, n, EdgeSpec::default());
        (b.build().unwrap(), [w, e, s, n])
    }
}

// ── SimBuilder validation ─────────────────────────────────────────────────────

#[cfg(test)]
mod builder_tests {
    use ts_behavior::TrafficDriver;
    use ts_core::{KernelConfig, SimConfig, VehicleClass, VehicleRng};
    use ts_spatial::AStarRouter;
    use ts_vehicle::{ClassProfile, VehicleRngs, VehicleStore};

    use super::helpers::*;
    use crate::{SimBuilder, SimError};

    #[test]
    fn builds_with_defaults() {
        let (net, _) = two_segments(false);
        let sim = sim_on(net, 10);
        assert!(sim.vehicles.is_empty());
        assert_eq!(sim.rngs.seed(), 42);
        assert_eq!(sim.now().0, 0);
    }

    #[test]
    fn kernel_mismatch_errors() {
        let (net, _) = two_segments(false);
        let kernel = KernelConfig { lookahead: 50.0, ..KernelConfig::default() };
        let driver = TrafficDriver::new(&kernel).unwrap();
        let result = SimBuilder::new(test_config(kernel, 10), net, driver, AStarRouter).build();
        assert!(matches!(result, Err(SimError::Config(_))));
    }

    #[test]
    fn zero_threads_errors() {
        let (net, _) = two_segments(false);
        let kernel = net.kernel().clone();
        let config = SimConfig { num_threads: Some(0), ..test_config(kernel.clone(), 10) };
        let driver = TrafficDriver::new(&kernel).unwrap();
        let result = SimBuilder::new(config, net, driver, AStarRouter).build();
        assert!(matches!(result, Err(SimError::Config(_))));
    }

    #[test]
    fn zero_tick_length_errors() {
        let (net, _) = two_segments(false);
        let kernel = net.kernel().clone();
        let config = SimConfig { tick_secs: 0.0, ..test_config(kernel.clone(), 10) };
        let driver = TrafficDriver::new(&kernel).unwrap();
        let result = SimBuilder::new(config, net, driver, AStarRouter).build();
        assert!(matches!(result, Err(SimError::Config(_))));
    }

    #[test]
    fn short_rng_table_errors() {
        let (net, _) = two_segments(false);
        let kernel = net.kernel().clone();
        let mut store = VehicleStore::new();
        store.insert_with(|id| {
            ClassProfile::for_class(VehicleClass::Car).instantiate(id, &mut VehicleRng::new(1, id), 0.0)
        });
        let driver = TrafficDriver::new(&kernel).unwrap();
        let result = SimBuilder::new(test_config(kernel, 10), net, driver, AStarRouter)
            .vehicles(store, VehicleRngs::new(42))
            .build();
        assert!(matches!(
            result,
            Err(SimError::VehicleCountMismatch { expected: 1, got: 0, .. })
        ));
    }
}

// ── Spawn entry point ─────────────────────────────────────────────────────────

#[cfg(test)]
mod spawn_tests {
    use ts_core::{ClassMask, EdgeId, VehicleClass};
    use ts_mobility::{MobilityError, SpawnOptions, VehicleEvent};
    use ts_spatial::{EdgeSpec, RoadNetworkBuilder};

    use super::helpers::*;
    use crate::SimError;

    #[test]
    fn insert_logs_spawn_event() {
        let (net, [_, _, c]) = two_segments(false);
        let mut sim = sim_on(net, 10);
        let id = sim.insert_vehicle(VehicleClass::Car, EdgeId(0), [c]).unwrap();

        let events = sim.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, VehicleEvent::Spawned { vehicle: id, edge: EdgeId(0) });
        assert_eq!(events[0].tick.0, 0);
        assert!(sim.events().is_empty(), "drain empties the log");
    }

    #[test]
    fn crowded_entry_is_rejected() {
        let (net, [_, _, c]) = two_segments(false);
        let mut sim = sim_on(net, 10);
        sim.insert_vehicle(VehicleClass::Car, EdgeId(0), [c]).unwrap();
        let err = sim.insert_vehicle(VehicleClass::Car, EdgeId(0), [c]).unwrap_err();
        assert!(matches!(err, SimError::Rejected(MobilityError::EntryBlocked { .. })));
        assert_eq!(sim.vehicles.len(), 1);
    }

    #[test]
    fn class_not_allowed_is_rejected() {
        let mut b = RoadNetworkBuilder::new();
        let x = node(&mut b, 0.0, 0.0);
        let y = node(&mut b, 100.0, 0.0);
        b.add_edge(x, y, EdgeSpec::default().classes(ClassMask::TRAM_ONLY));
        let mut sim = sim_on(b.build().unwrap(), 10);

        let err = sim.insert_vehicle(VehicleClass::Car, EdgeId(0), [y]).unwrap_err();
        assert!(matches!(err, SimError::Rejected(MobilityError::ClassNotAllowed { .. })));
        assert!(sim.events().is_empty());
    }

    #[test]
    fn spawn_with_velocity() {
        let (net, [_, _, c]) = two_segments(false);
        let mut sim = sim_on(net, 10);
        let id = sim
            .insert_vehicle_with(&SpawnOptions::new(VehicleClass::Car, EdgeId(0), [c]).at_arc(30.0).velocity(8.0))
            .unwrap();
        let t = sim.vehicle_telemetry(id).unwrap();
        assert_eq!(t.arc, 30.0);
        assert_eq!(t.velocity, 8.0);
        assert!((t.position.x - 30.0).abs() < 1e-6);
    }
}

// ── End-to-end scenarios ──────────────────────────────────────────────────────

#[cfg(test)]
mod scenario_tests {
    use ts_behavior::Fate;
    use ts_core::{EdgeId, VehicleClass};
    use ts_mobility::{SpawnOptions, VehicleEvent};
    use ts_vehicle::DriveState;

    use super::helpers::*;
    use crate::NoopObserver;

    #[test]
    fn unreachable_destination_dies_on_first_tick() {
        let (net, [a, _, _]) = two_segments(false);
        let mut sim = sim_on(net, 10);
        // `a` is behind the vehicle and nothing leads back to it.
        let id = sim.insert_vehicle(VehicleClass::Car, EdgeId(0), [a]).unwrap();

        let report = sim.advance(0.1).unwrap();
        assert_eq!(report.died, 1);
        assert_eq!(report.live, 0);
        assert!(sim.vehicles.get(id).is_none());

        let events = sim.drain_events();
        assert_eq!(events.last().unwrap().event, VehicleEvent::Died { vehicle: id, reason: Fate::NoRoute });

        sim.run_ticks(5, &mut NoopObserver).unwrap();
        assert!(sim.drain_events().is_empty());
    }

    #[test]
    fn vehicle_takes_shorter_detour_and_arrives() {
        let (net, [_, _, b, _]) = detour();
        let mut sim = sim_on(net, 10);
        let id = sim.insert_vehicle(VehicleClass::Car, EdgeId(0), [b]).unwrap();

        let mut visited = Vec::new();
        for _ in 0..600 {
            sim.advance(0.1).unwrap();
            match sim.vehicle_telemetry(id) {
                Some(t) => {
                    if visited.last() != Some(&t.edge) {
                        visited.push(t.edge);
                    }
                }
                None => break,
            }
        }
        assert_eq!(visited, vec![EdgeId(0), EdgeId(2), EdgeId(3)]);
        assert!(
            sim.drain_events()
                .iter()
                .any(|e| e.event == VehicleEvent::Arrived { vehicle: id, node: b })
        );
    }

    #[test]
    fn red_signal_holds_until_green() {
        let (net, [_, b, c]) = two_segments(true);
        let mut sim = sim_on(net, 10);
        sim.signals.set_red(b, true);
        let id = sim.insert_vehicle(VehicleClass::Car, EdgeId(0), [c]).unwrap();

        sim.run_ticks(400, &mut NoopObserver).unwrap();
        let held = sim.vehicle_telemetry(id).unwrap();
        assert_eq!(held.edge, EdgeId(0));
        assert!(held.arc < 100.0);
        assert!(held.velocity < 0.5, "velocity {}", held.velocity);
        assert_eq!(held.state, DriveState::AtStop);

        sim.signals.set_red(b, false);
        sim.run_ticks(600, &mut NoopObserver).unwrap();
        assert!(sim.vehicles.get(id).is_none());
        assert!(sim.drain_events().iter().any(|e| matches!(e.event, VehicleEvent::Arrived { .. })));
    }

    #[test]
    fn equal_priority_crossing_is_taken_in_turn() {
        let (net, [_, e, _, n]) = crossing();
        let mut sim = sim_on(net, 10);
        let x = sim
            .insert_vehicle_with(&SpawnOptions::new(VehicleClass::Car, EdgeId(0), [e]).at_arc(20.0).velocity(10.0))
            .unwrap();
        let y = sim
            .insert_vehicle_with(&SpawnOptions::new(VehicleClass::Car, EdgeId(1), [n]).at_arc(20.0).velocity(10.0))
            .unwrap();

        let in_crossing = |arc: f64, length: f64| arc >= 49.0 && arc - length <= 51.0;
        let (mut x_waited, mut y_waited) = (false, false);
        for _ in 0..600 {
            sim.advance(0.1).unwrap();
            let tx = sim.vehicle_telemetry(x);
            let ty = sim.vehicle_telemetry(y);
            if let Some(t) = tx {
                x_waited |= t.state == DriveState::ApproachingConflict;
            }
            if let Some(t) = ty {
                y_waited |= t.state == DriveState::ApproachingConflict;
            }
            if let (Some(tx), Some(ty)) = (tx, ty) {
                let (lx, ly) = (sim.vehicles.get(x).unwrap().length, sim.vehicles.get(y).unwrap().length);
                assert!(
                    !(in_crossing(tx.arc, lx) && in_crossing(ty.arc, ly)),
                    "both inside the crossing: {} / {}",
                    tx.arc,
                    ty.arc
                );
            }
            if tx.is_none() && ty.is_none() {
                break;
            }
        }
        // Identical arrival estimates: the lower id goes first.
        assert!(!x_waited);
        assert!(y_waited);
        assert!(sim.vehicles.is_empty(), "both vehicles arrive");
    }

    #[test]
    fn slow_leader_does_not_cause_lane_flapping() {
        let (net, [_, n1, _, _]) = two_lanes();
        let mut sim = sim_on(net, 10);
        // Only lane 0 reaches n1, so passing on lane 1 means changing back.
        let me = sim
            .insert_vehicle_with(&SpawnOptions::new(VehicleClass::Car, EdgeId(0), [n1]).at_arc(10.0).velocity(12.0))
            .unwrap();
        sim.insert_vehicle_with(&SpawnOptions::new(VehicleClass::Car, EdgeId(0), [n1]).at_arc(45.0))
            .unwrap();

        let mut changes = 0;
        for _ in 0..900 {
            sim.advance(0.1).unwrap();
            changes += sim
                .drain_events()
                .iter()
                .filter(|e| matches!(e.event, VehicleEvent::LaneChangeStarted { vehicle, .. } if vehicle == me))
                .count();
            if sim.vehicles.is_empty() {
                break;
            }
        }
        assert!(changes <= 2, "{changes} lane changes");
        assert!(sim.vehicles.is_empty(), "both vehicles arrive");
    }
}

// ── Invariants ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod invariant_tests {
    use ts_core::{EdgeId, VehicleClass};
    use ts_spatial::RoadNetwork;
    use ts_vehicle::VehicleStore;

    use super::helpers::*;

    fn assert_occupancy_ordered(net: &RoadNetwork, vehicles: &VehicleStore) {
        for edge in &net.edges {
            for pair in edge.occupancy.windows(2) {
                let (behind, ahead) = (vehicles.get(pair[0]).unwrap(), vehicles.get(pair[1]).unwrap());
                assert!(behind.arc < ahead.arc, "{} not ordered", edge.id);
                assert!(
                    behind.arc <= ahead.rear_arc() + 1e-6,
                    "{} and {} overlap on {}",
                    behind.id,
                    ahead.id,
                    edge.id
                );
            }
            for id in &edge.occupancy {
                assert_eq!(vehicles.get(*id).unwrap().edge, edge.id);
            }
        }
    }

    #[test]
    fn occupancy_stays_ordered_and_disjoint() {
        let (net, [_, _, c]) = two_segments(false);
        let mut sim = sim_on(net, 10);
        let mut spawned = 0;
        for tick in 0..600 {
            if tick % 25 == 0 && sim.insert_vehicle(VehicleClass::Car, EdgeId(0), [c]).is_ok() {
                spawned += 1;
            }
            sim.advance(0.1).unwrap();
            assert_occupancy_ordered(&sim.network, &sim.vehicles);
        }
        assert!(spawned > 5);
    }

    #[test]
    fn same_seed_replays_identically() {
        let run = || {
            let (net, [_, _, c]) = two_segments(false);
            let mut sim = sim_on(net, 10);
            let mut trace = Vec::new();
            for tick in 0..300 {
                if tick % 30 == 0 {
                    let _ = sim.insert_vehicle(VehicleClass::Car, EdgeId(0), [c]);
                }
                sim.advance(0.1).unwrap();
                trace.extend(sim.telemetry());
            }
            trace
        };
        let (first, second) = (run(), run());
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_think_matches_single_thread() {
        use ts_behavior::TrafficDriver;
        use ts_core::SimConfig;
        use ts_spatial::AStarRouter;

        use crate::SimBuilder;

        let run = |threads: usize| {
            let (net, [_, _, c]) = two_segments(false);
            let kernel = net.kernel().clone();
            let config = SimConfig { num_threads: Some(threads), ..test_config(kernel.clone(), 10) };
            let driver = TrafficDriver::new(&kernel).unwrap();
            let mut sim = SimBuilder::new(config, net, driver, AStarRouter).build().unwrap();
            let mut trace = Vec::new();
            for tick in 0..300 {
                if tick % 20 == 0 {
                    let _ = sim.insert_vehicle(VehicleClass::Car, EdgeId(0), [c]);
                }
                sim.advance(0.1).unwrap();
                trace.extend(sim.telemetry());
            }
            trace
        };
        assert_eq!(run(1), run(4));
    }
}

// ── Tick driver, observer and telemetry ───────────────────────────────────────

#[cfg(test)]
mod run_tests {
    use ts_core::{EdgeId, Tick, VehicleClass};
    use ts_spatial::RoadNetwork;
    use ts_vehicle::VehicleStore;

    use super::helpers::*;
    use crate::{NoopObserver, SimError, SimObserver, TickReport};

    #[derive(Default)]
    struct Counter {
        starts:    usize,
        ends:      usize,
        snapshots: Vec<Tick>,
        finished:  Option<Tick>,
        live:      usize,
    }

    impl SimObserver for Counter {
        fn on_tick_start(&mut self, _t: Tick) { self.starts += 1; }
        fn on_tick_end(&mut self, _t: Tick, r: &TickReport) {
            self.ends += 1;
            self.live = r.live;
        }
        fn on_snapshot(&mut self, t: Tick, _v: &VehicleStore, _n: &RoadNetwork) {
            self.snapshots.push(t);
        }
        fn on_sim_end(&mut self, t: Tick) { self.finished = Some(t); }
    }

    #[test]
    fn advance_moves_the_clock() {
        let (net, _) = two_segments(false);
        let mut sim = sim_on(net, 10);
        let report = sim.advance(0.25).unwrap();
        assert_eq!(report.tick, Tick(0));
        assert_eq!(sim.now(), Tick(1));
        assert!((sim.clock.elapsed_secs - 0.25).abs() < 1e-12);
    }

    #[test]
    fn advance_rejects_bad_tick_length() {
        let (net, _) = two_segments(false);
        let mut sim = sim_on(net, 10);
        assert!(matches!(sim.advance(0.0), Err(SimError::Config(_))));
        assert!(matches!(sim.advance(f64::NAN), Err(SimError::Config(_))));
        assert_eq!(sim.now(), Tick(0));
    }

    #[test]
    fn run_stops_at_total_ticks() {
        let (net, _) = two_segments(false);
        let mut sim = sim_on(net, 25);
        let mut obs = Counter::default();
        sim.run(&mut obs).unwrap();
        assert_eq!(sim.now(), Tick(25));
        assert_eq!(obs.starts, 25);
        assert_eq!(obs.ends, 25);
        assert_eq!(obs.snapshots, vec![Tick(0), Tick(10), Tick(20)]);
        assert_eq!(obs.finished, Some(Tick(25)));
    }

    #[test]
    fn run_ticks_reports_live_vehicles() {
        let (net, [_, _, c]) = two_segments(false);
        let mut sim = sim_on(net, 100);
        sim.insert_vehicle(VehicleClass::Car, EdgeId(0), [c]).unwrap();
        let mut obs = Counter::default();
        sim.run_ticks(5, &mut obs).unwrap();
        assert_eq!(obs.ends, 5);
        assert_eq!(obs.live, 1);
        assert_eq!(obs.finished, None, "run_ticks does not end the run");
    }

    #[test]
    fn telemetry_tracks_motion_and_edge_speed() {
        let (net, [_, _, c]) = two_segments(false);
        let mut sim = sim_on(net, 100);
        let id = sim.insert_vehicle(VehicleClass::Car, EdgeId(0), [c]).unwrap();
        sim.run_ticks(20, &mut NoopObserver).unwrap();

        let t = sim.vehicle_telemetry(id).unwrap();
        assert!(t.velocity > 0.0);
        assert!(t.arc > 4.5);
        assert!(t.bounds.min.x <= t.position.x && t.position.x <= t.bounds.max.x);

        let e = sim.edge_telemetry(EdgeId(0)).unwrap();
        assert_eq!(e.occupancy, 1);
        assert_eq!(e.samples, 20);
        assert!(e.mean_speed > 0.0);

        sim.reset_edge_speeds();
        assert_eq!(sim.edge_telemetry(EdgeId(0)).unwrap().samples, 0);
        assert!(matches!(sim.edge_telemetry(EdgeId(9)), Err(SimError::Spatial(_))));
    }
}
