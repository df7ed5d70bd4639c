//! Unit tests for ts-mobility.

#[cfg(test)]
mod helpers {
    use ts_behavior::{Decision, Idm, Intent};
    use ts_core::{EdgeId, NodeId, Vec2, VehicleClass, VehicleId};
    use ts_spatial::{AStarRouter, NodeSpec, RoadNetwork, RoadNetworkBuilder};
    use ts_vehicle::{DriveState, VehicleRngs, VehicleStore};

    use crate::{MobilityEngine, SpawnOptions, VehicleEvent};

    pub fn node(b: &mut RoadNetworkBuilder, x: f64, y: f64) -> NodeId {
        b.add_node(NodeSpec::at(Vec2::new(x, y)))
    }

    pub struct World {
        pub net:      RoadNetwork,
        pub vehicles: VehicleStore,
        pub rngs:     VehicleRngs,
        pub engine:   MobilityEngine<AStarRouter>,
    }

    impl World {
        pub fn new(net: RoadNetwork) -> Self {
            Self {
                net,
                vehicles: VehicleStore::new(),
                rngs:     VehicleRngs::new(11),
                engine:   MobilityEngine::new(AStarRouter),
            }
        }

        pub fn spawn(&mut self, edge: EdgeId, arc: f64, velocity: f64, dest: NodeId) -> VehicleId {
            let options = SpawnOptions::new(VehicleClass::Car, edge, [dest]).at_arc(arc).velocity(velocity);
            self.engine
                .insert(&mut self.net, &mut self.vehicles, &mut self.rngs, &options)
                .unwrap()
        }

        pub fn apply(&mut self, decisions: Vec<(VehicleId, Decision)>, dt: f64) -> Vec<VehicleEvent> {
            self.engine
                .apply(&mut self.net, &mut self.vehicles, &Idm::default(), decisions, 0.0, dt)
        }
    }

    pub fn cruise(acceleration: f64) -> Decision {
        Decision::drive(acceleration, DriveState::FreeDrive)
    }

    pub fn with_intents(intents: Vec<Intent>) -> Decision {
        Decision { intents, ..cruise(0.0) }
    }

    /// Straight road split in two at x = 100:  a → b → c.
    pub fn two_segments(stop_at_b: bool) -> (RoadNetwork, [NodeId; 3]) {
        let mut bld = RoadNetworkBuilder::new();
        let a = node(&mut bld, 0.0, 0.0);
        let mut mid = NodeSpec::at(Vec2::new(100.0, 0.0));
        if stop_at_b {
            mid = mid.with_stop_sign();
        }
        let b = bld.add_node(mid);
        let c = node(&mut bld, 200.0, 0.0);
        bld.add_edge(a, b, Default::default());
        bld.add_edge(b, c, Default::default());
        (bld.build().unwrap(), [a, b, c])
    }

    /// Two parallel 200 m lanes 3.5 m apart.
    pub fn parallel() -> (RoadNetwork, [NodeId; 4]) {
        let mut b = RoadNetworkBuilder::new();
        let n0 = node(&mut b, 0.0, 0.0);
        let n1 = node(&mut b, 200.0, 0.0);
        let n2 = node(&mut b, 0.0, 3.5);
        let n3 = node(&mut b, 200.0, 3.5);
        b.add_edge(n0, n1, Default::default());
        b.add_edge(n2, n3, Default::default());
        (b.build().unwrap(), [n0, n1, n2, n3])
    }

    /// Three parallel 200 m lanes 3.5 m apart; lane `i` is `EdgeId(i)`.
    pub fn three_lanes() -> (RoadNetwork, [NodeId; 3]) {
        let mut b = RoadNetworkBuilder::new();
        let mut ends = [NodeId::INVALID; 3];
        for (i, end) in ends.iter_mut().enumerate() {
            let y = 3.5 * i as f64;
            let start = node(&mut b, 0.0, y);
            *end = node(&mut b, 200.0, y);
            b.add_edge(start, *end, Default::default());
        }
        (b.build().unwrap(), ends)
    }

    /// Perpendicular crossing at the origin.
    pub fn crossing() -> (RoadNetwork, [NodeId; 4]) {
        let mut b = RoadNetworkBuilder::new();
        let w = node(&mut b, -50.0, 0.0);
        let e = node(&mut b, 50.0, 0.0);
        let s = node(&mut b, 0.0, -50.0);
        let n = node(&mut b, 0.0, 50.0);
        b.add_edge(w, e, Default::default());
        b.add_edge(s, n, Default::default());
        (b.build().unwrap(), [w, e, s, n])
    }
}

// ── Insertion ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod insert {
    use ts_core::{EdgeId, NodeId, VehicleClass};
    use ts_spatial::SpatialError;

    use super::helpers::{two_segments, World};
    use crate::{MobilityError, SpawnOptions};

    #[test]
    fn default_arc_puts_the_whole_body_on_the_edge() {
        let (net, [_, _, c]) = two_segments(false);
        let mut w = World::new(net);
        let options = SpawnOptions::new(VehicleClass::Car, EdgeId(0), [c]);
        let id = w.engine.insert(&mut w.net, &mut w.vehicles, &mut w.rngs, &options).unwrap();
        let v = w.vehicles.get(id).unwrap();
        assert_eq!(v.arc, 4.5);
        assert_eq!(v.rear_arc(), 0.0);
        assert!(v.needs_route);
        assert_eq!(w.net.edge(EdgeId(0)).occupancy, vec![id]);
    }

    #[test]
    fn arc_is_capped_to_edge_length() {
        let (net, [_, _, c]) = two_segments(false);
        let mut w = World::new(net);
        let id = w.spawn(EdgeId(0), 500.0, 0.0, c);
        let len = w.net.edge(EdgeId(0)).length();
        assert_eq!(w.vehicles.get(id).unwrap().arc, len);
    }

    #[test]
    fn crowded_entry_is_rejected() {
        let (net, [_, _, c]) = two_segments(false);
        let mut w = World::new(net);
        w.spawn(EdgeId(0), 10.0, 0.0, c);
        let options = SpawnOptions::new(VehicleClass::Car, EdgeId(0), [c]).at_arc(12.0);
        let err = w.engine.insert(&mut w.net, &mut w.vehicles, &mut w.rngs, &options);
        assert!(matches!(err, Err(MobilityError::EntryBlocked { .. })));
        assert_eq!(w.vehicles.len(), 1);
        assert_eq!(w.net.edge(EdgeId(0)).occupancy.len(), 1);
    }

    #[test]
    fn fast_entry_needs_braking_room() {
        let (net, [_, _, c]) = two_segments(false);
        let mut w = World::new(net);
        w.spawn(EdgeId(0), 30.0, 0.0, c);
        // 15 m to the leader's rear is plenty at rest, not at 15 m/s.
        let slow = SpawnOptions::new(VehicleClass::Car, EdgeId(0), [c]).at_arc(10.5);
        let fast = slow.clone().velocity(15.0);
        assert!(w.engine.insert(&mut w.net, &mut w.vehicles, &mut w.rngs, &fast).is_err());
        assert!(w.engine.insert(&mut w.net, &mut w.vehicles, &mut w.rngs, &slow).is_ok());
    }

    #[test]
    fn class_and_destination_are_validated() {
        let (net, [_, _, c]) = two_segments(false);
        let mut w = World::new(net);
        let tram = SpawnOptions::new(VehicleClass::Tram, EdgeId(0), [c]);
        assert!(matches!(
            w.engine.insert(&mut w.net, &mut w.vehicles, &mut w.rngs, &tram),
            Err(MobilityError::ClassNotAllowed { .. })
        ));
        let nowhere = SpawnOptions::new(VehicleClass::Car, EdgeId(0), []);
        assert!(matches!(
            w.engine.insert(&mut w.net, &mut w.vehicles, &mut w.rngs, &nowhere),
            Err(MobilityError::NoDestination)
        ));
        let missing = SpawnOptions::new(VehicleClass::Car, EdgeId(9), [c]);
        assert!(matches!(
            w.engine.insert(&mut w.net, &mut w.vehicles, &mut w.rngs, &missing),
            Err(MobilityError::Spatial(_))
        ));
        assert!(w.vehicles.is_empty());
    }

    #[test]
    fn unknown_destination_is_rejected() {
        let (net, [_, _, c]) = two_segments(false);
        let mut w = World::new(net);
        let options = SpawnOptions::new(VehicleClass::Car, EdgeId(0), [c, NodeId(99)]);
        assert!(matches!(
            w.engine.insert(&mut w.net, &mut w.vehicles, &mut w.rngs, &options),
            Err(MobilityError::Spatial(SpatialError::UnknownNode(_)))
        ));
        assert!(w.vehicles.is_empty());
        assert!(w.net.edge(EdgeId(0)).occupancy.is_empty());
    }

    #[test]
    fn parameters_follow_the_vehicle_stream() {
        let (net, [_, _, c]) = two_segments(false);
        let mut a = World::new(net.clone());
        let mut b = World::new(net);
        let ia = a.spawn(EdgeId(0), 10.0, 0.0, c);
        let ib = b.spawn(EdgeId(0), 10.0, 0.0, c);
        assert_eq!(a.vehicles.get(ia).unwrap().params, b.vehicles.get(ib).unwrap().params);
    }
}

// ── Integration ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod integrate {
    use ts_behavior::{Decision, Fate};
    use ts_core::EdgeId;

    use super::helpers::{cruise, two_segments, World};
    use crate::VehicleEvent;

    #[test]
    fn constant_acceleration_step() {
        let (net, [_, _, c]) = two_segments(false);
        let mut w = World::new(net);
        let id = w.spawn(EdgeId(0), 10.0, 0.0, c);
        w.apply(vec![(id, cruise(1.0))], 0.1);
        let v = w.vehicles.get(id).unwrap();
        assert!((v.velocity - 0.1).abs() < 1e-12);
        assert!((v.arc - 10.005).abs() < 1e-12);
        assert!((v.stats.mileage - 0.005).abs() < 1e-12);
        assert_eq!(v.stats.ticks_alive, 1);
    }

    #[test]
    fn braking_stops_instead_of_reversing() {
        let (net, [_, _, c]) = two_segments(false);
        let mut w = World::new(net);
        let id = w.spawn(EdgeId(0), 10.0, 1.0, c);
        w.apply(vec![(id, cruise(-9.0))], 1.0);
        let v = w.vehicles.get(id).unwrap();
        assert_eq!(v.velocity, 0.0);
        assert!((v.arc - (10.0 + 1.0 / 18.0)).abs() < 1e-12);
        assert_eq!(v.stats.stops, 1);
    }

    #[test]
    fn fate_removes_the_vehicle() {
        let (net, [_, _, c]) = two_segments(false);
        let mut w = World::new(net);
        let id = w.spawn(EdgeId(0), 10.0, 0.0, c);
        let events = w.apply(vec![(id, Decision::die(Fate::NoRoute))], 0.1);
        assert_eq!(events, vec![VehicleEvent::Died { vehicle: id, reason: Fate::NoRoute }]);
        assert!(w.vehicles.get(id).is_none());
        assert!(w.net.edge(EdgeId(0)).occupancy.is_empty());
    }

    #[test]
    fn non_finite_acceleration_is_degenerate() {
        let (net, [_, _, c]) = two_segments(false);
        let mut w = World::new(net);
        let id = w.spawn(EdgeId(0), 10.0, 0.0, c);
        let events = w.apply(vec![(id, cruise(f64::INFINITY))], 0.1);
        assert_eq!(events, vec![VehicleEvent::Died { vehicle: id, reason: Fate::Degenerate }]);
        assert!(w.vehicles.is_empty());
    }
}

// ── Edge transitions ──────────────────────────────────────────────────────────

#[cfg(test)]
mod transitions {
    use ts_core::EdgeId;

    use super::helpers::{cruise, two_segments, World};
    use crate::VehicleEvent;

    #[test]
    fn overflow_carries_onto_next_edge() {
        let (net, [_, _, c]) = two_segments(false);
        let mut w = World::new(net);
        let id = w.spawn(EdgeId(0), 99.0, 10.0, c);
        w.apply(vec![(id, cruise(0.0))], 0.2);
        let v = w.vehicles.get(id).unwrap();
        assert_eq!(v.edge, EdgeId(1));
        assert!((v.arc - 1.0).abs() < 1e-6);
        assert_eq!(v.route.front().map(|s| s.edge), Some(EdgeId(1)));
        assert!(w.net.edge(EdgeId(0)).occupancy.is_empty());
        assert_eq!(w.net.edge(EdgeId(1)).occupancy, vec![id]);
    }

    #[test]
    fn destination_removes_the_vehicle() {
        let (net, [_, _, c]) = two_segments(false);
        let mut w = World::new(net);
        let id = w.spawn(EdgeId(1), 99.0, 10.0, c);
        let events = w.apply(vec![(id, cruise(0.0))], 0.2);
        assert_eq!(events, vec![VehicleEvent::Arrived { vehicle: id, node: c }]);
        assert!(w.vehicles.is_empty());
    }

    #[test]
    fn occupied_entry_holds_at_edge_end() {
        let (net, [_, _, c]) = two_segments(false);
        let mut w = World::new(net);
        let tail = w.spawn(EdgeId(1), 4.5, 0.0, c);
        let id = w.spawn(EdgeId(0), 99.5, 10.0, c);
        w.apply(vec![(id, cruise(0.0))], 0.1);
        let v = w.vehicles.get(id).unwrap();
        assert_eq!(v.edge, EdgeId(0));
        assert_eq!(v.arc, w.net.edge(EdgeId(0)).length());
        // Braked at the hard bound, not stopped dead.
        let expected = 10.0 - w.net.kernel().max_braking * 0.1;
        assert!((v.velocity - expected).abs() < 1e-9, "velocity {}", v.velocity);
        assert_eq!(w.net.edge(EdgeId(1)).occupancy, vec![tail]);
    }

    #[test]
    fn entry_does_not_depend_on_id_order() {
        let run = |leader_first: bool| {
            let (net, [_, _, c]) = two_segments(false);
            let mut w = World::new(net);
            let (leader, follower) = if leader_first {
                let l = w.spawn(EdgeId(1), 4.6, 10.0, c);
                (l, w.spawn(EdgeId(0), 99.5, 10.0, c))
            } else {
                let f = w.spawn(EdgeId(0), 99.5, 10.0, c);
                (w.spawn(EdgeId(1), 4.6, 10.0, c), f)
            };
            w.apply(vec![(leader, cruise(0.0)), (follower, cruise(0.0))], 0.1);
            let state = |id| {
                let v = w.vehicles.get(id).unwrap();
                (v.edge, v.arc, v.velocity)
            };
            (state(leader), state(follower))
        };
        let (first, second) = (run(true), run(false));
        assert_eq!(first, second);
        // The leader cleared the entry, so the follower crossed over.
        let (_, (edge, arc, velocity)) = first;
        assert_eq!(edge, EdgeId(1));
        assert!((arc - 0.5).abs() < 1e-6);
        assert_eq!(velocity, 10.0);
    }

    #[test]
    fn stop_sign_is_served_when_stopped_at_the_line() {
        let (net, [_, b, c]) = two_segments(true);
        let mut w = World::new(net);
        let id = w.spawn(EdgeId(0), 99.0, 0.05, c);
        w.apply(vec![(id, cruise(0.0))], 0.1);
        assert_eq!(w.vehicles.get(id).unwrap().stopped_at, Some(b));
    }

    #[test]
    fn occupancy_is_sorted_by_arc() {
        let (net, [_, _, c]) = two_segments(false);
        let mut w = World::new(net);
        let a = w.spawn(EdgeId(0), 50.0, 0.0, c);
        let b = w.spawn(EdgeId(0), 20.0, 0.0, c);
        w.apply(vec![(b, cruise(0.0)), (a, cruise(0.0))], 0.1);
        assert_eq!(w.net.edge(EdgeId(0)).occupancy, vec![b, a]);
    }
}

// ── Intents ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod intents {
    use ts_behavior::{Decision, Intent};
    use ts_core::EdgeId;
    use ts_spatial::{Route, RouteSegment, Side};

    use super::helpers::{crossing, parallel, three_lanes, with_intents, World};
    use crate::VehicleEvent;

    #[test]
    fn conflict_registration_round_trip() {
        let (net, [_, e, _, _]) = crossing();
        let mut w = World::new(net);
        let id = w.spawn(EdgeId(0), 30.0, 10.0, e);
        let x = w.net.edge(EdgeId(0)).intersections[0];

        let register = Intent::RegisterConflict { intersection: x, edge: EdgeId(0), remaining: 20.0, will_wait: true };
        w.apply(vec![(id, with_intents(vec![register]))], 0.1);
        let reg = w.net.conflicts.get(x).unwrap().registration(Side::First, id).copied().unwrap();
        assert!(reg.will_wait);
        assert_eq!(w.vehicles.get(id).unwrap().registered, vec![x]);

        w.apply(vec![(id, with_intents(vec![Intent::UnregisterConflict(x)]))], 0.1);
        assert!(w.net.conflicts.get(x).unwrap().registered_side(id).is_none());
        assert!(w.vehicles.get(id).unwrap().registered.is_empty());
    }

    #[test]
    fn lane_change_moves_occupancy() {
        let (net, [_, _, _, n3]) = parallel();
        let mut w = World::new(net);
        let id = w.spawn(EdgeId(0), 20.0, 0.0, n3);
        let point = *w.net.edge(EdgeId(0)).lane_change_from(EdgeId(1), 20.0).unwrap();

        let begin = Intent::BeginLaneChange { target: EdgeId(1), point, forced: true };
        let events = w.apply(vec![(id, with_intents(vec![begin]))], 0.1);
        assert!(events.contains(&VehicleEvent::LaneChangeStarted {
            vehicle: id,
            from:    EdgeId(0),
            to:      EdgeId(1),
            forced:  true,
        }));
        let v = w.vehicles.get(id).unwrap();
        assert_eq!(v.edge, EdgeId(1));
        assert_eq!(v.lane_change.map(|lc| lc.source_edge), Some(EdgeId(0)));
        assert_eq!(v.stats.lane_changes, 1);
        assert!(w.net.edge(EdgeId(0)).occupancy.is_empty());
        assert_eq!(w.net.edge(EdgeId(1)).occupancy, vec![id]);
    }

    #[test]
    fn lane_change_into_occupied_gap_is_dropped() {
        let (net, [_, _, _, n3]) = parallel();
        let mut w = World::new(net);
        let _beside = w.spawn(EdgeId(1), 21.0, 0.0, n3);
        let id = w.spawn(EdgeId(0), 20.0, 0.0, n3);
        let point = *w.net.edge(EdgeId(0)).lane_change_from(EdgeId(1), 20.0).unwrap();

        let begin = Intent::BeginLaneChange { target: EdgeId(1), point, forced: true };
        let events = w.apply(vec![(id, with_intents(vec![begin]))], 0.1);
        assert!(events.is_empty());
        assert_eq!(w.vehicles.get(id).unwrap().edge, EdgeId(0));
    }

    #[test]
    fn refused_lane_change_keeps_the_old_route() {
        let (net, ends) = three_lanes();
        let mut w = World::new(net);
        let a = w.spawn(EdgeId(0), 20.0, 0.0, ends[1]);
        let b = w.spawn(EdgeId(2), 20.0, 0.0, ends[1]);

        let mut own = Route::new();
        own.push_back(RouteSegment::lane_change(EdgeId(2), EdgeId(1), ends[1], 220.0));
        {
            let v = w.vehicles.get_mut(b).unwrap();
            v.route = own.clone();
            v.needs_route = false;
        }

        // Both aim for the same gap in the middle lane.
        let merge = |w: &World, from: EdgeId| {
            let point = *w.net.edge(from).lane_change_from(EdgeId(1), 20.0).unwrap();
            let mut route = Route::new();
            route.push_back(RouteSegment::plain(EdgeId(1), ends[1], 180.0));
            Decision {
                new_route: Some(route),
                ..with_intents(vec![Intent::BeginLaneChange { target: EdgeId(1), point, forced: false }])
            }
        };
        let decisions = vec![(a, merge(&w, EdgeId(0))), (b, merge(&w, EdgeId(2)))];
        let events = w.apply(decisions, 0.1);

        assert_eq!(w.vehicles.get(a).unwrap().edge, EdgeId(1));
        assert_eq!(w.vehicles.get(a).unwrap().route.front().map(|s| s.edge), Some(EdgeId(1)));
        let v = w.vehicles.get(b).unwrap();
        assert_eq!(v.edge, EdgeId(2));
        assert_eq!(v.route, own);
        assert!(!events.contains(&VehicleEvent::Rerouted { vehicle: b }));
        assert!(!events.iter().any(|e| matches!(e, VehicleEvent::LaneChangeStarted { vehicle, .. } if *vehicle == b)));
    }

    #[test]
    fn yield_requests_apply_in_id_order() {
        let (net, [_, _, _, n3]) = parallel();
        let mut w = World::new(net);
        let a = w.spawn(EdgeId(0), 20.0, 0.0, n3);
        let b = w.spawn(EdgeId(0), 60.0, 0.0, n3);
        let target = w.spawn(EdgeId(1), 40.0, 0.0, n3);

        let from_a = Intent::RequestYield { to: target, arc: 25.0 };
        let from_b = Intent::RequestYield { to: target, arc: 65.0 };
        // Handed over out of order; the higher ID still applies last.
        w.apply(vec![(b, with_intents(vec![from_b])), (a, with_intents(vec![from_a]))], 0.1);
        let request = w.vehicles.get(target).unwrap().yield_request.unwrap();
        assert_eq!(request.from, b);
    }
}
