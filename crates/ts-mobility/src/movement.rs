//! Kinematic integration and edge transitions.

use ts_behavior::Fate;
use ts_core::{EdgeId, NodeId, VehicleId};
use ts_spatial::{RoadNetwork, Route, RouteRequest, RouteStart, Router};
use ts_vehicle::VehicleStore;

use crate::engine::remove_vehicle;
use crate::VehicleEvent;

/// Advance velocity and arc by one tick at the decided acceleration.
///
/// A vehicle that would reverse stops where its velocity reaches zero.
/// Returns `false` if the vehicle was removed for a non-finite result.
pub(crate) fn integrate(
    network:   &mut RoadNetwork,
    vehicles:  &mut VehicleStore,
    id:        VehicleId,
    dt:        f64,
    events:    &mut Vec<VehicleEvent>,
) -> bool {
    let stopped_velocity = network.kernel().stopped_velocity;
    let Some(v) = vehicles.get_mut(id) else { return false };

    let (a, v0) = (v.acceleration, v.velocity);
    let (ds, v1) = if v0 + a * dt < 0.0 {
        let ds = if a < 0.0 { v0 * v0 / (-2.0 * a) } else { 0.0 };
        (ds, 0.0)
    } else {
        (v0 * dt + 0.5 * a * dt * dt, v0 + a * dt)
    };
    if !(ds.is_finite() && v1.is_finite()) {
        remove_vehicle(network, vehicles, id);
        log::warn!("{id} integrated to a non-finite state; removed");
        events.push(VehicleEvent::Died { vehicle: id, reason: Fate::Degenerate });
        return false;
    }

    v.velocity = v1;
    v.arc += ds;
    v.stats.mileage += ds;
    v.stats.ticks_alive += 1;
    if v0 >= stopped_velocity && v1 < stopped_velocity {
        v.stats.stops += 1;
    }

    if let Some(lc) = v.lane_change.as_mut() {
        lc.progress += ds;
        if lc.is_complete() {
            v.lane_change = None;
            events.push(VehicleEvent::LaneChangeCompleted { vehicle: id, edge: v.edge });
        }
    }
    true
}

// ── Edge transitions ──────────────────────────────────────────────────────────

/// Edges a vehicle passes onto this tick, planned against the integrated
/// state of every vehicle.
pub(crate) struct Transit {
    vehicle: VehicleId,
    hops:    Vec<Hop>,
    end:     Option<TransitEnd>,
}

struct Hop {
    edge:  EdgeId,
    arc:   f64,
    route: Route,
}

enum TransitEnd {
    Arrived(NodeId),
    Stranded(NodeId),
}

/// Plan the transitions of a vehicle whose front passed the end of its
/// edge, possibly several for very short edges.
///
/// At a destination the trip ends.  At a branching node, or when the route
/// does not continue from the node, the vehicle is rerouted.  Nothing is
/// written, so every plan of a tick sees the same network.
pub(crate) fn plan_transit(
    network:  &RoadNetwork,
    vehicles: &VehicleStore,
    router:   &dyn Router,
    id:       VehicleId,
) -> Option<Transit> {
    let v = vehicles.get(id)?;
    let (mut edge, mut arc, mut route) = (v.edge, v.arc, v.route.clone());
    let mut transit = Transit { vehicle: id, hops: Vec::new(), end: None };

    loop {
        let e = network.edge(edge);
        let length = e.length();
        if arc < length {
            break;
        }
        let node = e.to;
        if v.is_destination(node) {
            transit.end = Some(TransitEnd::Arrived(node));
            break;
        }

        route.pop_front();
        let continues = route
            .front()
            .is_some_and(|s| network.edge(s.edge).from == node);
        if !continues || network.out_degree(node) > 1 {
            route = router.route(
                network,
                &RouteRequest {
                    start:        RouteStart::AtNode(node),
                    class:        v.class,
                    destinations: &v.destinations,
                },
            );
        }
        let Some(next) = route.front().map(|s| s.edge) else {
            transit.end = Some(TransitEnd::Stranded(node));
            break;
        };

        edge = next;
        arc -= length;
        transit.hops.push(Hop { edge, arc, route: route.clone() });
    }

    (!transit.hops.is_empty() || transit.end.is_some()).then_some(transit)
}

/// Carry out a planned transit, in ascending `VehicleId` order.
///
/// A vehicle whose overflow would overlap the last vehicle on the next edge
/// is held at the end of its edge instead, braking no harder than
/// `max_braking`.  Vehicles entering the same edge this tick queue in id
/// order.
pub(crate) fn commit_transit(
    network:  &mut RoadNetwork,
    vehicles: &mut VehicleStore,
    transit:  Transit,
    dt:       f64,
    events:   &mut Vec<VehicleEvent>,
) {
    let id = transit.vehicle;
    let max_braking = network.kernel().max_braking;

    for hop in transit.hops {
        let tail_rear = network
            .edge(hop.edge)
            .occupancy
            .first()
            .and_then(|o| vehicles.get(*o))
            .map(|o| o.rear_arc());
        let Some(v) = vehicles.get_mut(id) else { return };
        let from = v.edge;

        if tail_rear.is_some_and(|rear| rear < hop.arc) {
            v.arc = network.edge(from).length();
            v.velocity = (v.velocity - max_braking * dt).max(0.0);
            log::trace!("{id} held at the end of {from}");
            return;
        }

        v.edge = hop.edge;
        v.arc = hop.arc;
        v.route = hop.route;
        v.lane_change = None;
        v.stopped_at = None;
        network.edge_mut(from).remove_occupant(id);
        // The overflow is behind the tail, so the vehicle goes first.
        network.edge_mut(hop.edge).occupancy.insert(0, id);
    }

    match transit.end {
        Some(TransitEnd::Arrived(node)) => {
            remove_vehicle(network, vehicles, id);
            log::debug!("{id} arrived at {node}");
            events.push(VehicleEvent::Arrived { vehicle: id, node });
        }
        Some(TransitEnd::Stranded(node)) => {
            remove_vehicle(network, vehicles, id);
            log::warn!("{id} stranded at {node}: no route");
            events.push(VehicleEvent::Died { vehicle: id, reason: Fate::NoRoute });
        }
        None => {}
    }
}

/// Record stop-sign service, restore occupancy order, sample speeds and
/// refresh poses.
pub(crate) fn settle(network: &mut RoadNetwork, vehicles: &mut VehicleStore) {
    let config = network.kernel();
    let (stopped_velocity, stop_tolerance) = (config.stopped_velocity, config.stop_tolerance);

    for v in vehicles.iter_mut() {
        let edge = network.edge(v.edge);
        let at_line = edge.length() - v.arc <= stop_tolerance;
        if v.velocity < stopped_velocity && at_line && network.node(edge.to).stop_sign {
            v.stopped_at = Some(edge.to);
        }
    }

    for edge in network.edges.iter_mut() {
        edge.occupancy.sort_by(|a, b| {
            let arc = |id: &VehicleId| vehicles.get(*id).map_or(f64::NEG_INFINITY, |v| v.arc);
            arc(a).total_cmp(&arc(b)).then(a.cmp(b))
        });
    }

    for v in vehicles.iter_mut() {
        network.edge_mut(v.edge).speed.record(v.velocity);
        v.update_pose(network);
    }
}
