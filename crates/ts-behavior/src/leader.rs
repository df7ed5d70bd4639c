//! Leader search along the path ahead.
//!
//! Three kinds of vehicle can be the leader:
//!
//! | Kind                 | Found via                                          |
//! |----------------------|----------------------------------------------------|
//! | same lane            | occupancy of each stretch's edge                   |
//! | leaving a lane       | occupancy of lane-change targets, by source edge   |
//! | converging at a node | [`ApproachIndex`](crate::ApproachIndex)            |
//!
//! A converging vehicle leads only if it is closer to the shared node, with
//! ties broken by lower `VehicleId`, so two vehicles never both yield.

use std::cmp::Ordering;

use ts_core::{EdgeId, VehicleId};
use ts_vehicle::Vehicle;

use crate::context::ThinkContext;
use crate::model::Obstacle;
use crate::path::Stretch;

/// The binding vehicle ahead.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Leader {
    pub vehicle:  VehicleId,
    pub obstacle: Obstacle,
}

fn consider(best: &mut Option<Leader>, vehicle: VehicleId, gap: f64, velocity: f64) {
    if best.is_none_or(|b| gap < b.obstacle.gap) {
        *best = Some(Leader { vehicle, obstacle: Obstacle::vehicle(gap, velocity) });
    }
}

/// Distinct lane-change targets reachable from `edge`.
fn lane_change_targets(ctx: &ThinkContext<'_>, edge: EdgeId) -> Vec<EdgeId> {
    let mut targets: Vec<EdgeId> = ctx.network.edge(edge).lane_changes.iter().map(|p| p.target).collect();
    targets.sort_unstable();
    targets.dedup();
    targets
}

/// Nearest vehicle ahead of `vehicle` on `path`, within lookahead.
pub fn nearest_leader(vehicle: &Vehicle, path: &[Stretch], ctx: &ThinkContext<'_>) -> Option<Leader> {
    let mut best = None;
    let vehicles = ctx.vehicles;

    for (k, s) in path.iter().enumerate() {
        // Same lane: the first occupant whose front is past our entry arc.
        let edge = ctx.network.edge(s.edge);
        for &other in &edge.occupancy {
            if other == vehicle.id {
                continue;
            }
            let Some(o) = vehicles.get(other) else { continue };
            if o.arc <= s.start || o.rear_arc() >= s.end {
                continue;
            }
            // Beside the merge point: a gap question, not a leader.
            if k > 0 && s.start > 0.0 && o.rear_arc() <= s.start {
                continue;
            }
            consider(&mut best, other, s.distance_to(o.rear_arc()), o.velocity);
            break;
        }

        // Vehicles still partly in this lane while changing out of it.
        for target in lane_change_targets(ctx, s.edge) {
            for &other in &ctx.network.edge(target).occupancy {
                if other == vehicle.id {
                    continue;
                }
                let Some(o) = vehicles.get(other) else { continue };
                let Some(lc) = o.lane_change else { continue };
                if lc.source_edge != s.edge || lc.is_complete() {
                    continue;
                }
                let front = lc.source_equivalent_arc();
                if front <= s.start || front - o.length >= s.end {
                    continue;
                }
                consider(&mut best, other, s.distance_to(front - o.length), o.velocity);
            }
        }

        // Converging traffic at the node this stretch starts from.
        if k > 0 && s.start == 0.0 {
            let mine = s.offset;
            let came_from = path[k - 1].edge;
            for a in ctx.approaches.approaching(s.edge) {
                if a.vehicle == vehicle.id || a.from_edge == came_from {
                    continue;
                }
                let ahead = a.distance.total_cmp(&mine).then(a.vehicle.cmp(&vehicle.id)) == Ordering::Less;
                if ahead {
                    consider(&mut best, a.vehicle, mine - a.distance - a.length, a.velocity);
                }
            }
        }
    }

    best.filter(|l| l.obstacle.gap <= ctx.config.lookahead)
}
