//! Conflict registration and arbitration during think.
//!
//! Every intersection within lookahead gets a `RegisterConflict` or
//! `UpdateConflict` intent; intersections no longer ahead get an
//! `UnregisterConflict`.  Arbitration runs front to back and stops at the
//! first crossing the vehicle must wait for: everything behind that one is
//! marked as waiting too, so it never blocks cross traffic.
//!
//! The stop position is chosen so the stopped body does not sit inside an
//! earlier crossing's blocking zone, walking back zone by zone.  Crossings
//! between edges that share a node are exempt, since their zone overlaps the
//! merge or diverge itself.

use ts_core::{EdgeId, IntersectionId};
use ts_spatial::{Arbitration, Side};
use ts_vehicle::Vehicle;

use crate::context::ThinkContext;
use crate::estimator::VehicleEstimator;
use crate::intent::Intent;
use crate::model::CarFollowingModel;
use crate::path::Stretch;

/// One intersection ahead, in path order.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Upcoming {
    pub id:        IntersectionId,
    pub edge:      EdgeId,
    pub side:      Side,
    /// Distance from the vehicle's front to the crossing point.
    pub remaining: f64,
    /// Blocking zone as distances from the vehicle's front.
    pub zone:      (f64, f64),
    /// The two edges share a node.
    pub exempt:    bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConflictOutcome {
    pub intents: Vec<Intent>,
    /// Distance to the position where the vehicle has to wait, if any.
    pub wait_at: Option<f64>,
}

/// Intersections on `path` the vehicle has not yet cleared.
pub fn upcoming(vehicle: &Vehicle, path: &[Stretch], ctx: &ThinkContext<'_>) -> Vec<Upcoming> {
    let mut out: Vec<Upcoming> = Vec::new();
    let network = ctx.network;
    'path: for (k, s) in path.iter().enumerate() {
        let edge = network.edge(s.edge);
        for &id in &edge.intersections {
            let Some(x) = network.conflicts.get(id) else { continue };
            let Some(side) = x.side_of(s.edge) else { continue };
            let arc = x.arc(side);
            if arc > s.end {
                break;
            }
            if k > 0 && arc < s.start {
                continue;
            }
            let remaining = s.distance_to(arc);
            if remaining > ctx.config.lookahead {
                break 'path;
            }
            if remaining < -(x.rear[side.index()] + vehicle.length) {
                continue;
            }
            if out.iter().any(|u| u.id == id) {
                continue;
            }
            let (z0, z1) = x.blocking_zone(side);
            let other = network.edge(x.other_edge(side));
            let exempt = edge.from == other.from || edge.to == other.to;
            out.push(Upcoming {
                id,
                edge: s.edge,
                side,
                remaining,
                zone: (s.distance_to(z0), s.distance_to(z1)),
                exempt,
            });
        }
    }
    out
}

/// Where to stop for `upcoming[k]` without blocking an earlier crossing.
pub fn deadlock_safe_stop(vehicle: &Vehicle, upcoming: &[Upcoming], k: usize, margin: f64) -> f64 {
    let mut stop = upcoming[k].zone.0 - margin;
    for u in upcoming[..k].iter().rev() {
        if u.exempt {
            continue;
        }
        let body_overlaps = stop - vehicle.length < u.zone.1 && stop > u.zone.0;
        if body_overlaps {
            let earlier = u.zone.0 - margin;
            if earlier < 0.0 {
                break;
            }
            stop = earlier;
        }
    }
    stop
}

/// Project, arbitrate and emit registration intents for every upcoming
/// intersection.
pub fn resolve(
    vehicle:  &Vehicle,
    upcoming: &[Upcoming],
    ctx:      &ThinkContext<'_>,
    model:    &dyn CarFollowingModel,
    desired:  f64,
) -> ConflictOutcome {
    let config = ctx.config;
    let estimator = VehicleEstimator::new(model, vehicle, desired);
    let mut outcome = ConflictOutcome::default();

    for (k, u) in upcoming.iter().enumerate() {
        let Some(x) = ctx.network.conflicts.get(u.id) else { continue };
        let existing = x.registration(u.side, vehicle.id);
        if existing.is_none() && x.registered_side(vehicle.id).is_some() {
            // Registered from the other edge before a reroute or lane change.
            outcome.intents.push(Intent::UnregisterConflict(u.id));
        }

        let mine = x.project(
            u.side,
            u.remaining,
            ctx.now,
            &estimator,
            config.blocking_pad_fraction,
            existing,
            false,
        );
        let verdict = if outcome.wait_at.is_some() {
            Arbitration::Wait
        } else {
            x.arbitrate(vehicle.id, u.side, &mine)
        };
        let waiting = verdict == Arbitration::Wait;

        outcome.intents.push(match existing {
            Some(_) => Intent::UpdateConflict {
                intersection: u.id,
                remaining:    u.remaining,
                will_wait:    waiting,
            },
            None => Intent::RegisterConflict {
                intersection: u.id,
                edge:         u.edge,
                remaining:    u.remaining,
                will_wait:    waiting,
            },
        });

        if waiting && outcome.wait_at.is_none() {
            outcome.wait_at = Some(deadlock_safe_stop(vehicle, upcoming, k, config.conflict_stop_margin));
        }
    }

    for &id in &vehicle.registered {
        if !upcoming.iter().any(|u| u.id == id) {
            outcome.intents.push(Intent::UnregisterConflict(id));
        }
    }
    outcome
}
