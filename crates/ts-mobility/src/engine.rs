//! The move phase: insert vehicles and apply decisions.

use ts_behavior::{CarFollowingModel, Decision, Intent, VehicleEstimator, merge_entry_arc};
use ts_core::{EdgeId, IntersectionId, VehicleId};
use ts_spatial::{ConflictIndex, LaneChangePoint, RoadNetwork, RouteSegment, Router};
use ts_vehicle::{ClassProfile, LaneChange, Vehicle, VehicleRngs, VehicleStore, YieldRequest};

use crate::movement;
use crate::{MobilityError, MobilityResult, SpawnOptions, VehicleEvent};

/// Applies think results to the network and vehicle store.
///
/// # Type parameter
///
/// `R` is the router used for reroutes at nodes; think uses the same one
/// through [`ThinkContext`][ts_behavior::ThinkContext].
pub struct MobilityEngine<R: Router> {
    /// The routing algorithm.
    pub router: R,
}

impl<R: Router> MobilityEngine<R> {
    pub fn new(router: R) -> Self {
        Self { router }
    }

    // ── Insertion ─────────────────────────────────────────────────────────

    /// Insert a vehicle described by `options`.
    ///
    /// Driver parameters are drawn from the vehicle's own RNG stream.  The
    /// leader must be at least `s0 + v²/(2b)` ahead and the follower at
    /// least its own `s0` behind, otherwise the insertion is rejected and
    /// nothing changes.
    pub fn insert(
        &self,
        network:  &mut RoadNetwork,
        vehicles: &mut VehicleStore,
        rngs:     &mut VehicleRngs,
        options:  &SpawnOptions,
    ) -> MobilityResult<VehicleId> {
        if options.destinations.is_empty() {
            return Err(MobilityError::NoDestination);
        }
        for &node in &options.destinations {
            network.try_node(node)?;
        }
        let edge = network.try_edge(options.edge)?;
        if !edge.allows(options.class) {
            return Err(MobilityError::ClassNotAllowed { class: options.class, edge: options.edge });
        }
        let profile = ClassProfile::for_class(options.class);
        let arc = options.arc.unwrap_or(profile.length).min(edge.length());
        let placeable = arc.is_finite() && arc >= 0.0 && options.velocity.is_finite() && options.velocity >= 0.0;
        if !placeable {
            return Err(MobilityError::InvalidPlacement { edge: options.edge, arc });
        }

        let id = vehicles.next_id();
        let spread = network.kernel().parameter_spread;
        let mut vehicle = profile
            .instantiate(id, rngs.reseed(id), spread)
            .heading_to(options.destinations.iter().copied());
        vehicle.place(network, options.edge, arc, options.velocity);
        check_entry_gap(network, vehicles, &vehicle)?;

        vehicles.insert_with(|_| vehicle);
        network
            .edge_mut(options.edge)
            .insert_occupant(id, arc, |o| vehicles.get(o).map_or(0.0, |v| v.arc));
        log::debug!("spawned {id} on {} at {arc:.1}", options.edge);
        Ok(id)
    }

    // ── Decision application ──────────────────────────────────────────────

    /// Apply one tick's decisions in ascending `VehicleId` order, then
    /// integrate every vehicle that received one and carry it across edge
    /// ends.
    ///
    /// `now` is the simulated time at the start of the tick.
    pub fn apply(
        &self,
        network:   &mut RoadNetwork,
        vehicles:  &mut VehicleStore,
        model:     &dyn CarFollowingModel,
        mut decisions: Vec<(VehicleId, Decision)>,
        now:       f64,
        tick_secs: f64,
    ) -> Vec<VehicleEvent> {
        decisions.sort_unstable_by_key(|(id, _)| *id);
        let mut events = Vec::new();

        // Requests were read during this tick's think; new ones follow.
        for v in vehicles.iter_mut() {
            v.yield_request = None;
        }

        let mut moving = Vec::with_capacity(decisions.len());
        for (id, decision) in decisions {
            if let Some(fate) = decision.fate {
                if remove_vehicle(network, vehicles, id).is_some() {
                    log::warn!("{id} removed: {fate}");
                    events.push(VehicleEvent::Died { vehicle: id, reason: fate });
                }
                continue;
            }
            // A route that came with a lane change only holds if the change
            // was committed.
            let mut route_holds = true;
            for intent in decision.intents {
                let changing = matches!(intent, Intent::BeginLaneChange { .. });
                let applied = self.apply_intent(network, vehicles, model, id, intent, now, &mut events);
                route_holds &= applied || !changing;
            }
            let Some(v) = vehicles.get_mut(id) else { continue };
            if let Some(route) = decision.new_route.filter(|_| route_holds) {
                if !v.needs_route {
                    events.push(VehicleEvent::Rerouted { vehicle: id });
                }
                v.route = route;
                v.needs_route = false;
            }
            v.acceleration = decision.acceleration;
            v.state = decision.state;
            moving.push(id);
        }

        let moved: Vec<VehicleId> = moving
            .into_iter()
            .filter(|&id| movement::integrate(network, vehicles, id, tick_secs, &mut events))
            .collect();
        // Every vehicle has moved before any edge transition is planned.
        let transits: Vec<_> = moved
            .into_iter()
            .filter_map(|id| movement::plan_transit(network, vehicles, &self.router, id))
            .collect();
        for transit in transits {
            movement::commit_transit(network, vehicles, transit, tick_secs, &mut events);
        }
        movement::settle(network, vehicles);
        events
    }

    /// Returns `false` if the intent no longer applies.
    #[allow(clippy::too_many_arguments)]
    fn apply_intent(
        &self,
        network:  &mut RoadNetwork,
        vehicles: &mut VehicleStore,
        model:    &dyn CarFollowingModel,
        id:       VehicleId,
        intent:   Intent,
        now:      f64,
        events:   &mut Vec<VehicleEvent>,
    ) -> bool {
        match intent {
            Intent::RegisterConflict { intersection, edge, remaining, will_wait } => {
                let registered = refresh_conflict(network, vehicles, model, id, intersection, |c, est, pad| {
                    c.register(intersection, id, edge, remaining, now, est, pad)?;
                    if will_wait {
                        c.update(intersection, id, remaining, now, est, pad, true)?;
                    }
                    Some(())
                });
                if registered {
                    if let Some(v) = vehicles.get_mut(id) {
                        if !v.registered.contains(&intersection) {
                            v.registered.push(intersection);
                        }
                    }
                }
                registered
            }
            Intent::UpdateConflict { intersection, remaining, will_wait } => {
                refresh_conflict(network, vehicles, model, id, intersection, |c, est, pad| {
                    c.update(intersection, id, remaining, now, est, pad, will_wait).map(|_| ())
                })
            }
            Intent::UnregisterConflict(intersection) => {
                network.conflicts.unregister(intersection, id);
                if let Some(v) = vehicles.get_mut(id) {
                    v.registered.retain(|x| *x != intersection);
                }
                true
            }
            Intent::BeginLaneChange { target, point, forced } => {
                let Some(from) = begin_lane_change(network, vehicles, id, target, &point, forced) else {
                    return false;
                };
                events.push(VehicleEvent::LaneChangeStarted { vehicle: id, from, to: target, forced });
                true
            }
            Intent::RequestYield { to, arc } => {
                let Some(v) = vehicles.get_mut(to) else { return false };
                v.yield_request = Some(YieldRequest { from: id, arc });
                true
            }
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn check_entry_gap(network: &RoadNetwork, vehicles: &VehicleStore, vehicle: &Vehicle) -> MobilityResult<()> {
    let edge = network.edge(vehicle.edge);
    let mut leader: Option<&Vehicle> = None;
    let mut follower: Option<&Vehicle> = None;
    for o in edge.occupancy.iter().filter_map(|o| vehicles.get(*o)) {
        if o.arc > vehicle.arc {
            leader = Some(o);
            break;
        }
        follower = Some(o);
    }
    if let Some(l) = leader {
        let p = &vehicle.params;
        let gap = l.rear_arc() - vehicle.arc;
        let required = p.min_gap + vehicle.velocity * vehicle.velocity / (2.0 * p.comfortable_deceleration);
        if gap < required {
            return Err(MobilityError::EntryBlocked { edge: vehicle.edge, gap, required });
        }
    }
    if let Some(f) = follower {
        let gap = vehicle.rear_arc() - f.arc;
        let required = f.params.min_gap;
        if gap < required {
            return Err(MobilityError::EntryBlocked { edge: vehicle.edge, gap, required });
        }
    }
    Ok(())
}

/// Run `write` against the conflict index with an estimator for `id`.
/// Returns `true` if it succeeded.
fn refresh_conflict(
    network:      &mut RoadNetwork,
    vehicles:     &VehicleStore,
    model:        &dyn CarFollowingModel,
    id:           VehicleId,
    intersection: IntersectionId,
    write:        impl FnOnce(&mut ConflictIndex, &VehicleEstimator<'_>, f64) -> Option<()>,
) -> bool {
    let Some(v) = vehicles.get(id) else { return false };
    let desired = network.edge(v.edge).target_velocity * v.speed_factor;
    let pad = network.kernel().blocking_pad_fraction;
    let estimator = VehicleEstimator::new(model, v, desired);
    let done = write(&mut network.conflicts, &estimator, pad).is_some();
    if !done {
        log::debug!("{id} could not refresh its claim on {intersection}");
    }
    done
}

/// Move `id` onto `target` beside its current position.  Returns the source
/// edge, or `None` if the target has no room any more.
fn begin_lane_change(
    network:  &mut RoadNetwork,
    vehicles: &mut VehicleStore,
    id:       VehicleId,
    target:   EdgeId,
    point:    &LaneChangePoint,
    forced:   bool,
) -> Option<EdgeId> {
    let v = vehicles.get(id)?;
    if v.lane_change.is_some() {
        return None;
    }
    let source = v.edge;
    let entry = merge_entry_arc(point, v.arc);
    let (front, rear) = (entry, entry - v.length);
    let clear = network
        .edge(target)
        .occupancy
        .iter()
        .filter(|o| **o != id)
        .filter_map(|o| vehicles.get(*o))
        .all(|o| o.arc <= rear || o.rear_arc() >= front);
    if !clear {
        log::debug!("{id} found {target} blocked at {entry:.1}; change deferred");
        return None;
    }

    network.edge_mut(source).remove_occupant(id);
    network
        .edge_mut(target)
        .insert_occupant(id, entry, |o| vehicles.get(o).map_or(0.0, |v| v.arc));

    let v = vehicles.get_mut(id)?;
    v.lane_change = Some(LaneChange {
        source_edge: source,
        source_arc:  v.arc,
        target_edge: target,
        target_arc:  entry,
        distance:    (point.target_arc - entry).max(0.0),
        progress:    0.0,
        forced,
    });
    v.edge = target;
    v.arc = entry;
    v.stopped_at = None;
    v.last_change = Some((source, v.stats.mileage));
    v.stats.lane_changes += 1;
    if let Some(front) = v.route.front().copied() {
        if front.edge == source {
            v.route.pop_front();
            v.route.push_front(RouteSegment::plain(target, front.next_node, front.cost));
        }
    }
    Some(source)
}

/// Take `id` off the network, dropping its occupancy and conflict claims.
pub(crate) fn remove_vehicle(network: &mut RoadNetwork, vehicles: &mut VehicleStore, id: VehicleId) -> Option<Vehicle> {
    let v = vehicles.remove(id)?;
    for &x in &v.registered {
        network.conflicts.unregister(x, id);
    }
    network.edge_mut(v.edge).remove_occupant(id);
    Some(v)
}
