//! `TrafficDriver`: the default think kernel.
//!
//! # Per-vehicle think order
//!
//! 1. Degenerate state check, then initial routing if the vehicle has none.
//! 2. Walk the path ahead up to lookahead ([`path_ahead`]).
//! 3. Collect longitudinal constraints, each an IDM acceleration:
//!    free road, leader, yield request, stop sign or red signal, conflict
//!    wait position, forced lane-change deadline.
//! 4. Lane-change decisions: forced when the route demands one, voluntary
//!    by MOBIL otherwise.
//! 5. The minimum acceleration wins and names the drive state.
//!
//! Think never writes.  Everything it wants changed is returned as
//! [`Intent`]s or a new route inside the [`Decision`].

use ts_core::{EdgeId, KernelConfig, VehicleRng};
use ts_spatial::{LaneChangePoint, Route, RouteRequest, RouteSegment, RouteStart};
use ts_vehicle::{DriveState, Vehicle};

use crate::arbitration;
use crate::context::ThinkContext;
use crate::driver::DriverModel;
use crate::error::{BehaviorError, BehaviorResult};
use crate::idm::Idm;
use crate::intent::{Decision, Fate, Intent};
use crate::lane_change::{check_merge, merge_entry_arc};
use crate::leader::{nearest_leader, Leader};
use crate::mobil::Mobil;
use crate::model::{CarFollowingModel, Obstacle};
use crate::path::path_ahead;
use crate::stops::stop_ahead;

/// IDM car following, MOBIL lane changes, conflict arbitration.
#[derive(Clone, Debug, PartialEq)]
pub struct TrafficDriver<M: CarFollowingModel = Idm> {
    pub following: M,
    pub mobil:     Mobil,
}

impl TrafficDriver<Idm> {
    pub fn new(config: &KernelConfig) -> BehaviorResult<Self> {
        TrafficDriver::with_model(Idm::new(config), config)
    }
}

impl<M: CarFollowingModel> TrafficDriver<M> {
    /// Use a custom longitudinal model.
    pub fn with_model(following: M, config: &KernelConfig) -> BehaviorResult<Self> {
        validate(config)?;
        Ok(Self { following, mobil: Mobil::new(config) })
    }
}

fn validate(config: &KernelConfig) -> BehaviorResult<()> {
    let positive = [
        ("lookahead", config.lookahead),
        ("idm_step", config.idm_step),
        ("max_braking", config.max_braking),
        ("lane_change_step", config.lane_change_step),
        ("stopped_velocity", config.stopped_velocity),
    ];
    for (name, value) in positive {
        if !(value.is_finite() && value > 0.0) {
            return Err(BehaviorError::NotPositive { name, value });
        }
    }
    if config.idm_max_steps == 0 {
        return Err(BehaviorError::NoIntegrationSteps);
    }
    for (name, value) in [
        ("conflict_stop_margin", config.conflict_stop_margin),
        ("stop_tolerance", config.stop_tolerance),
        ("lane_change_cooldown", config.lane_change_cooldown),
    ] {
        if value < 0.0 {
            return Err(BehaviorError::Negative { name, value });
        }
    }
    Ok(())
}

// ── Constraint bookkeeping ────────────────────────────────────────────────────

/// Candidate accelerations with the state each would represent.
struct Constraints<'m> {
    model:   &'m dyn CarFollowingModel,
    desired: f64,
    bounds:  Vec<(f64, DriveState)>,
}

impl<'m> Constraints<'m> {
    fn new(model: &'m dyn CarFollowingModel, vehicle: &Vehicle, desired: f64) -> Self {
        let free = model.acceleration(&vehicle.params, vehicle.velocity, desired, None);
        Self { model, desired, bounds: vec![(free, DriveState::FreeDrive)] }
    }

    fn push(&mut self, vehicle: &Vehicle, obstacle: Obstacle, state: DriveState) -> f64 {
        let acc = self.model.acceleration(&vehicle.params, vehicle.velocity, self.desired, Some(obstacle));
        self.bounds.push((acc, state));
        acc
    }

    /// Halt with the front on the line `distance` ahead.
    fn stop_line(&mut self, vehicle: &Vehicle, distance: f64, state: DriveState) {
        self.push(vehicle, Obstacle::stop_at(distance + vehicle.params.min_gap), state);
    }

    fn binding(&self) -> (f64, DriveState) {
        self.bounds
            .iter()
            .copied()
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .unwrap_or((0.0, DriveState::FreeDrive))
    }
}

// ── Think ─────────────────────────────────────────────────────────────────────

impl<M: CarFollowingModel + 'static> DriverModel for TrafficDriver<M> {
    fn think(&self, vehicle: &Vehicle, ctx: &ThinkContext<'_>, _rng: &mut VehicleRng) -> Decision {
        if !vehicle.is_finite() {
            log::warn!("{} has a non-finite state; removing", vehicle.id);
            return Decision::die(Fate::Degenerate);
        }

        let mut new_route = None;
        if vehicle.needs_route {
            let route = route_from(vehicle, ctx, RouteStart::OnEdge { edge: vehicle.edge, arc: vehicle.arc });
            if route.is_empty() {
                log::warn!("{} cannot reach any destination from {}", vehicle.id, vehicle.edge);
                return Decision::die(Fate::NoRoute);
            }
            new_route = Some(route);
        }
        let routed_now = new_route.is_some();

        let config = ctx.config;
        let model: &dyn CarFollowingModel = &self.following;
        let edge = ctx.network.edge(vehicle.edge);
        let desired = edge.target_velocity * vehicle.speed_factor;
        let route = new_route.as_ref().unwrap_or(&vehicle.route);
        let path = path_ahead(vehicle, route, ctx.network, config.lookahead);

        let mut constraints = Constraints::new(model, vehicle, desired);
        let mut intents = Vec::new();

        let leader = nearest_leader(vehicle, &path, ctx);
        let current = match leader {
            Some(l) => constraints.push(vehicle, l.obstacle, DriveState::Following),
            None    => constraints.bounds[0].0,
        };

        if let Some(request) = vehicle.yield_request {
            if let Some(requester) = ctx.vehicles.get(request.from) {
                if request.arc > vehicle.arc {
                    let gap = request.arc - requester.length - vehicle.arc;
                    constraints.push(vehicle, Obstacle::vehicle(gap, 0.0), DriveState::Following);
                }
            }
        }

        if let Some(distance) = stop_ahead(vehicle, &path, ctx) {
            constraints.stop_line(vehicle, distance, DriveState::AtStop);
        }

        let upcoming = arbitration::upcoming(vehicle, &path, ctx);
        let outcome = arbitration::resolve(vehicle, &upcoming, ctx, model, desired);
        intents.extend(outcome.intents);
        if let Some(distance) = outcome.wait_at {
            constraints.stop_line(vehicle, distance, DriveState::ApproachingConflict);
        }

        let mut changing = vehicle.is_lane_changing();
        if !routed_now && vehicle.lane_change.is_none() {
            match vehicle.route.front() {
                Some(&RouteSegment { lane_change: true, target_edge: Some(target), .. }) => {
                    match self.forced_change(vehicle, target, current, ctx, &mut constraints) {
                        Forced::Began(intent) => {
                            intents.push(intent);
                            changing = true;
                        }
                        Forced::Waiting(request) => {
                            intents.extend(request);
                            changing = true;
                        }
                        Forced::Missed => {
                            let route = route_from(
                                vehicle,
                                ctx,
                                RouteStart::OnEdge { edge: vehicle.edge, arc: vehicle.arc },
                            );
                            if route.is_empty() {
                                log::warn!("{} missed its lane change and has no other route", vehicle.id);
                                return Decision::die(Fate::NoRoute);
                            }
                            log::debug!("{} missed its lane change onto {target}; rerouted", vehicle.id);
                            new_route = Some(route);
                        }
                    }
                }
                Some(_) => {
                    if let Some((intent, route)) = self.voluntary_change(vehicle, leader, current, ctx) {
                        intents.push(intent);
                        new_route = Some(route);
                        changing = true;
                    }
                }
                None => {}
            }
        }

        let (acceleration, mut state) = constraints.binding();
        let waiting = constraints.bounds.iter().any(|(_, s)| *s == DriveState::WaitingForYield);
        if waiting && state != DriveState::AtStop && state != DriveState::ApproachingConflict {
            state = DriveState::WaitingForYield;
        } else if changing && matches!(state, DriveState::FreeDrive | DriveState::Following) {
            state = DriveState::LaneChanging;
        }

        Decision { acceleration, state, intents, new_route, fate: None }
    }

    fn car_following(&self) -> &dyn CarFollowingModel {
        &self.following
    }
}

/// Outcome of a forced lane-change attempt.
enum Forced {
    Began(Intent),
    /// Holding at the end of the interval, possibly asking for room.
    Waiting(Option<Intent>),
    /// No change point left ahead.
    Missed,
}

impl<M: CarFollowingModel> TrafficDriver<M> {
    /// The route requires a change onto `target`.  Take the first safe gap
    /// within one sampling step; otherwise slow down towards the last point
    /// of the interval and, once stopped there, ask the target follower to
    /// make room.
    fn forced_change(
        &self,
        vehicle:     &Vehicle,
        target:      EdgeId,
        current:     f64,
        ctx:         &ThinkContext<'_>,
        constraints: &mut Constraints<'_>,
    ) -> Forced {
        let config = ctx.config;
        let edge = ctx.network.edge(vehicle.edge);
        let (Some(point), Some(last)) = (
            edge.lane_change_from(target, vehicle.arc),
            edge.last_lane_change_to(target),
        ) else {
            return Forced::Missed;
        };

        let check = check_merge(vehicle, point, current, ctx, &self.following);
        if point.source_arc - vehicle.arc <= config.lane_change_step {
            if let Some(c) = check {
                if c.clear && self.mobil.is_safe(&c.input) {
                    return Forced::Began(Intent::BeginLaneChange { target, point: *point, forced: true });
                }
            }
        }

        let to_end = last.source_arc - vehicle.arc;
        let stopped = vehicle.velocity < config.stopped_velocity && to_end <= config.stop_tolerance;
        if stopped {
            constraints.stop_line(vehicle, to_end, DriveState::WaitingForYield);
            let request = check_merge(vehicle, last, current, ctx, &self.following)
                .and_then(|c| c.follower)
                .map(|to| Intent::RequestYield { to, arc: merge_entry_arc(last, vehicle.arc) });
            Forced::Waiting(request)
        } else {
            constraints.stop_line(vehicle, to_end, DriveState::LaneChanging);
            Forced::Waiting(None)
        }
    }

    /// MOBIL over the change points within one sampling step, best
    /// incentive first.
    ///
    /// A change is taken only if the route from the target lane is no worse
    /// than the current one: no extra lane changes and no higher cost.  The
    /// lane just left is off limits until `lane_change_cooldown` metres
    /// have been driven.
    fn voluntary_change(
        &self,
        vehicle: &Vehicle,
        leader:  Option<Leader>,
        current: f64,
        ctx:     &ThinkContext<'_>,
    ) -> Option<(Intent, Route)> {
        leader?;
        let config = ctx.config;
        let edge = ctx.network.edge(vehicle.edge);
        let horizon = vehicle.arc + config.lane_change_step;

        let mut best: Option<(f64, LaneChangePoint)> = None;
        let mut seen = Vec::new();
        for p in edge.lane_changes.iter().filter(|p| p.source_arc >= vehicle.arc && p.source_arc <= horizon) {
            if seen.contains(&p.target) {
                continue;
            }
            seen.push(p.target);
            if recently_left(vehicle, p.target, config.lane_change_cooldown) {
                continue;
            }
            let Some(c) = check_merge(vehicle, p, current, ctx, &self.following) else { continue };
            if !c.clear || !self.mobil.should_change(vehicle.params.politeness, &c.input) {
                continue;
            }
            let incentive = self.mobil.incentive(vehicle.params.politeness, &c.input);
            if best.is_none_or(|(b, _)| incentive > b) {
                best = Some((incentive, *p));
            }
        }

        let (_, point) = best?;
        let route = route_from(vehicle, ctx, RouteStart::OnEdge { edge: point.target, arc: point.target_arc });
        if route.is_empty() || !no_worse(&route, &vehicle.route) {
            return None;
        }
        log::trace!("{} changes onto {} by choice", vehicle.id, point.target);
        Some((Intent::BeginLaneChange { target: point.target, point, forced: false }, route))
    }
}

fn recently_left(vehicle: &Vehicle, target: EdgeId, cooldown: f64) -> bool {
    vehicle
        .last_change
        .is_some_and(|(left, at)| left == target && vehicle.stats.mileage - at < cooldown)
}

/// `candidate` starts beside the front of `current`, so both cover the same
/// remaining trip.
fn no_worse(candidate: &Route, current: &Route) -> bool {
    candidate.lane_change_count() <= current.lane_change_count()
        && candidate.total_cost() <= current.total_cost() + 1e-9
}

fn route_from(vehicle: &Vehicle, ctx: &ThinkContext<'_>, start: RouteStart) -> Route {
    ctx.router.route(
        ctx.network,
        &RouteRequest { start, class: vehicle.class, destinations: &vehicle.destinations },
    )
}
