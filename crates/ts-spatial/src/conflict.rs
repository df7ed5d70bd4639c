//! Conflict index: crossings between edges and per-vehicle registrations.
//!
//! # Protocol
//!
//! A vehicle approaching a crossing registers on its side of the
//! [`Intersection`] with the distance still to cover.  The registration
//! stores a projected blocking window, the interval during which the vehicle
//! occupies the crossing zone, and the *original* unobstructed arrival time
//! computed when it first registered.  The window is refreshed every tick;
//! the original arrival never changes, which keeps equal-priority arbitration
//! from oscillating as vehicles slow down for each other.
//!
//! | Priority of my edge | Outcome                                              |
//! |---------------------|------------------------------------------------------|
//! | higher              | proceed unless an interferer is inside the crossing  |
//! | lower               | wait while any interference exists                   |
//! | equal               | earlier original arrival proceeds (ties: lower ID)   |
//!
//! Vehicles that declared they will wait do not interfere, unless their
//! remaining distance is negative (they are physically on the crossing).

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use ts_core::{EdgeId, IntersectionId, KernelConfig, VehicleId, Vec2};

use crate::curve::Curve;
use crate::network::Edge;

/// Crossings at a node shared by both edges closer than this are ignored.
const SHARED_NODE_RADIUS: f64 = 0.5;

/// Curve/curve intersection tolerance, metres.
pub const CROSSING_TOLERANCE: f64 = 0.05;

// ── Side ──────────────────────────────────────────────────────────────────────

/// Which of the two participating edges.  `First` is the lower `EdgeId`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub enum Side {
    First,
    Second,
}

impl Side {
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Side::First  => 0,
            Side::Second => 1,
        }
    }

    #[inline]
    pub fn other(self) -> Side {
        match self {
            Side::First  => Side::Second,
            Side::Second => Side::First,
        }
    }
}

// ── Registration ──────────────────────────────────────────────────────────────

/// Closed time interval (seconds of simulated time).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BlockingWindow {
    pub start: f64,
    pub end:   f64,
}

impl BlockingWindow {
    #[inline]
    pub fn overlaps(&self, other: &BlockingWindow) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// One vehicle's claim on one side of an intersection.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Registration {
    /// Unobstructed arrival time projected at first registration.
    pub original_arrival: f64,
    /// Distance from the vehicle's front to the crossing point.  Negative once
    /// the front has passed it.
    pub remaining:        f64,
    pub window:           BlockingWindow,
    /// Set once arbitration told the vehicle to wait.
    pub will_wait:        bool,
}

/// The kinematic estimates a registration needs from the registering vehicle.
///
/// Implemented by the behaviour crate on top of the car-following model.
pub trait ArrivalEstimator {
    /// Seconds to cover `distance` metres from the current state on a free
    /// road.  May be infinite.
    fn time_to_cover(&self, distance: f64) -> f64;

    fn reaction_time(&self) -> f64;

    /// Physical length of the vehicle.
    fn length(&self) -> f64;
}

/// Result of [`Intersection::arbitrate`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Arbitration {
    Proceed,
    Wait,
}

// ── Intersection ──────────────────────────────────────────────────────────────

/// A single crossing of two edge curves.
#[derive(Clone, Debug)]
pub struct Intersection {
    pub id:         IntersectionId,
    /// Participating edges, lower ID first.
    pub edges:      [EdgeId; 2],
    /// Curve parameters of the crossing on each edge.
    pub times:      [f64; 2],
    /// Arc positions of the crossing on each edge.
    pub arcs:       [f64; 2],
    pub position:   Vec2,
    /// Distance before the crossing where the curves come within the
    /// proximity bound, per side.
    pub front:      [f64; 2],
    /// Distance after the crossing until the curves separate again, per side.
    pub rear:       [f64; 2],
    pub priorities: [i32; 2],
    registrations:  [BTreeMap<VehicleId, Registration>; 2],
}

impl Intersection {
    pub fn side_of(&self, edge: EdgeId) -> Option<Side> {
        if self.edges[0] == edge {
            Some(Side::First)
        } else if self.edges[1] == edge {
            Some(Side::Second)
        } else {
            None
        }
    }

    #[inline]
    pub fn edge(&self, side: Side) -> EdgeId {
        self.edges[side.index()]
    }

    #[inline]
    pub fn arc(&self, side: Side) -> f64 {
        self.arcs[side.index()]
    }

    /// The other participating edge.
    #[inline]
    pub fn other_edge(&self, side: Side) -> EdgeId {
        self.edges[side.other().index()]
    }

    /// Arc range on `side` inside which a vehicle body obstructs the crossing.
    pub fn blocking_zone(&self, side: Side) -> (f64, f64) {
        let i = side.index();
        (self.arcs[i] - self.front[i], self.arcs[i] + self.rear[i])
    }

    pub fn registrations(&self, side: Side) -> &BTreeMap<VehicleId, Registration> {
        &self.registrations[side.index()]
    }

    pub fn registration(&self, side: Side, vehicle: VehicleId) -> Option<&Registration> {
        self.registrations[side.index()].get(&vehicle)
    }

    /// Side `vehicle` is registered on, if any.
    pub fn registered_side(&self, vehicle: VehicleId) -> Option<Side> {
        [Side::First, Side::Second]
            .into_iter()
            .find(|s| self.registrations[s.index()].contains_key(&vehicle))
    }

    /// Compute a registration without storing it.
    ///
    /// `previous` carries the original arrival over from an existing
    /// registration; `None` projects a fresh one.
    #[allow(clippy::too_many_arguments)]
    pub fn project(
        &self,
        side: Side,
        remaining: f64,
        now: f64,
        estimator: &dyn ArrivalEstimator,
        pad_fraction: f64,
        previous: Option<&Registration>,
        will_wait: bool,
    ) -> Registration {
        let i = side.index();
        let pad = pad_fraction * estimator.reaction_time();
        let cover = |d: f64| if d > 0.0 { estimator.time_to_cover(d) } else { 0.0 };

        let enter = cover(remaining - self.front[i]);
        let leave = cover(remaining + self.rear[i] + estimator.length());
        let original_arrival = match previous {
            Some(p) => p.original_arrival,
            None    => now + cover(remaining),
        };
        Registration {
            original_arrival,
            remaining,
            window: BlockingWindow { start: now + enter - pad, end: now + leave + pad },
            will_wait,
        }
    }

    /// Store `registration` for `vehicle` on `side`, replacing any previous
    /// one on that side.
    pub fn insert_registration(&mut self, vehicle: VehicleId, side: Side, registration: Registration) {
        debug_assert!(
            !self.registrations[side.other().index()].contains_key(&vehicle),
            "{vehicle} registered on both sides of {}",
            self.id
        );
        self.registrations[side.index()].insert(vehicle, registration);
    }

    /// Remove `vehicle` from whichever side it is on.
    pub fn unregister(&mut self, vehicle: VehicleId) -> bool {
        let a = self.registrations[0].remove(&vehicle).is_some();
        let b = self.registrations[1].remove(&vehicle).is_some();
        a || b
    }

    /// Registrations on the other side whose windows overlap `window`.
    ///
    /// Vehicles that declared they will wait are skipped while they are still
    /// short of the crossing point.
    pub fn interfering_vehicles(
        &self,
        vehicle: VehicleId,
        side: Side,
        window: &BlockingWindow,
    ) -> Vec<(VehicleId, &Registration)> {
        self.registrations[side.other().index()]
            .iter()
            .filter(|(id, _)| **id != vehicle)
            .filter(|(_, r)| !r.will_wait || r.remaining < 0.0)
            .filter(|(_, r)| r.window.overlaps(window))
            .map(|(id, r)| (*id, r))
            .collect()
    }

    /// Decide whether `vehicle`, holding `mine` on `side`, may cross.
    pub fn arbitrate(&self, vehicle: VehicleId, side: Side, mine: &Registration) -> Arbitration {
        if mine.remaining < 0.0 {
            return Arbitration::Proceed;
        }
        let interfering = self.interfering_vehicles(vehicle, side, &mine.window);
        if interfering.is_empty() {
            return Arbitration::Proceed;
        }
        if interfering.iter().any(|(_, r)| r.remaining < 0.0) {
            return Arbitration::Wait;
        }
        let mine_p = self.priorities[side.index()];
        let theirs = self.priorities[side.other().index()];
        match mine_p.cmp(&theirs) {
            Ordering::Greater => Arbitration::Proceed,
            Ordering::Less    => Arbitration::Wait,
            Ordering::Equal => {
                let first_come = |(id, r): &(VehicleId, &Registration)| {
                    r.original_arrival
                        .total_cmp(&mine.original_arrival)
                        .then(id.cmp(&vehicle))
                        == Ordering::Less
                };
                if interfering.iter().any(first_come) {
                    Arbitration::Wait
                } else {
                    Arbitration::Proceed
                }
            }
        }
    }
}

// ── ConflictIndex ─────────────────────────────────────────────────────────────

/// Arena of intersections.  IDs of removed intersections are never reused.
#[derive(Clone, Debug, Default)]
pub struct ConflictIndex {
    slots: Vec<Option<Intersection>>,
}

impl ConflictIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live intersections.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get(&self, id: IntersectionId) -> Option<&Intersection> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, id: IntersectionId) -> Option<&mut Intersection> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Intersection> + '_ {
        self.slots.iter().flatten()
    }

    /// Intersections between two specific edges, in either order.
    pub fn between(&self, a: EdgeId, b: EdgeId) -> impl Iterator<Item = &Intersection> + '_ {
        let key = if a < b { [a, b] } else { [b, a] };
        self.iter().filter(move |x| x.edges == key)
    }

    /// Register `vehicle` arriving on `edge` with a fresh original arrival.
    ///
    /// Returns the stored registration, or `None` if `edge` does not take part
    /// in the intersection.
    #[allow(clippy::too_many_arguments)]
    pub fn register(
        &mut self,
        id: IntersectionId,
        vehicle: VehicleId,
        edge: EdgeId,
        remaining: f64,
        now: f64,
        estimator: &dyn ArrivalEstimator,
        pad_fraction: f64,
    ) -> Option<Registration> {
        let x = self.get_mut(id)?;
        let side = x.side_of(edge);
        debug_assert!(side.is_some(), "{edge} does not take part in {id}");
        let side = side?;
        let reg = x.project(side, remaining, now, estimator, pad_fraction, None, false);
        x.insert_registration(vehicle, side, reg);
        Some(reg)
    }

    /// Refresh an existing registration, keeping its original arrival.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        id: IntersectionId,
        vehicle: VehicleId,
        remaining: f64,
        now: f64,
        estimator: &dyn ArrivalEstimator,
        pad_fraction: f64,
        will_wait: bool,
    ) -> Option<Registration> {
        let x = self.get_mut(id)?;
        let side = x.registered_side(vehicle);
        debug_assert!(side.is_some(), "{vehicle} never registered on {id}");
        let side = side?;
        let previous = x.registration(side, vehicle).copied();
        let reg = x.project(side, remaining, now, estimator, pad_fraction, previous.as_ref(), will_wait);
        x.insert_registration(vehicle, side, reg);
        Some(reg)
    }

    pub fn unregister(&mut self, id: IntersectionId, vehicle: VehicleId) -> bool {
        self.get_mut(id).is_some_and(|x| x.unregister(vehicle))
    }

    /// Vehicles on the other side of `id` interfering with `vehicle`'s
    /// current window.
    pub fn interfering_vehicles(&self, id: IntersectionId, vehicle: VehicleId, edge: EdgeId) -> Vec<VehicleId> {
        let Some(x) = self.get(id) else { return Vec::new() };
        let Some(side) = x.side_of(edge) else { return Vec::new() };
        let Some(mine) = x.registration(side, vehicle) else {
            debug_assert!(false, "{vehicle} queried {id} without registering");
            return Vec::new();
        };
        x.interfering_vehicles(vehicle, side, &mine.window)
            .into_iter()
            .map(|(v, _)| v)
            .collect()
    }

    /// Drop every registration held by `vehicle`.
    pub fn clear_vehicle(&mut self, vehicle: VehicleId) {
        for x in self.slots.iter_mut().flatten() {
            x.unregister(vehicle);
        }
    }

    pub(crate) fn insert(&mut self, mut x: Intersection) -> IntersectionId {
        let id = IntersectionId(self.slots.len() as u32);
        x.id = id;
        self.slots.push(Some(x));
        id
    }

    /// Remove every intersection touching one of `edges`.
    pub(crate) fn remove_touching(&mut self, edges: &BTreeSet<EdgeId>) -> usize {
        let mut removed = 0;
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|x| edges.contains(&x.edges[0]) || edges.contains(&x.edges[1])) {
                *slot = None;
                removed += 1;
            }
        }
        removed
    }
}

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Crossings between two edges, with waiting distances filled in.
///
/// Both edges must be on overlapping layers; the caller checks.  Returned
/// intersections carry `IntersectionId::INVALID` until inserted.
pub(crate) fn discover(a: &Edge, b: &Edge, config: &KernelConfig) -> Vec<Intersection> {
    let (a, b) = if a.id < b.id { (a, b) } else { (b, a) };
    if a.id == b.id {
        return Vec::new();
    }
    let shared: Vec<Vec2> = [(a.from, a.curve.start()), (a.to, a.curve.end())]
        .into_iter()
        .filter(|(n, _)| *n == b.from || *n == b.to)
        .map(|(_, p)| p)
        .collect();

    a.curve
        .intersections(&b.curve, CROSSING_TOLERANCE)
        .into_iter()
        .filter(|hit| shared.iter().all(|p| p.distance(hit.position) > SHARED_NODE_RADIUS))
        .map(|hit| {
            let arcs = [a.curve.time_to_arclength(hit.t_self), b.curve.time_to_arclength(hit.t_other)];
            Intersection {
                id:            IntersectionId::INVALID,
                edges:         [a.id, b.id],
                times:         [hit.t_self, hit.t_other],
                arcs,
                position:      hit.position,
                front:         [
                    waiting_distance(&a.curve, arcs[0], &b.curve, -1.0, config),
                    waiting_distance(&b.curve, arcs[1], &a.curve, -1.0, config),
                ],
                rear:          [
                    waiting_distance(&a.curve, arcs[0], &b.curve, 1.0, config),
                    waiting_distance(&b.curve, arcs[1], &a.curve, 1.0, config),
                ],
                priorities:    [a.priority, b.priority],
                registrations: [BTreeMap::new(), BTreeMap::new()],
            }
        })
        .collect()
}

/// Step from `arc` along `own` (backwards for `direction < 0`) until the
/// point is farther than the proximity bound from `other`.
///
/// Running off the end of the edge stops the walk there.
fn waiting_distance(own: &Curve, arc: f64, other: &Curve, direction: f64, config: &KernelConfig) -> f64 {
    let step = config.conflict_step.max(1e-3);
    let limit = if direction < 0.0 { arc } else { own.length() - arc }.min(config.max_waiting_distance);
    let mut d = 0.0;
    loop {
        let next = d + step;
        if next >= limit {
            return limit.max(0.0);
        }
        let p = own.position_at_arclength(arc + direction * next);
        if !other.is_near(p, config.conflict_proximity) {
            return next;
        }
        d = next;
    }
}
