//! The per-vehicle record.
//!
//! A `Vehicle` is plain data.  The think phase reads it through
//! `&VehicleStore`; only the move phase writes it.

use ts_core::{Aabb, EdgeId, IntersectionId, NodeId, Vec2, VehicleClass, VehicleId};
use ts_spatial::{RoadNetwork, Route};

// ── Driver parameters ─────────────────────────────────────────────────────────

/// Per-instance driver parameters, randomised around the class defaults at
/// spawn.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriverParams {
    /// IDM `a`, m/s².
    pub max_acceleration:         f64,
    /// IDM `b`, m/s².
    pub comfortable_deceleration: f64,
    /// Jam distance `s0`, metres.
    pub min_gap:                  f64,
    /// Safe time headway `T`, seconds.
    pub reaction_time:            f64,
    /// MOBIL `p`: weight given to the new follower's loss.
    pub politeness:               f64,
}

// ── Behaviour label ───────────────────────────────────────────────────────────

/// What bound the vehicle's acceleration on its last think.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DriveState {
    #[default]
    FreeDrive,
    Following,
    /// Braking for a stop sign or a red signal.
    AtStop,
    /// Held back by intersection arbitration.
    ApproachingConflict,
    LaneChanging,
    /// Stopped at the end of a forced lane-change interval, asking the
    /// adjacent follower to make room.
    WaitingForYield,
}

impl DriveState {
    /// Stable label for output rows.
    pub fn as_str(self) -> &'static str {
        match self {
            DriveState::FreeDrive           => "free",
            DriveState::Following           => "following",
            DriveState::AtStop              => "stop",
            DriveState::ApproachingConflict => "conflict",
            DriveState::LaneChanging        => "lane_change",
            DriveState::WaitingForYield     => "waiting_for_yield",
        }
    }
}

impl std::fmt::Display for DriveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Lane change ───────────────────────────────────────────────────────────────

/// An in-progress lane change.
///
/// Logically the vehicle already lives on `target_edge`; for rendering and
/// for the followers it left behind it is blended from the source lane over
/// `distance` metres.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaneChange {
    pub source_edge: EdgeId,
    /// Front arc on the source edge when the change began.
    pub source_arc:  f64,
    pub target_edge: EdgeId,
    /// Front arc on the target edge when the change began.
    pub target_arc:  f64,
    pub distance:    f64,
    pub progress:    f64,
    pub forced:      bool,
}

impl LaneChange {
    /// Blend ratio in `[0, 1]`: 0 is fully on the source lane.
    pub fn ratio(&self) -> f64 {
        if self.distance <= 0.0 {
            return 1.0;
        }
        (self.progress / self.distance).clamp(0.0, 1.0)
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.progress >= self.distance
    }

    /// Where the vehicle's front would be on the source edge had it stayed.
    #[inline]
    pub fn source_equivalent_arc(&self) -> f64 {
        self.source_arc + self.progress
    }
}

/// Request from a vehicle stuck at the end of a forced lane-change interval.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct YieldRequest {
    pub from: VehicleId,
    /// Arc on the yielding vehicle's edge where the requester will merge in.
    pub arc:  f64,
}

// ── Statistics ────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleStats {
    /// Metres driven.
    pub mileage:      f64,
    /// Transitions from moving to stopped.
    pub stops:        u32,
    pub lane_changes: u32,
    pub ticks_alive:  u64,
}

// ── Vehicle ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Vehicle {
    pub id:    VehicleId,
    pub class: VehicleClass,

    // ── Kinematics ────────────────────────────────────────────────────────
    pub edge:         EdgeId,
    /// Front position along `edge`, metres.
    pub arc:          f64,
    pub position:     Vec2,
    /// Radians, counter-clockwise from +x.
    pub heading:      f64,
    pub velocity:     f64,
    pub acceleration: f64,
    /// Multiplier on the edge's target velocity.
    pub speed_factor: f64,

    // ── Body and driver ───────────────────────────────────────────────────
    pub length: f64,
    pub width:  f64,
    pub params: DriverParams,

    // ── Plan ──────────────────────────────────────────────────────────────
    pub route:        Route,
    pub destinations: Vec<NodeId>,
    /// Set at spawn; the first think plans the route.
    pub needs_route:  bool,
    pub lane_change:  Option<LaneChange>,
    /// Edge left by the latest lane change and the mileage it began at.
    pub last_change:  Option<(EdgeId, f64)>,
    /// Intersections this vehicle holds a registration on.
    pub registered:   Vec<IntersectionId>,
    /// Yield asked of this vehicle this tick.
    pub yield_request: Option<YieldRequest>,
    /// Stop-sign node this vehicle has already come to a halt at.
    pub stopped_at:   Option<NodeId>,

    pub state: DriveState,
    pub stats: VehicleStats,
}

impl Vehicle {
    /// An unplaced vehicle.  Call [`place`](Self::place) before inserting it
    /// into an edge's occupancy.
    pub fn new(
        id:           VehicleId,
        class:        VehicleClass,
        length:       f64,
        width:        f64,
        params:       DriverParams,
        speed_factor: f64,
    ) -> Self {
        Self {
            id,
            class,
            edge:          EdgeId::INVALID,
            arc:           0.0,
            position:      Vec2::ZERO,
            heading:       0.0,
            velocity:      0.0,
            acceleration:  0.0,
            speed_factor,
            length,
            width,
            params,
            route:         Route::new(),
            destinations:  Vec::new(),
            needs_route:   true,
            lane_change:   None,
            last_change:   None,
            registered:    Vec::new(),
            yield_request: None,
            stopped_at:    None,
            state:         DriveState::FreeDrive,
            stats:         VehicleStats::default(),
        }
    }

    /// Put the vehicle's front at `arc` on `edge` and derive its pose.
    pub fn place(&mut self, network: &RoadNetwork, edge: EdgeId, arc: f64, velocity: f64) {
        self.edge = edge;
        self.arc = arc;
        self.velocity = velocity;
        self.update_pose(network);
    }

    #[must_use]
    pub fn heading_to(mut self, destinations: impl IntoIterator<Item = NodeId>) -> Self {
        self.destinations = destinations.into_iter().collect();
        self
    }

    #[inline]
    pub fn rear_arc(&self) -> f64 {
        self.arc - self.length
    }

    #[inline]
    pub fn is_lane_changing(&self) -> bool {
        self.lane_change.is_some()
    }

    #[inline]
    pub fn is_destination(&self, node: NodeId) -> bool {
        self.destinations.contains(&node)
    }

    /// Recompute `position` and `heading` from the edge curve, blending from
    /// the source lane while a lane change is in progress.
    pub fn update_pose(&mut self, network: &RoadNetwork) {
        let curve = &network.edge(self.edge).curve;
        let arc = self.arc.clamp(0.0, curve.length());
        let position = curve.position_at_arclength(arc);
        let direction = curve.direction_at_arclength(arc).unwrap_or(Vec2::new(1.0, 0.0));

        let (position, direction) = match &self.lane_change {
            Some(lc) => {
                let source = &network.edge(lc.source_edge).curve;
                let s = lc.source_equivalent_arc().clamp(0.0, source.length());
                let from = source.position_at_arclength(s);
                let from_dir = source.direction_at_arclength(s).unwrap_or(direction);
                let r = lc.ratio();
                (from.lerp(position, r), from_dir.lerp(direction, r))
            }
            None => (position, direction),
        };
        self.position = position;
        self.heading = direction.angle();
    }

    /// Axis-aligned box around the vehicle's body rectangle.
    pub fn bounding_box(&self) -> Aabb {
        let forward = Vec2::new(self.heading.cos(), self.heading.sin());
        let side = forward.perp() * (self.width / 2.0);
        let rear = self.position - forward * self.length;
        Aabb::from_points([
            self.position + side,
            self.position - side,
            rear + side,
            rear - side,
        ])
    }

    /// `true` if every kinematic quantity is finite.
    pub fn is_finite(&self) -> bool {
        self.arc.is_finite()
            && self.velocity.is_finite()
            && self.acceleration.is_finite()
            && self.position.is_finite()
    }
}
