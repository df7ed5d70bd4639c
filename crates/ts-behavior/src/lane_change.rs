//! Gap checks for moving onto a neighbouring lane.

use ts_core::VehicleId;
use ts_spatial::LaneChangePoint;
use ts_vehicle::Vehicle;

use crate::context::ThinkContext;
use crate::mobil::MobilInput;
use crate::model::{CarFollowingModel, Obstacle};

/// Front arc on the target edge of a vehicle at `arc` starting a change at
/// `point`.  The vehicle is placed beside where it currently is.
#[inline]
pub fn merge_entry_arc(point: &LaneChangePoint, arc: f64) -> f64 {
    (point.target_hit_arc - (point.source_arc - arc)).max(0.0)
}

/// The target lane as seen from the merge position.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MergeCheck {
    pub input:    MobilInput,
    /// Both gaps are positive.
    pub clear:    bool,
    /// The vehicle that would end up directly behind.
    pub follower: Option<VehicleId>,
    /// Front arc on the target after the change.
    pub entry:    f64,
}

/// Evaluate a change at `point` for a vehicle whose acceleration in its
/// current lane is `current`.  `None` if the target does not admit the
/// vehicle's class.
pub fn check_merge(
    vehicle: &Vehicle,
    point:   &LaneChangePoint,
    current: f64,
    ctx:     &ThinkContext<'_>,
    model:   &dyn CarFollowingModel,
) -> Option<MergeCheck> {
    let target = ctx.network.edge(point.target);
    if !target.allows(vehicle.class) {
        return None;
    }
    let entry = merge_entry_arc(point, vehicle.arc);
    let rear = entry - vehicle.length;

    let mut leader: Option<&Vehicle> = None;
    let mut follower: Option<&Vehicle> = None;
    for &id in &target.occupancy {
        if id == vehicle.id {
            continue;
        }
        let Some(o) = ctx.vehicles.get(id) else { continue };
        if o.arc > entry {
            leader = Some(o);
            break;
        }
        follower = Some(o);
    }

    let mut clear = true;
    let leader_obstacle = leader.map(|l| {
        let gap = l.rear_arc() - entry;
        clear &= gap > 0.0;
        Obstacle::vehicle(gap, l.velocity)
    });
    let desired = target.target_velocity * vehicle.speed_factor;
    let mine = model.acceleration(&vehicle.params, vehicle.velocity, desired, leader_obstacle);

    let new_follower = follower.map(|f| {
        let gap = rear - f.arc;
        clear &= gap > 0.0;
        let f_desired = target.target_velocity * f.speed_factor;
        let before_obstacle = leader.map(|l| Obstacle::vehicle(l.rear_arc() - f.arc, l.velocity));
        let before = model.acceleration(&f.params, f.velocity, f_desired, before_obstacle);
        let after = model.acceleration(
            &f.params,
            f.velocity,
            f_desired,
            Some(Obstacle::vehicle(gap, vehicle.velocity)),
        );
        (before, after)
    });

    Some(MergeCheck {
        input: MobilInput { current, target: mine, new_follower },
        clear,
        follower: follower.map(|f| f.id),
        entry,
    })
}
