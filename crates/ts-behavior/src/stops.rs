//! Stop signs and red signals along the path ahead.

use ts_vehicle::Vehicle;

use crate::context::ThinkContext;
use crate::path::Stretch;

/// Distance to the first node ahead where the vehicle must stop.
///
/// A stop sign binds until the vehicle has come to rest at it once
/// (`stopped_at`).  A red signal binds only if the vehicle can still stop
/// before the line at maximum braking; otherwise it carries on through.
/// Nothing beyond a destination node is considered.
pub fn stop_ahead(vehicle: &Vehicle, path: &[Stretch], ctx: &ThinkContext<'_>) -> Option<f64> {
    let config = ctx.config;
    for s in path {
        let Some(node) = s.end_node else { continue };
        let distance = s.distance_to(s.end);
        if distance > config.lookahead {
            break;
        }
        if vehicle.is_destination(node) {
            break;
        }
        let n = ctx.network.node(node);
        if n.stop_sign && vehicle.stopped_at != Some(node) {
            return Some(distance);
        }
        if n.signal && ctx.signals.is_red(node, ctx.now) {
            let braking = vehicle.velocity * vehicle.velocity / (2.0 * config.max_braking);
            if braking <= distance {
                return Some(distance);
            }
            log::trace!("{} too close to stop for red at {node}", vehicle.id);
        }
    }
    None
}
