//! The stretch of road a vehicle will drive over the next lookahead.

use ts_core::{EdgeId, NodeId};
use ts_spatial::{RoadNetwork, Route};
use ts_vehicle::Vehicle;

/// One edge of the path ahead.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Stretch {
    pub edge:     EdgeId,
    /// Arc at which the vehicle's front enters the stretch.
    pub start:    f64,
    /// Arc at which it leaves.
    pub end:      f64,
    /// Distance from the vehicle's front to arc 0 of `edge`, so arc `x`
    /// lies `offset + x` ahead.  Negative on the current edge.
    pub offset:   f64,
    /// Node reached at `end`, when the stretch runs to the end of the edge.
    pub end_node: Option<NodeId>,
}

impl Stretch {
    #[inline]
    pub fn distance_to(&self, arc: f64) -> f64 {
        self.offset + arc
    }
}

/// Walk `route` from the vehicle's position until `horizon` metres ahead.
///
/// A lane-change leg contributes two stretches: the source edge up to the
/// first change point still ahead, then the target edge from beside that
/// point.  If the point has already been passed the leg is treated as plain.
pub fn path_ahead(vehicle: &Vehicle, route: &Route, network: &RoadNetwork, horizon: f64) -> Vec<Stretch> {
    let mut path = Vec::new();
    let mut reached = 0.0;

    let push_edge = |path: &mut Vec<Stretch>, edge: EdgeId, start: f64, offset: f64| -> f64 {
        let e = network.edge(edge);
        path.push(Stretch { edge, start, end: e.length(), offset, end_node: Some(e.to) });
        offset + e.length()
    };

    if route.is_empty() {
        push_edge(&mut path, vehicle.edge, vehicle.arc, -vehicle.arc);
        return path;
    }

    for (i, segment) in route.iter().enumerate() {
        let (edge, start, offset) = if i == 0 {
            (vehicle.edge, vehicle.arc, -vehicle.arc)
        } else {
            (segment.edge, 0.0, reached)
        };
        if offset + start > horizon {
            break;
        }
        let point = segment
            .target_edge
            .and_then(|target| network.edge(edge).lane_change_from(target, start));
        reached = match point {
            Some(p) => {
                path.push(Stretch { edge, start, end: p.source_arc, offset, end_node: None });
                let at_change = offset + p.source_arc;
                push_edge(&mut path, p.target, p.target_hit_arc, at_change - p.target_hit_arc)
            }
            None => push_edge(&mut path, edge, start, offset),
        };
    }
    path
}
