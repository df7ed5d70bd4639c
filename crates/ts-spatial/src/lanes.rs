//! Lane-change discovery between roughly parallel edges.
//!
//! The source edge is walked at `lane_change_step`.  At each sample two
//! straight probes of length `lane_change_probe` are cast to the left and the
//! right of the direction of travel.  A candidate edge crossed by a probe
//! becomes a lane-change target at that sample when its direction at the hit
//! is within `lane_change_angle` of the source direction.  The merge point is
//! advanced along the target by `merge_advance_factor` times the lateral
//! offset, so the vehicle reaches the new lane at a sensible fore/aft
//! position instead of cutting across at a right angle.
//!
//! Points towards the same target edge are folded into one
//! [`LaneChangeInterval`], keyed by the node the target leads to; that is
//! what the router consumes.

use std::collections::BTreeMap;

use ts_core::{EdgeId, KernelConfig, NodeId};

use crate::curve::Curve;
use crate::network::Edge;

/// Probe hits closer than this to the source are overlapping geometry, not
/// a neighbouring lane.
const MIN_OFFSET: f64 = 0.1;

const PROBE_TOLERANCE: f64 = 0.02;

/// One sampled opportunity to change from the owning edge onto `target`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LaneChangePoint {
    /// Arc position on the source edge where the change starts.
    pub source_arc:     f64,
    pub target:         EdgeId,
    /// Arc position on the target directly beside the start point.
    pub target_hit_arc: f64,
    /// Arc position on the target where the merge completes.
    pub target_arc:     f64,
    /// Lateral distance between the two edges at the start point.
    pub offset:         f64,
}

/// Contiguous source-arc range from which `target_edge` can be reached.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LaneChangeInterval {
    pub target_edge: EdgeId,
    pub start:       f64,
    pub end:         f64,
}

impl LaneChangeInterval {
    #[inline]
    pub fn len(&self) -> f64 {
        self.end - self.start
    }

    #[inline]
    pub fn contains(&self, arc: f64) -> bool {
        arc >= self.start && arc <= self.end
    }
}

/// Sample lane-change points from `source` onto any of `candidates`.
///
/// The caller has already removed candidates sharing a node with `source`
/// or living on other layers.  Result is sorted by `source_arc`, then target.
pub(crate) fn discover(source: &Edge, candidates: &[&Edge], config: &KernelConfig) -> Vec<LaneChangePoint> {
    let mut points = Vec::new();
    if candidates.is_empty() {
        return points;
    }
    let curve = &source.curve;
    let len = curve.length();
    let step = config.lane_change_step.max(0.5);
    let probe_len = config.lane_change_probe;

    let mut s = step;
    while s < len {
        let p = curve.position_at_arclength(s);
        if let Some(dir) = curve.direction_at_arclength(s) {
            let normal = dir.perp();
            for sign in [1.0, -1.0] {
                let probe = Curve::straight(p, p + normal * (sign * probe_len));
                for target in candidates {
                    for hit in probe.intersections(&target.curve, PROBE_TOLERANCE) {
                        let offset = hit.t_self * probe_len;
                        if offset < MIN_OFFSET {
                            continue;
                        }
                        let target_hit_arc = target.curve.time_to_arclength(hit.t_other);
                        let Some(target_dir) = target.curve.direction_at_arclength(target_hit_arc) else {
                            continue;
                        };
                        if dir.angle_to(target_dir) > config.lane_change_angle {
                            continue;
                        }
                        let target_arc = target_hit_arc + config.merge_advance_factor * offset;
                        if target_arc >= target.curve.length() {
                            continue;
                        }
                        points.push(LaneChangePoint {
                            source_arc: s,
                            target: target.id,
                            target_hit_arc,
                            target_arc,
                            offset,
                        });
                    }
                }
            }
        }
        s += step;
    }

    points.sort_by(|a, b| a.source_arc.total_cmp(&b.source_arc).then(a.target.cmp(&b.target)));
    points.dedup_by(|a, b| a.target == b.target && (a.source_arc - b.source_arc).abs() < 1e-9);
    points
}

/// Fold points into one interval per reachable target node.
///
/// When two target edges lead to the same node the longer interval wins.
pub(crate) fn intervals(points: &[LaneChangePoint], edges: &[Edge]) -> BTreeMap<NodeId, LaneChangeInterval> {
    let mut per_target: BTreeMap<EdgeId, LaneChangeInterval> = BTreeMap::new();
    for p in points {
        per_target
            .entry(p.target)
            .and_modify(|iv| {
                iv.start = iv.start.min(p.source_arc);
                iv.end = iv.end.max(p.source_arc);
            })
            .or_insert(LaneChangeInterval { target_edge: p.target, start: p.source_arc, end: p.source_arc });
    }

    let mut by_node: BTreeMap<NodeId, LaneChangeInterval> = BTreeMap::new();
    for iv in per_target.into_values() {
        let node = edges[iv.target_edge.index()].to;
        match by_node.get(&node) {
            Some(existing) if existing.len() >= iv.len() => {}
            _ => {
                by_node.insert(node, iv);
            }
        }
    }
    by_node
}
