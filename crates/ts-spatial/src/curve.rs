//! Cubic Bézier curves with a precomputed arc-length table.
//!
//! Every edge owns one [`Curve`].  Vehicles are positioned by arc length
//! (metres from the start of the edge); the table converts between arc
//! length and the curve parameter `t ∈ [0, 1]`.
//!
//! # Arc-length table
//!
//! The curve is sampled at `ARC_SEGMENTS + 1` equally spaced parameters and
//! the chord lengths are accumulated.  Both directions of the mapping are
//! piecewise linear over the same table, so they are exact inverses of each
//! other wherever the table is strictly increasing.
//!
//! # Subdivision queries
//!
//! Curve/curve intersection and point-on-curve both prune with control-polygon
//! bounding boxes and split with De Casteljau.  The recursion runs on an
//! explicit work stack whose depth is bounded by `log2(extent / tolerance)`
//! plus a small margin, so degenerate input (coincident curves, zero-length
//! handles) always terminates.

use ts_core::{Aabb, Vec2};

/// Number of segments in the arc-length table (33 samples).
pub const ARC_SEGMENTS: usize = 32;

/// Handles shorter than this fall back to the chord thirds.
const HANDLE_EPSILON: f64 = 1e-6;

/// Hard cap on subdivision depth whatever the tolerance.
const MAX_DEPTH: u32 = 48;

/// Hard cap on box pairs examined by one intersection query.
const MAX_PAIRS: usize = 200_000;

/// Hits closer than `tolerance * MERGE_FACTOR` belong to the same crossing.
const MERGE_FACTOR: f64 = 10.0;

fn depth_limit(extent: f64, tolerance: f64) -> u32 {
    if tolerance <= 0.0 || extent <= tolerance {
        return 4;
    }
    ((extent / tolerance).log2().ceil() as u32 + 4).min(MAX_DEPTH)
}

// ── CubicBezier ───────────────────────────────────────────────────────────────

/// Raw cubic Bézier segment given by four absolute control points.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CubicBezier {
    pub points: [Vec2; 4],
}

impl CubicBezier {
    pub fn new(points: [Vec2; 4]) -> Self {
        Self { points }
    }

    /// Straight segment with control points at the chord thirds.
    pub fn line(start: Vec2, end: Vec2) -> Self {
        let third = (end - start) * (1.0 / 3.0);
        Self::new([start, start + third, end - third, end])
    }

    #[inline]
    pub fn position(&self, t: f64) -> Vec2 {
        let [p0, p1, p2, p3] = self.points;
        let u = 1.0 - t;
        p0 * (u * u * u) + p1 * (3.0 * u * u * t) + p2 * (3.0 * u * t * t) + p3 * (t * t * t)
    }

    #[inline]
    pub fn derivative(&self, t: f64) -> Vec2 {
        let [p0, p1, p2, p3] = self.points;
        let u = 1.0 - t;
        (p1 - p0) * (3.0 * u * u) + (p2 - p1) * (6.0 * u * t) + (p3 - p2) * (3.0 * t * t)
    }

    /// Box around the control polygon; always contains the curve.
    #[inline]
    pub fn bounding_box(&self) -> Aabb {
        Aabb::from_points(self.points)
    }

    /// De Casteljau split at `t` into two exact sub-curves.
    pub fn subdivide(&self, t: f64) -> (CubicBezier, CubicBezier) {
        let [p0, p1, p2, p3] = self.points;
        let p01 = p0.lerp(p1, t);
        let p12 = p1.lerp(p2, t);
        let p23 = p2.lerp(p3, t);
        let p012 = p01.lerp(p12, t);
        let p123 = p12.lerp(p23, t);
        let mid = p012.lerp(p123, t);
        (
            CubicBezier::new([p0, p01, p012, mid]),
            CubicBezier::new([mid, p123, p23, p3]),
        )
    }
}

// ── Curve ─────────────────────────────────────────────────────────────────────

/// A crossing found by [`Curve::intersections`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CurveHit {
    /// Parameter on the curve the query was made on.
    pub t_self: f64,
    /// Parameter on the other curve.
    pub t_other: f64,
    pub position: Vec2,
}

/// Cubic Bézier plus its arc-length table and bounding box.
///
/// Immutable after construction; rebuild it when endpoints or handles move.
#[derive(Clone, Debug, PartialEq)]
pub struct Curve {
    bezier: CubicBezier,
    arc:    [f64; ARC_SEGMENTS + 1],
    bbox:   Aabb,
}

impl Curve {
    /// Build from endpoints and handles relative to them.
    ///
    /// `start_handle` is added to `start`, `end_handle` to `end`.  Handles
    /// shorter than a micrometre are replaced by the chord thirds so the
    /// end derivatives never vanish.
    pub fn new(start: Vec2, start_handle: Vec2, end_handle: Vec2, end: Vec2) -> Self {
        let chord = end - start;
        let h0 = if start_handle.length() < HANDLE_EPSILON { chord * (1.0 / 3.0) } else { start_handle };
        let h1 = if end_handle.length() < HANDLE_EPSILON { -chord * (1.0 / 3.0) } else { end_handle };
        Self::from_bezier(CubicBezier::new([start, start + h0, end + h1, end]))
    }

    pub fn straight(start: Vec2, end: Vec2) -> Self {
        Self::from_bezier(CubicBezier::line(start, end))
    }

    pub fn from_bezier(bezier: CubicBezier) -> Self {
        let mut arc = [0.0; ARC_SEGMENTS + 1];
        let mut prev = bezier.position(0.0);
        let mut acc = 0.0;
        for (i, slot) in arc.iter_mut().enumerate().skip(1) {
            let p = bezier.position(i as f64 / ARC_SEGMENTS as f64);
            acc += p.distance(prev);
            *slot = acc;
            prev = p;
        }
        Self { bezier, arc, bbox: bezier.bounding_box() }
    }

    #[inline]
    pub fn bezier(&self) -> &CubicBezier {
        &self.bezier
    }

    /// Total arc length in metres.
    #[inline]
    pub fn length(&self) -> f64 {
        self.arc[ARC_SEGMENTS]
    }

    #[inline]
    pub fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    #[inline]
    pub fn start(&self) -> Vec2 {
        self.bezier.points[0]
    }

    #[inline]
    pub fn end(&self) -> Vec2 {
        self.bezier.points[3]
    }

    /// Start handle relative to the start point.
    pub fn start_handle(&self) -> Vec2 {
        self.bezier.points[1] - self.bezier.points[0]
    }

    /// End handle relative to the end point.
    pub fn end_handle(&self) -> Vec2 {
        self.bezier.points[2] - self.bezier.points[3]
    }

    #[inline]
    pub fn position_at_time(&self, t: f64) -> Vec2 {
        self.bezier.position(t.clamp(0.0, 1.0))
    }

    #[inline]
    pub fn derivative_at_time(&self, t: f64) -> Vec2 {
        self.bezier.derivative(t.clamp(0.0, 1.0))
    }

    /// Arc length covered at parameter `t`.  O(1).
    pub fn time_to_arclength(&self, t: f64) -> f64 {
        let f = t.clamp(0.0, 1.0) * ARC_SEGMENTS as f64;
        let i = (f.floor() as usize).min(ARC_SEGMENTS - 1);
        let frac = f - i as f64;
        self.arc[i] + (self.arc[i + 1] - self.arc[i]) * frac
    }

    /// Parameter at arc length `s`.  O(log N).
    pub fn arclength_to_time(&self, s: f64) -> f64 {
        let s = s.clamp(0.0, self.length());
        let j = self.arc.partition_point(|&a| a < s);
        if j == 0 {
            return 0.0;
        }
        let j = j.min(ARC_SEGMENTS);
        let i = j - 1;
        let seg = self.arc[j] - self.arc[i];
        let frac = if seg > 0.0 { (s - self.arc[i]) / seg } else { 0.0 };
        (i as f64 + frac) / ARC_SEGMENTS as f64
    }

    #[inline]
    pub fn position_at_arclength(&self, s: f64) -> Vec2 {
        self.position_at_time(self.arclength_to_time(s))
    }

    /// Unit direction of travel at arc length `s`, or `None` where the
    /// derivative vanishes.
    #[inline]
    pub fn direction_at_arclength(&self, s: f64) -> Option<Vec2> {
        self.derivative_at_time(self.arclength_to_time(s)).normalized()
    }

    /// De Casteljau split at parameter `t`.
    pub fn subdivide(&self, t: f64) -> (Curve, Curve) {
        let (a, b) = self.bezier.subdivide(t.clamp(0.0, 1.0));
        (Curve::from_bezier(a), Curve::from_bezier(b))
    }

    /// Parameter of a point of this curve within `tolerance` of `p`.
    ///
    /// Returns the closest candidate found, or `None` if the curve never
    /// comes that close.
    pub fn find_point(&self, p: Vec2, tolerance: f64) -> Option<f64> {
        if !self.bbox.inflated(tolerance).contains(p) {
            return None;
        }
        let leaf = tolerance * 0.5;
        let max_depth = depth_limit(self.bbox.extent(), leaf);
        let mut best: Option<(f64, f64)> = None;
        let mut stack = vec![(self.bezier, 0.0_f64, 1.0_f64, 0_u32)];

        while let Some((b, t0, t1, depth)) = stack.pop() {
            let bb = b.bounding_box();
            if !bb.inflated(tolerance).contains(p) {
                continue;
            }
            let tm = 0.5 * (t0 + t1);
            if bb.extent() <= leaf || depth >= max_depth {
                let d = self.bezier.position(tm).distance(p);
                if d <= tolerance && best.is_none_or(|(bd, _)| d < bd) {
                    best = Some((d, tm));
                }
                continue;
            }
            let (l, r) = b.subdivide(0.5);
            stack.push((r, tm, t1, depth + 1));
            stack.push((l, t0, tm, depth + 1));
        }
        best.map(|(_, t)| t)
    }

    /// `true` if some point of the curve lies within `distance` of `p`.
    #[inline]
    pub fn is_near(&self, p: Vec2, distance: f64) -> bool {
        self.find_point(p, distance).is_some()
    }

    /// All crossings with `other`, ordered by `t_self`.
    ///
    /// Leaf box pairs smaller than `tolerance` report a crossing at their
    /// mid-parameters; hits within `tolerance * 10` of each other are merged
    /// by averaging their parameters.
    pub fn intersections(&self, other: &Curve, tolerance: f64) -> Vec<CurveHit> {
        if !self.bbox.overlaps(&other.bbox) {
            return Vec::new();
        }
        let max_depth = depth_limit(self.bbox.extent().max(other.bbox.extent()), tolerance);
        let mut raw: Vec<(f64, f64)> = Vec::new();
        let mut stack = vec![Pair {
            a: self.bezier,
            a_range: (0.0, 1.0),
            b: other.bezier,
            b_range: (0.0, 1.0),
            depth: 0,
        }];
        let mut examined = 0usize;

        while let Some(pair) = stack.pop() {
            examined += 1;
            if examined > MAX_PAIRS {
                break;
            }
            let ba = pair.a.bounding_box();
            let bb = pair.b.bounding_box();
            if !ba.overlaps(&bb) {
                continue;
            }
            let big_a = ba.extent() > tolerance;
            let big_b = bb.extent() > tolerance;
            if (!big_a && !big_b) || pair.depth >= max_depth {
                raw.push((mid(pair.a_range), mid(pair.b_range)));
                continue;
            }
            let depth = pair.depth + 1;
            if big_a && big_b {
                let (a0, a1) = split(pair.a, pair.a_range);
                let (b0, b1) = split(pair.b, pair.b_range);
                for a in [a1, a0] {
                    for b in [b1, b0] {
                        stack.push(Pair { a: a.0, a_range: a.1, b: b.0, b_range: b.1, depth });
                    }
                }
            } else if ba.extent() >= bb.extent() {
                let (a0, a1) = split(pair.a, pair.a_range);
                for a in [a1, a0] {
                    stack.push(Pair { a: a.0, a_range: a.1, b: pair.b, b_range: pair.b_range, depth });
                }
            } else {
                let (b0, b1) = split(pair.b, pair.b_range);
                for b in [b1, b0] {
                    stack.push(Pair { a: pair.a, a_range: pair.a_range, b: b.0, b_range: b.1, depth });
                }
            }
        }

        self.merge_hits(raw, tolerance * MERGE_FACTOR)
    }

    /// Chain raw hits sorted by `t_self`; a hit joins the current cluster
    /// when it lies within `merge` of the cluster's last member.
    fn merge_hits(&self, mut raw: Vec<(f64, f64)>, merge: f64) -> Vec<CurveHit> {
        raw.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.total_cmp(&y.1)));
        let mut hits = Vec::new();
        let mut cluster: Vec<(f64, f64)> = Vec::new();
        let mut last = Vec2::ZERO;

        for (ta, tb) in raw {
            let p = self.bezier.position(ta);
            if !cluster.is_empty() && p.distance(last) > merge {
                hits.push(self.average(&cluster));
                cluster.clear();
            }
            cluster.push((ta, tb));
            last = p;
        }
        if !cluster.is_empty() {
            hits.push(self.average(&cluster));
        }
        hits
    }

    fn average(&self, cluster: &[(f64, f64)]) -> CurveHit {
        let n = cluster.len() as f64;
        let t_self = cluster.iter().map(|c| c.0).sum::<f64>() / n;
        let t_other = cluster.iter().map(|c| c.1).sum::<f64>() / n;
        CurveHit { t_self, t_other, position: self.bezier.position(t_self) }
    }
}

struct Pair {
    a:       CubicBezier,
    a_range: (f64, f64),
    b:       CubicBezier,
    b_range: (f64, f64),
    depth:   u32,
}

#[inline]
fn mid(range: (f64, f64)) -> f64 {
    0.5 * (range.0 + range.1)
}

type Piece = (CubicBezier, (f64, f64));

fn split(b: CubicBezier, range: (f64, f64)) -> (Piece, Piece) {
    let (l, r) = b.subdivide(0.5);
    let m = mid(range);
    ((l, (range.0, m)), (r, (m, range.1)))
}
