//! Road graph: node and edge arenas, broad-phase index, graph editing.
//!
//! # Data layout
//!
//! Nodes and edges live in plain `Vec` arenas indexed by `NodeId` and
//! `EdgeId`.  Cross references are IDs only, so a network rebuilt from a
//! persisted description resolves every reference again without fix-ups.
//!
//! Each edge owns its [`Curve`].  The curve's control points are the two
//! node positions plus two *handles* relative to them; handles are copied
//! from the nodes' tangents on `connect` unless the caller supplies explicit
//! ones, and `split` stores the exact De Casteljau handles of each half.
//!
//! # Spatial index
//!
//! An R-tree (via `rstar`) holds every edge's bounding box.  Conflict and
//! lane-change discovery use it as the broad phase, so editing one edge only
//! re-examines its neighbourhood.
//!
//! # Derived data
//!
//! Intersections (see [`crate::conflict`]) and lane-change points (see
//! [`crate::lanes`]) are derived from geometry.  Every geometry edit
//! (`connect`, `split`, `set_node_geometry`) re-runs discovery for the
//! touched edges and their neighbours.

use std::collections::{BTreeMap, BTreeSet};

use rstar::{RTree, RTreeObject, AABB};

use ts_core::{
    Aabb, ClassMask, EdgeId, IntersectionId, KernelConfig, LayerMask, NodeId, Vec2, VehicleClass,
    VehicleId,
};

use crate::conflict::{self, ConflictIndex};
use crate::curve::Curve;
use crate::lanes::{self, LaneChangeInterval, LaneChangePoint};
use crate::{SpatialError, SpatialResult};

/// Edges shorter than this are rejected as degenerate.
pub const MIN_EDGE_LENGTH: f64 = 1e-3;

// ── R-tree edge entry ─────────────────────────────────────────────────────────

/// Entry stored in the R-tree: an edge's bounding box.
#[derive(Clone, Debug, PartialEq)]
struct EdgeEntry {
    envelope: AABB<[f64; 2]>,
    id:       EdgeId,
}

impl EdgeEntry {
    fn new(id: EdgeId, bbox: Aabb) -> Self {
        Self { envelope: envelope(bbox), id }
    }
}

impl RTreeObject for EdgeEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

#[inline]
fn envelope(bbox: Aabb) -> AABB<[f64; 2]> {
    AABB::from_corners([bbox.min.x, bbox.min.y], [bbox.max.x, bbox.max.y])
}

// ── Node ──────────────────────────────────────────────────────────────────────

/// Attributes of a node to be created.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeSpec {
    pub position:    Vec2,
    /// Handle of incoming edges, relative to `position` (points backwards).
    pub in_tangent:  Vec2,
    /// Handle of outgoing edges, relative to `position`.
    pub out_tangent: Vec2,
    pub stop_sign:   bool,
    /// The node carries a traffic signal whose state comes from a
    /// `SignalSource`.
    pub signal:      bool,
    pub layer:       LayerMask,
}

impl NodeSpec {
    /// Node at `position` with zero tangents (straight edges).
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            in_tangent:  Vec2::ZERO,
            out_tangent: Vec2::ZERO,
            stop_sign:   false,
            signal:      false,
            layer:       LayerMask::GROUND,
        }
    }

    /// Set symmetric tangents along `direction` with handle length `handle`.
    #[must_use]
    pub fn with_direction(mut self, direction: Vec2, handle: f64) -> Self {
        let d = direction.normalized().unwrap_or(Vec2::ZERO);
        self.in_tangent = -d * handle;
        self.out_tangent = d * handle;
        self
    }

    #[must_use]
    pub fn with_stop_sign(mut self) -> Self {
        self.stop_sign = true;
        self
    }

    #[must_use]
    pub fn with_signal(mut self) -> Self {
        self.signal = true;
        self
    }

    #[must_use]
    pub fn with_layer(mut self, layer: LayerMask) -> Self {
        self.layer = layer;
        self
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub id:          NodeId,
    pub position:    Vec2,
    pub in_tangent:  Vec2,
    pub out_tangent: Vec2,
    pub stop_sign:   bool,
    pub signal:      bool,
    pub layer:       LayerMask,
    pub incoming:    Vec<EdgeId>,
    pub outgoing:    Vec<EdgeId>,
}

// ── Edge ──────────────────────────────────────────────────────────────────────

/// Attributes of an edge to be created.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeSpec {
    /// Higher wins at conflicts.
    pub priority:        i32,
    pub classes:         ClassMask,
    /// Desired speed on this edge, m/s.
    pub target_velocity: f64,
    pub layer:           LayerMask,
    /// Explicit handles `[start, end]` relative to the endpoints.  `None`
    /// uses the nodes' tangents.
    pub handles:         Option<[Vec2; 2]>,
}

impl Default for EdgeSpec {
    fn default() -> Self {
        Self {
            priority:        1,
            classes:         ClassMask::ROAD,
            target_velocity: 13.9,
            layer:           LayerMask::GROUND,
            handles:         None,
        }
    }
}

impl EdgeSpec {
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn classes(mut self, classes: ClassMask) -> Self {
        self.classes = classes;
        self
    }

    #[must_use]
    pub fn target_velocity(mut self, v: f64) -> Self {
        self.target_velocity = v;
        self
    }

    #[must_use]
    pub fn layer(mut self, layer: LayerMask) -> Self {
        self.layer = layer;
        self
    }

    #[must_use]
    pub fn handles(mut self, start: Vec2, end: Vec2) -> Self {
        self.handles = Some([start, end]);
        self
    }

    fn validate(&self) -> SpatialResult<()> {
        if !(self.target_velocity.is_finite() && self.target_velocity > 0.0) {
            return Err(SpatialError::InvalidEdge(format!(
                "target velocity must be positive, got {}",
                self.target_velocity
            )));
        }
        if self.classes.is_empty() {
            return Err(SpatialError::InvalidEdge("edge admits no vehicle class".into()));
        }
        Ok(())
    }
}

/// Online mean of vehicle speeds observed on an edge.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SpeedStats {
    pub mean:    f64,
    pub samples: u64,
}

impl SpeedStats {
    #[inline]
    pub fn record(&mut self, speed: f64) {
        self.samples += 1;
        self.mean += (speed - self.mean) / self.samples as f64;
    }

    pub fn reset(&mut self) {
        *self = SpeedStats::default();
    }
}

/// A directed road segment.
#[derive(Clone, Debug)]
pub struct Edge {
    pub id:                    EdgeId,
    pub from:                  NodeId,
    pub to:                    NodeId,
    /// Control handles relative to the start and end point.
    pub handles:               [Vec2; 2],
    /// `true` when `handles` do not follow the nodes' tangents.
    pub explicit_handles:      bool,
    pub curve:                 Curve,
    pub priority:              i32,
    pub classes:               ClassMask,
    pub target_velocity:       f64,
    pub layer:                 LayerMask,
    /// Vehicles on this edge, ascending by front arc position.
    pub occupancy:             Vec<VehicleId>,
    /// Sorted by `source_arc`.
    pub lane_changes:          Vec<LaneChangePoint>,
    pub lane_change_intervals: BTreeMap<NodeId, LaneChangeInterval>,
    /// Intersections on this edge, ascending by arc position along it.
    pub intersections:         Vec<IntersectionId>,
    pub speed:                 SpeedStats,
}

impl Edge {
    #[inline]
    pub fn length(&self) -> f64 {
        self.curve.length()
    }

    #[inline]
    pub fn allows(&self, class: VehicleClass) -> bool {
        self.classes.allows(class)
    }

    /// Attributes that `split` carries over to both halves.
    pub fn spec(&self) -> EdgeSpec {
        EdgeSpec {
            priority:        self.priority,
            classes:         self.classes,
            target_velocity: self.target_velocity,
            layer:           self.layer,
            handles:         self.explicit_handles.then_some(self.handles),
        }
    }

    /// First lane-change point onto `target` at or after `arc`.
    pub fn lane_change_from(&self, target: EdgeId, arc: f64) -> Option<&LaneChangePoint> {
        self.lane_changes.iter().find(|p| p.target == target && p.source_arc >= arc)
    }

    /// Last lane-change point onto `target`.
    pub fn last_lane_change_to(&self, target: EdgeId) -> Option<&LaneChangePoint> {
        self.lane_changes.iter().rev().find(|p| p.target == target)
    }

    /// Insert `vehicle` keeping the occupancy ordered by front arc.
    pub fn insert_occupant(&mut self, vehicle: VehicleId, arc: f64, arc_of: impl Fn(VehicleId) -> f64) {
        let at = self.occupancy.partition_point(|v| arc_of(*v) < arc);
        self.occupancy.insert(at, vehicle);
    }

    pub fn remove_occupant(&mut self, vehicle: VehicleId) -> bool {
        match self.occupancy.iter().position(|v| *v == vehicle) {
            Some(i) => {
                self.occupancy.remove(i);
                true
            }
            None => false,
        }
    }
}

// ── RoadNetwork ───────────────────────────────────────────────────────────────

/// The road graph with its derived conflict and lane-change data.
///
/// Arenas are `pub` for direct indexed access on hot paths.  Build with
/// [`crate::RoadNetworkBuilder`] or incrementally with
/// [`add_node`](Self::add_node) and [`connect`](Self::connect).
#[derive(Clone, Debug)]
pub struct RoadNetwork {
    pub nodes:     Vec<Node>,
    pub edges:     Vec<Edge>,
    pub conflicts: ConflictIndex,
    kernel:              KernelConfig,
    edge_index:          RTree<EdgeEntry>,
    max_target_velocity: f64,
}

impl RoadNetwork {
    /// Empty network using `kernel` for discovery constants.
    pub fn new(kernel: KernelConfig) -> Self {
        Self {
            nodes:               Vec::new(),
            edges:               Vec::new(),
            conflicts:           ConflictIndex::new(),
            kernel,
            edge_index:          RTree::new(),
            max_target_velocity: 0.0,
        }
    }

    #[inline]
    pub fn kernel(&self) -> &KernelConfig {
        &self.kernel
    }

    // ── Dimensions and lookup ─────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    #[inline]
    pub fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        &mut self.edges[id.index()]
    }

    pub fn try_node(&self, id: NodeId) -> SpatialResult<&Node> {
        self.nodes.get(id.index()).ok_or(SpatialError::UnknownNode(id))
    }

    pub fn try_edge(&self, id: EdgeId) -> SpatialResult<&Edge> {
        self.edges.get(id.index()).ok_or(SpatialError::UnknownEdge(id))
    }

    /// Outgoing edges of `node`, in insertion order.
    #[inline]
    pub fn out_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.nodes[node.index()].outgoing.iter().copied()
    }

    #[inline]
    pub fn out_degree(&self, node: NodeId) -> usize {
        self.nodes[node.index()].outgoing.len()
    }

    /// Highest target velocity of any edge.
    pub fn max_target_velocity(&self) -> f64 {
        self.max_target_velocity
    }

    /// Router cost multiplier for `edge`: 1 on the fastest edges, larger on
    /// slower ones.
    #[inline]
    pub fn speed_factor(&self, edge: EdgeId) -> f64 {
        let e = &self.edges[edge.index()];
        (self.max_target_velocity / e.target_velocity).max(1.0)
    }

    /// Edges whose bounding boxes overlap `area`, ascending by ID.
    pub fn edges_near(&self, area: Aabb) -> Vec<EdgeId> {
        let env = envelope(area);
        let mut ids: Vec<EdgeId> = self
            .edge_index
            .locate_in_envelope_intersecting(&env)
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Zero the running speed averages of every edge.
    pub fn reset_speed_stats(&mut self) {
        for e in &mut self.edges {
            e.speed.reset();
        }
    }

    // ── Editing ───────────────────────────────────────────────────────────

    /// Add a node and return its `NodeId` (sequential from 0).
    pub fn add_node(&mut self, spec: NodeSpec) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            position:    spec.position,
            in_tangent:  spec.in_tangent,
            out_tangent: spec.out_tangent,
            stop_sign:   spec.stop_sign,
            signal:      spec.signal,
            layer:       spec.layer,
            incoming:    Vec::new(),
            outgoing:    Vec::new(),
        });
        id
    }

    /// Set the stop-sign and signal flags of an existing node.
    pub fn set_node_controls(&mut self, node: NodeId, stop_sign: bool, signal: bool) -> SpatialResult<()> {
        self.try_node(node)?;
        let n = &mut self.nodes[node.index()];
        n.stop_sign = stop_sign;
        n.signal = signal;
        Ok(())
    }

    /// Create a directed edge and run discovery around it.
    pub fn connect(&mut self, from: NodeId, to: NodeId, spec: EdgeSpec) -> SpatialResult<EdgeId> {
        let id = self.push_edge(from, to, &spec)?;
        let bbox = self.edges[id.index()].curve.bounding_box();
        self.edge_index.insert(EdgeEntry::new(id, bbox));
        self.rediscover(BTreeSet::from([id]));
        Ok(id)
    }

    /// Split `edge` at its arc-length midpoint.
    ///
    /// The first half keeps the original `EdgeId`; the second half gets a
    /// new one.  Both keep priority, class mask, target velocity and layer.
    /// Returns the new node.
    pub fn split(&mut self, edge: EdgeId) -> SpatialResult<NodeId> {
        let e = self.try_edge(edge)?;
        if !e.occupancy.is_empty() {
            return Err(SpatialError::EdgeOccupied(edge));
        }
        let t = e.curve.arclength_to_time(0.5 * e.length());
        let (left, right) = e.curve.bezier().subdivide(t);
        let old_to = e.to;
        let old_bbox = e.curve.bounding_box();
        let mut spec = e.spec();
        let mid = left.points[3];

        let node = self.add_node(NodeSpec {
            position:    mid,
            in_tangent:  left.points[2] - mid,
            out_tangent: right.points[1] - mid,
            stop_sign:   false,
            signal:      false,
            layer:       spec.layer,
        });

        {
            let first = &mut self.edges[edge.index()];
            first.to = node;
            first.handles = [left.points[1] - left.points[0], left.points[2] - left.points[3]];
            first.explicit_handles = true;
            first.curve = Curve::from_bezier(left);
        }
        self.edge_index.remove(&EdgeEntry::new(edge, old_bbox));
        self.edge_index.insert(EdgeEntry::new(edge, left.bounding_box()));

        spec.handles = Some([right.points[1] - right.points[0], right.points[2] - right.points[3]]);
        let second = self.push_edge(node, old_to, &spec)?;
        self.edges[second.index()].curve = Curve::from_bezier(right);
        {
            // `second` takes the slot `edge` held in old_to's incoming list.
            let incoming = &mut self.nodes[old_to.index()].incoming;
            incoming.pop();
            if let Some(slot) = incoming.iter_mut().find(|e| **e == edge) {
                *slot = second;
            }
        }
        self.nodes[node.index()].incoming.push(edge);
        self.edge_index.insert(EdgeEntry::new(second, right.bounding_box()));

        log::debug!("split {edge} at {mid}; second half is {second}");
        self.rediscover(BTreeSet::from([edge, second]));
        Ok(node)
    }

    /// Move a node and/or change its tangents, rebuilding adjacent curves.
    ///
    /// Edges with explicit handles keep them.  Fails without changing
    /// anything if an adjacent edge is occupied or would become degenerate.
    pub fn set_node_geometry(
        &mut self,
        node: NodeId,
        position: Vec2,
        in_tangent: Vec2,
        out_tangent: Vec2,
    ) -> SpatialResult<()> {
        let n = self.try_node(node)?;
        let adjacent: BTreeSet<EdgeId> = n.incoming.iter().chain(&n.outgoing).copied().collect();

        let mut rebuilt = Vec::with_capacity(adjacent.len());
        for &id in &adjacent {
            let e = &self.edges[id.index()];
            if !e.occupancy.is_empty() {
                return Err(SpatialError::EdgeOccupied(id));
            }
            let pos = |n: NodeId| if n == node { position } else { self.nodes[n.index()].position };
            let handles = if e.explicit_handles {
                e.handles
            } else {
                let h0 = if e.from == node { out_tangent } else { self.nodes[e.from.index()].out_tangent };
                let h1 = if e.to == node { in_tangent } else { self.nodes[e.to.index()].in_tangent };
                [h0, h1]
            };
            let curve = Curve::new(pos(e.from), handles[0], handles[1], pos(e.to));
            if curve.length() < MIN_EDGE_LENGTH {
                return Err(SpatialError::DegenerateEdge { from: e.from, to: e.to });
            }
            rebuilt.push((id, handles, curve));
        }

        let n = &mut self.nodes[node.index()];
        n.position = position;
        n.in_tangent = in_tangent;
        n.out_tangent = out_tangent;
        for (id, handles, curve) in rebuilt {
            let e = &mut self.edges[id.index()];
            let old = EdgeEntry::new(id, e.curve.bounding_box());
            e.handles = handles;
            e.curve = curve;
            let new = EdgeEntry::new(id, e.curve.bounding_box());
            self.edge_index.remove(&old);
            self.edge_index.insert(new);
        }
        self.rediscover(adjacent);
        Ok(())
    }

    // ── Internals shared with the builder ─────────────────────────────────

    /// Validate and append an edge; no index update, no discovery.
    pub(crate) fn push_edge(&mut self, from: NodeId, to: NodeId, spec: &EdgeSpec) -> SpatialResult<EdgeId> {
        self.try_node(from)?;
        self.try_node(to)?;
        if from == to {
            return Err(SpatialError::SelfLoop(from));
        }
        spec.validate()?;

        let handles = spec
            .handles
            .unwrap_or([self.nodes[from.index()].out_tangent, self.nodes[to.index()].in_tangent]);
        let curve = Curve::new(
            self.nodes[from.index()].position,
            handles[0],
            handles[1],
            self.nodes[to.index()].position,
        );
        if curve.length() < MIN_EDGE_LENGTH {
            return Err(SpatialError::DegenerateEdge { from, to });
        }

        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge {
            id,
            from,
            to,
            handles,
            explicit_handles: spec.handles.is_some(),
            curve,
            priority: spec.priority,
            classes: spec.classes,
            target_velocity: spec.target_velocity,
            layer: spec.layer,
            occupancy: Vec::new(),
            lane_changes: Vec::new(),
            lane_change_intervals: BTreeMap::new(),
            intersections: Vec::new(),
            speed: SpeedStats::default(),
        });
        self.nodes[from.index()].outgoing.push(id);
        self.nodes[to.index()].incoming.push(id);
        self.max_target_velocity = self.max_target_velocity.max(spec.target_velocity);
        Ok(id)
    }

    /// Bulk-load the R-tree from scratch.
    pub(crate) fn rebuild_index(&mut self) {
        let entries = self
            .edges
            .iter()
            .map(|e| EdgeEntry::new(e.id, e.curve.bounding_box()))
            .collect();
        self.edge_index = RTree::bulk_load(entries);
    }

    /// Re-run discovery for every edge.
    pub(crate) fn discover_all(&mut self) {
        let all = self.edges.iter().map(|e| e.id).collect();
        self.rediscover(all);
    }

    /// Recompute intersections touching `touched` and lane changes of
    /// `touched` plus every edge within probe range of them.
    fn rediscover(&mut self, touched: BTreeSet<EdgeId>) {
        self.conflicts.remove_touching(&touched);

        let mut found = Vec::new();
        for &a in &touched {
            let ea = &self.edges[a.index()];
            let area = ea.curve.bounding_box().inflated(conflict::CROSSING_TOLERANCE);
            for b in self.edges_near(area) {
                // Pairs inside `touched` are examined once, from the lower ID.
                if b == a || (touched.contains(&b) && b < a) {
                    continue;
                }
                let eb = &self.edges[b.index()];
                if !ea.layer.overlaps(eb.layer) {
                    continue;
                }
                found.extend(conflict::discover(ea, eb, &self.kernel));
            }
        }
        for x in found {
            self.conflicts.insert(x);
        }
        self.index_intersections();

        let reach = self.kernel.lane_change_probe * (1.0 + self.kernel.merge_advance_factor);
        let mut affected = touched.clone();
        for &a in &touched {
            affected.extend(self.edges_near(self.edges[a.index()].curve.bounding_box().inflated(reach)));
        }
        let mut results = Vec::with_capacity(affected.len());
        for &a in &affected {
            let src = &self.edges[a.index()];
            let area = src.curve.bounding_box().inflated(self.kernel.lane_change_probe);
            let candidates: Vec<&Edge> = self
                .edges_near(area)
                .into_iter()
                .map(|b| &self.edges[b.index()])
                .filter(|c| c.id != a && c.layer.overlaps(src.layer))
                .filter(|c| ![c.from, c.to].iter().any(|n| *n == src.from || *n == src.to))
                .collect();
            let points = lanes::discover(src, &candidates, &self.kernel);
            let intervals = lanes::intervals(&points, &self.edges);
            results.push((a, points, intervals));
        }
        for (a, points, intervals) in results {
            let e = &mut self.edges[a.index()];
            e.lane_changes = points;
            e.lane_change_intervals = intervals;
        }

        log::debug!(
            "discovery over {} edges: {} intersections live",
            touched.len(),
            self.conflicts.len()
        );
    }

    /// Rebuild every edge's intersection list, ascending by arc.
    fn index_intersections(&mut self) {
        let mut per_edge: Vec<Vec<(f64, IntersectionId)>> = vec![Vec::new(); self.edges.len()];
        for x in self.conflicts.iter() {
            for (i, e) in x.edges.iter().enumerate() {
                per_edge[e.index()].push((x.arcs[i], x.id));
            }
        }
        for (e, mut list) in self.edges.iter_mut().zip(per_edge) {
            list.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            e.intersections = list.into_iter().map(|(_, id)| id).collect();
        }
    }
}
