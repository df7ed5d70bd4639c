//! Planned routes.

use std::collections::VecDeque;

use ts_core::{EdgeId, NodeId};

/// One leg of a route.
///
/// A plain leg drives `edge` to its end at `next_node`.  A lane-change leg
/// drives part of `edge`, changes onto `target_edge` inside the edge's
/// lane-change interval and follows the target to `next_node`.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteSegment {
    pub edge:        EdgeId,
    pub next_node:   NodeId,
    pub lane_change: bool,
    pub target_edge: Option<EdgeId>,
    pub cost:        f64,
}

impl RouteSegment {
    pub fn plain(edge: EdgeId, next_node: NodeId, cost: f64) -> Self {
        Self { edge, next_node, lane_change: false, target_edge: None, cost }
    }

    pub fn lane_change(edge: EdgeId, target: EdgeId, next_node: NodeId, cost: f64) -> Self {
        Self { edge, next_node, lane_change: true, target_edge: Some(target), cost }
    }

    /// The edge whose end is `next_node`.
    #[inline]
    pub fn exit_edge(&self) -> EdgeId {
        self.target_edge.unwrap_or(self.edge)
    }
}

/// Ordered route with incrementally maintained totals.
///
/// An empty route means "no path" to the vehicle kernel.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    segments:          VecDeque<RouteSegment>,
    total_cost:        f64,
    lane_change_count: u32,
}

impl Route {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, segment: RouteSegment) {
        self.add(&segment);
        self.segments.push_back(segment);
    }

    pub fn push_front(&mut self, segment: RouteSegment) {
        self.add(&segment);
        self.segments.push_front(segment);
    }

    pub fn pop_front(&mut self) -> Option<RouteSegment> {
        let seg = self.segments.pop_front()?;
        if self.segments.is_empty() {
            self.total_cost = 0.0;
            self.lane_change_count = 0;
        } else {
            self.total_cost -= seg.cost;
            self.lane_change_count -= u32::from(seg.lane_change);
        }
        Some(seg)
    }

    fn add(&mut self, segment: &RouteSegment) {
        self.total_cost += segment.cost;
        self.lane_change_count += u32::from(segment.lane_change);
    }

    #[inline]
    pub fn front(&self) -> Option<&RouteSegment> {
        self.segments.front()
    }

    #[inline]
    pub fn get(&self, i: usize) -> Option<&RouteSegment> {
        self.segments.get(i)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteSegment> + '_ {
        self.segments.iter()
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    pub fn lane_change_count(&self) -> u32 {
        self.lane_change_count
    }

    /// Node the route ends at.
    pub fn last_node(&self) -> Option<NodeId> {
        self.segments.back().map(|s| s.next_node)
    }

    /// Every edge driven on, in order, lane-change targets included.
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.segments
            .iter()
            .flat_map(|s| std::iter::once(s.edge).chain(s.target_edge))
    }
}
