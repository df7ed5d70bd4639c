//! Routing trait and default A* implementation.
//!
//! # Pluggability
//!
//! The vehicle kernel calls routing via the [`Router`] trait, so
//! applications can swap in other planners without touching the kernel.
//!
//! # Search
//!
//! Search states are graph nodes.  Each state is recorded as a
//! [`LinkedLineNode`] in an arena with a back-pointer to the state it was
//! reached from and the [`RouteSegment`] that got it there.  Expanding a
//! node generates, for every outgoing edge allowed for the vehicle class:
//!
//! 1. the edge itself, costing `length × speed factor` plus a congestion
//!    term per vehicle already on it (first `congestion_hops` hops only);
//! 2. every lane change out of that edge, costing the distance driven on
//!    the source up to the change point, the chord of the merge, the rest of
//!    the target edge and a flat penalty (doubled for short intervals, plus
//!    a penalty if either edge ends at a signal).
//!
//! The heuristic is the straight-line distance to the nearest destination.
//! Every cost is at least the straight-line distance it covers (speed
//! factors are ≥ 1), so the heuristic is consistent and the first
//! destination popped is optimal.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ts_core::{EdgeId, NodeId, Vec2, VehicleClass};

use crate::network::RoadNetwork;
use crate::route::{Route, RouteSegment};

// ── Request ───────────────────────────────────────────────────────────────────

/// Where a search starts.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RouteStart {
    /// On an edge at arc position `arc`: only that edge is expanded first.
    OnEdge { edge: EdgeId, arc: f64 },
    AtNode(NodeId),
}

#[derive(Clone, Debug)]
pub struct RouteRequest<'a> {
    pub start:        RouteStart,
    pub class:        VehicleClass,
    /// Any of these ends the search.
    pub destinations: &'a [NodeId],
}

// ── Router trait ──────────────────────────────────────────────────────────────

/// Pluggable routing engine.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync` so they can be shared across Rayon
/// worker threads during the parallel think phase.
pub trait Router: Send + Sync {
    /// Plan a route.  An empty route means no destination is reachable;
    /// starting `AtNode` on a destination also yields an empty route.
    fn route(&self, network: &RoadNetwork, request: &RouteRequest<'_>) -> Route;
}

// ── AStarRouter ───────────────────────────────────────────────────────────────

/// A* over the road graph with lane-change legs.  Penalties come from the
/// network's `KernelConfig`.
#[derive(Copy, Clone, Debug, Default)]
pub struct AStarRouter;

impl Router for AStarRouter {
    fn route(&self, network: &RoadNetwork, request: &RouteRequest<'_>) -> Route {
        Search::new(network, request).run()
    }
}

/// Search record: a node reached by a specific leg.
#[derive(Clone, Debug)]
pub struct LinkedLineNode {
    pub node:   NodeId,
    pub parent: Option<usize>,
    /// Leg that reached `node`; `None` for the root.
    pub via:    Option<RouteSegment>,
    /// Cumulative cost from the start.
    pub cost:   f64,
    /// Legs from the start.
    pub hops:   u32,
}

/// Open-list entry ordered as a min-heap on `f`, then node, then arena index.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Open {
    f:     f64,
    node:  NodeId,
    index: usize,
}

impl Eq for Open {}

impl Ord for Open {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.node.cmp(&self.node))
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for Open {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Search<'n, 'r> {
    net:        &'n RoadNetwork,
    request:    &'r RouteRequest<'r>,
    targets:    Vec<Vec2>,
    arena:      Vec<LinkedLineNode>,
    best:       Vec<f64>,
    best_index: Vec<usize>,
    closed:     Vec<bool>,
    open:       BinaryHeap<Open>,
}

impl<'n, 'r> Search<'n, 'r> {
    fn new(net: &'n RoadNetwork, request: &'r RouteRequest<'r>) -> Self {
        let n = net.node_count();
        Self {
            net,
            request,
            targets:    request.destinations.iter().map(|d| net.node(*d).position).collect(),
            arena:      Vec::new(),
            best:       vec![f64::INFINITY; n],
            best_index: vec![usize::MAX; n],
            closed:     vec![false; n],
            open:       BinaryHeap::new(),
        }
    }

    fn heuristic(&self, node: NodeId) -> f64 {
        let p = self.net.node(node).position;
        self.targets.iter().map(|t| t.distance(p)).fold(f64::INFINITY, f64::min)
    }

    fn is_destination(&self, node: NodeId) -> bool {
        self.request.destinations.contains(&node)
    }

    fn run(mut self) -> Route {
        if self.targets.is_empty() {
            return Route::new();
        }
        match self.request.start {
            RouteStart::AtNode(node) => {
                if self.is_destination(node) {
                    return Route::new();
                }
                let root = self.push_record(LinkedLineNode { node, parent: None, via: None, cost: 0.0, hops: 0 });
                self.best[node.index()] = 0.0;
                self.best_index[node.index()] = root;
                self.expand(root);
            }
            RouteStart::OnEdge { edge, arc } => {
                let from = self.net.edge(edge).from;
                let root = self.push_record(LinkedLineNode { node: from, parent: None, via: None, cost: 0.0, hops: 0 });
                self.expand_edge(edge, arc, root);
            }
        }

        while let Some(Open { node, index, .. }) = self.open.pop() {
            // Skip stale heap entries.
            if self.closed[node.index()] || self.best_index[node.index()] != index {
                continue;
            }
            self.closed[node.index()] = true;
            if self.is_destination(node) {
                return self.unwind(index);
            }
            self.expand(index);
        }
        Route::new()
    }

    fn push_record(&mut self, record: LinkedLineNode) -> usize {
        self.arena.push(record);
        self.arena.len() - 1
    }

    fn expand(&mut self, index: usize) {
        let net = self.net;
        for &edge in &net.node(self.arena[index].node).outgoing {
            self.expand_edge(edge, 0.0, index);
        }
    }

    fn congestion(&self, edge: EdgeId, hops: u32) -> f64 {
        let k = self.net.kernel();
        if hops < k.congestion_hops {
            self.net.edge(edge).occupancy.len() as f64 * k.congestion_penalty
        } else {
            0.0
        }
    }

    /// Generate the successors of entering `edge` at `entry_arc` from the
    /// record at `parent`.
    fn expand_edge(&mut self, edge: EdgeId, entry_arc: f64, parent: usize) {
        let net = self.net;
        let k = net.kernel();
        let e = net.edge(edge);
        if !e.allows(self.request.class) {
            return;
        }
        let hops = self.arena[parent].hops;
        let factor = net.speed_factor(edge);
        let congestion = self.congestion(edge, hops);

        let plain = (e.length() - entry_arc).max(0.0) * factor + congestion;
        self.relax(RouteSegment::plain(edge, e.to, plain), parent);

        for (&target_node, interval) in &e.lane_change_intervals {
            let target = net.edge(interval.target_edge);
            if !target.allows(self.request.class) {
                continue;
            }
            let Some(point) = e.lane_change_from(target.id, entry_arc) else {
                continue;
            };
            let along = (point.source_arc - entry_arc) * factor;
            let merge = e
                .curve
                .position_at_arclength(point.source_arc)
                .distance(target.curve.position_at_arclength(point.target_arc));
            let rest = (target.length() - point.target_arc) * net.speed_factor(target.id);
            let mut penalty = k.lane_change_penalty;
            if interval.len() < k.short_interval {
                penalty *= 2.0;
            }
            if net.node(e.to).signal || net.node(target.to).signal {
                penalty += k.signal_adjacent_penalty;
            }
            let cost = along + merge + rest + penalty + congestion + self.congestion(target.id, hops);
            self.relax(RouteSegment::lane_change(edge, target.id, target_node, cost), parent);
        }
    }

    fn relax(&mut self, via: RouteSegment, parent: usize) {
        let node = via.next_node;
        if self.closed[node.index()] {
            return;
        }
        let cost = self.arena[parent].cost + via.cost;
        if cost >= self.best[node.index()] {
            return;
        }
        let hops = self.arena[parent].hops + 1;
        let index = self.push_record(LinkedLineNode { node, parent: Some(parent), via: Some(via), cost, hops });
        self.best[node.index()] = cost;
        self.best_index[node.index()] = index;
        let f = cost + self.heuristic(node);
        self.open.push(Open { f, node, index });
    }

    fn unwind(&self, mut index: usize) -> Route {
        let mut legs = Vec::new();
        while let Some(via) = self.arena[index].via {
            legs.push(via);
            match self.arena[index].parent {
                Some(p) => index = p,
                None => break,
            }
        }
        let mut route = Route::new();
        for leg in legs.into_iter().rev() {
            route.push_back(leg);
        }
        route
    }
}
