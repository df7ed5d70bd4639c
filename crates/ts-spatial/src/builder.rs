//! Bulk construction of a [`RoadNetwork`].
//!
//! This is the persistence boundary: a loader that has reconstructed nodes
//! and edges feeds them here in ID order, and `build()` validates them,
//! bulk-loads the R-tree and runs conflict and lane-change discovery once
//! over the whole graph.  IDs handed out by the builder are the IDs of the
//! finished network.

use ts_core::{EdgeId, KernelConfig, NodeId};

use crate::network::{EdgeSpec, NodeSpec, RoadNetwork};
use crate::SpatialResult;

/// Construct a [`RoadNetwork`] incrementally, then call [`build`](Self::build).
///
/// # Example
///
/// ```
/// use ts_core::Vec2;
/// use ts_spatial::{EdgeSpec, NodeSpec, RoadNetworkBuilder};
///
/// let mut b = RoadNetworkBuilder::new();
/// let a = b.add_node(NodeSpec::at(Vec2::new(0.0, 0.0)));
/// let c = b.add_node(NodeSpec::at(Vec2::new(100.0, 0.0)));
/// b.add_edge(a, c, EdgeSpec::default());
/// let net = b.build().unwrap();
/// assert_eq!(net.edge_count(), 1);
/// assert!((net.edges[0].length() - 100.0).abs() < 1e-9);
/// ```
pub struct RoadNetworkBuilder {
    kernel: KernelConfig,
    nodes:  Vec<NodeSpec>,
    edges:  Vec<RawEdge>,
}

struct RawEdge {
    from: NodeId,
    to:   NodeId,
    spec: EdgeSpec,
}

impl RoadNetworkBuilder {
    pub fn new() -> Self {
        Self { kernel: KernelConfig::default(), nodes: Vec::new(), edges: Vec::new() }
    }

    /// Pre-allocate for the expected number of nodes and edges.
    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            kernel: KernelConfig::default(),
            nodes:  Vec::with_capacity(nodes),
            edges:  Vec::with_capacity(edges),
        }
    }

    /// Use `kernel` for discovery and router constants.
    #[must_use]
    pub fn kernel(mut self, kernel: KernelConfig) -> Self {
        self.kernel = kernel;
        self
    }

    /// Add a node and return its `NodeId` (sequential from 0).
    pub fn add_node(&mut self, spec: NodeSpec) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(spec);
        id
    }

    /// Add a directed edge and return its `EdgeId` (sequential from 0).
    ///
    /// Endpoints are checked in [`build`](Self::build).
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, spec: EdgeSpec) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(RawEdge { from, to, spec });
        id
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.edges.len() }

    /// Validate, index and run discovery.
    pub fn build(self) -> SpatialResult<RoadNetwork> {
        let mut net = RoadNetwork::new(self.kernel);
        for spec in self.nodes {
            net.add_node(spec);
        }
        for raw in &self.edges {
            net.push_edge(raw.from, raw.to, &raw.spec)?;
        }
        net.rebuild_index();
        net.discover_all();

        let lane_changes: usize = net.edges.iter().map(|e| e.lane_change_intervals.len()).sum();
        log::info!(
            "road network built: {} nodes, {} edges, {} intersections, {} lane-change intervals",
            net.node_count(),
            net.edge_count(),
            net.conflicts.len(),
            lane_changes
        );
        Ok(net)
    }
}

impl Default for RoadNetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}
