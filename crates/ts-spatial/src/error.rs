//! Spatial-subsystem error type.

use thiserror::Error;

use ts_core::{EdgeId, NodeId};

/// Errors produced while building or editing a `RoadNetwork`.
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("node {0} not found in network")]
    UnknownNode(NodeId),

    #[error("edge {0} not found in network")]
    UnknownEdge(EdgeId),

    #[error("edge from {from} to {to} has zero length")]
    DegenerateEdge { from: NodeId, to: NodeId },

    #[error("edge would loop on node {0}")]
    SelfLoop(NodeId),

    #[error("edge {0} is occupied; remove its vehicles before editing geometry")]
    EdgeOccupied(EdgeId),

    #[error("invalid edge attributes: {0}")]
    InvalidEdge(String),
}

pub type SpatialResult<T> = Result<T, SpatialError>;
