//! Vehicle insertion.

use ts_core::{EdgeId, NodeId, VehicleClass};

/// Where and what to insert.
///
/// `arc` defaults to the vehicle's own length, so the whole body starts on
/// the edge; it is capped to the edge length.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpawnOptions {
    pub class:        VehicleClass,
    pub edge:         EdgeId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub arc:          Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub velocity:     f64,
    pub destinations: Vec<NodeId>,
}

impl SpawnOptions {
    pub fn new(class: VehicleClass, edge: EdgeId, destinations: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            class,
            edge,
            arc: None,
            velocity: 0.0,
            destinations: destinations.into_iter().collect(),
        }
    }

    pub fn at_arc(mut self, arc: f64) -> Self {
        self.arc = Some(arc);
        self
    }

    pub fn velocity(mut self, velocity: f64) -> Self {
        self.velocity = velocity;
        self
    }
}
