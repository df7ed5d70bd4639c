//! Traffic-signal state as seen by the kernel.
//!
//! Signal phase schedules live outside the kernel.  The kernel only asks
//! whether a signalised node is red right now, through [`SignalSource`].

use std::collections::BTreeSet;

use ts_core::NodeId;

/// Read-only view of signal states.
///
/// `Send + Sync` so the think phase can consult it from Rayon workers.
pub trait SignalSource: Send + Sync {
    /// `true` if traffic must stop at `node` at simulated time `now`
    /// (seconds since the start of the run).
    fn is_red(&self, node: NodeId, now: f64) -> bool;
}

/// No signals anywhere: every node is green.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoSignals;

impl SignalSource for NoSignals {
    fn is_red(&self, _node: NodeId, _now: f64) -> bool {
        false
    }
}

/// Settable per-node red/green state, flipped by an external driver between
/// ticks.
#[derive(Clone, Debug, Default)]
pub struct SignalBoard {
    red: BTreeSet<NodeId>,
}

impl SignalBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_red(&mut self, node: NodeId, red: bool) {
        if red {
            self.red.insert(node);
        } else {
            self.red.remove(&node);
        }
    }

    /// Flip `node` and return its new state.
    pub fn toggle(&mut self, node: NodeId) -> bool {
        let red = !self.red.contains(&node);
        self.set_red(node, red);
        red
    }

    pub fn red_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.red.iter().copied()
    }
}

impl SignalSource for SignalBoard {
    fn is_red(&self, node: NodeId, _now: f64) -> bool {
        self.red.contains(&node)
    }
}
