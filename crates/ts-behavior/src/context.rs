//! Read-only simulation state passed to every think.

use ts_core::{EdgeId, KernelConfig, VehicleId};
use ts_spatial::{RoadNetwork, Router, SignalSource};
use ts_vehicle::VehicleStore;

#[cfg(feature = "fx-hash")]
type ApproachMap = rustc_hash::FxHashMap<EdgeId, Vec<Approach>>;
#[cfg(not(feature = "fx-hash"))]
type ApproachMap = std::collections::HashMap<EdgeId, Vec<Approach>>;

// ── Approach index ────────────────────────────────────────────────────────────

/// A vehicle about to leave its edge for `next_edge`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Approach {
    pub vehicle:   VehicleId,
    pub from_edge: EdgeId,
    /// Distance from the vehicle's front to the end of `from_edge`.
    pub distance:  f64,
    pub velocity:  f64,
    pub length:    f64,
}

/// Vehicles within lookahead of a node, keyed by the edge they enter next.
///
/// Built once per tick before think so that converging-edge leaders are an
/// O(1) lookup instead of a scan of every incoming edge's occupancy.
#[derive(Clone, Debug, Default)]
pub struct ApproachIndex {
    by_next_edge: ApproachMap,
}

impl ApproachIndex {
    pub fn build(network: &RoadNetwork, vehicles: &VehicleStore) -> Self {
        let lookahead = network.kernel().lookahead;
        let mut by_next_edge = ApproachMap::default();
        for v in vehicles.iter() {
            let Some(front) = v.route.front() else { continue };
            if front.lane_change || front.edge != v.edge {
                continue;
            }
            let Some(next) = v.route.get(1) else { continue };
            let distance = network.edge(v.edge).length() - v.arc;
            if distance > lookahead {
                continue;
            }
            by_next_edge.entry(next.edge).or_default().push(Approach {
                vehicle:   v.id,
                from_edge: v.edge,
                distance,
                velocity:  v.velocity,
                length:    v.length,
            });
        }
        Self { by_next_edge }
    }

    /// Vehicles about to enter `edge`, in ascending `VehicleId` order.
    pub fn approaching(&self, edge: EdgeId) -> &[Approach] {
        self.by_next_edge.get(&edge).map_or(&[], Vec::as_slice)
    }
}

// ── ThinkContext ──────────────────────────────────────────────────────────────

/// A read-only snapshot of the simulation passed to every
/// [`DriverModel::think`][crate::DriverModel::think] call.
///
/// Built once per tick by ts-sim and shared across all thinks.  Nothing in
/// it may change until every think of the tick has returned.
pub struct ThinkContext<'a> {
    /// Simulated seconds elapsed at the start of this tick.
    pub now:        f64,
    /// Length of this tick, seconds.
    pub tick_secs:  f64,
    pub network:    &'a RoadNetwork,
    pub vehicles:   &'a VehicleStore,
    pub signals:    &'a dyn SignalSource,
    pub router:     &'a dyn Router,
    pub approaches: &'a ApproachIndex,
    pub config:     &'a KernelConfig,
}

impl<'a> ThinkContext<'a> {
    /// Build a context for one tick.  Kernel constants come from the network.
    #[inline]
    pub fn new(
        now:        f64,
        tick_secs:  f64,
        network:    &'a RoadNetwork,
        vehicles:   &'a VehicleStore,
        signals:    &'a dyn SignalSource,
        router:     &'a dyn Router,
        approaches: &'a ApproachIndex,
    ) -> Self {
        Self {
            now,
            tick_secs,
            network,
            vehicles,
            signals,
            router,
            approaches,
            config: network.kernel(),
        }
    }
}
