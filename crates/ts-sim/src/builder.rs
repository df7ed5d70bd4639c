//! Fluent builder for constructing a [`Sim`].

use ts_behavior::DriverModel;
use ts_core::{SimClock, SimConfig};
use ts_mobility::MobilityEngine;
use ts_spatial::{RoadNetwork, Router, SignalBoard, SignalSource};
use ts_vehicle::{VehicleRngs, VehicleStore, VehicleStoreBuilder};

use crate::{Sim, SimError, SimResult};

/// Fluent builder for [`Sim<D, R, S>`].
///
/// # Required inputs
///
/// - [`SimConfig`] — seed, tick length, total ticks, kernel constants, …
/// - [`RoadNetwork`] — built with the same `KernelConfig` as `config.kernel`
/// - `D: DriverModel` — the think-phase model (e.g. [`ts_behavior::TrafficDriver`])
/// - `R: Router` — the routing algorithm (e.g. [`ts_spatial::AStarRouter`])
///
/// # Optional inputs (have defaults)
///
/// | Method               | Default                                      |
/// |----------------------|----------------------------------------------|
/// | `.signals(s)`        | `SignalBoard::new()` (every signal green)    |
/// | `.vehicles(v, r)`    | Empty store, RNGs seeded from `config.seed`  |
///
/// # Example
///
/// ```rust,ignore
/// let driver = TrafficDriver::new(&config.kernel)?;
/// let mut sim = SimBuilder::new(config, network, driver, AStarRouter).build()?;
/// sim.insert_vehicle(VehicleClass::Car, entry, [exit])?;
/// sim.run(&mut NoopObserver)?;
/// ```
pub struct SimBuilder<D: DriverModel, R: Router, S: SignalSource = SignalBoard> {
    config:   SimConfig,
    network:  RoadNetwork,
    driver:   D,
    router:   R,
    signals:  S,
    vehicles: Option<(VehicleStore, VehicleRngs)>,
}

impl<D: DriverModel, R: Router> SimBuilder<D, R, SignalBoard> {
    /// Create a builder with all required inputs.
    pub fn new(config: SimConfig, network: RoadNetwork, driver: D, router: R) -> Self {
        Self {
            config,
            network,
            driver,
            router,
            signals:  SignalBoard::new(),
            vehicles: None,
        }
    }
}

impl<D: DriverModel, R: Router, S: SignalSource> SimBuilder<D, R, S> {
    /// Replace the signal source.
    pub fn signals<S2: SignalSource>(self, signals: S2) -> SimBuilder<D, R, S2> {
        SimBuilder {
            config:   self.config,
            network:  self.network,
            driver:   self.driver,
            router:   self.router,
            signals,
            vehicles: self.vehicles,
        }
    }

    /// Start from an existing vehicle population.
    ///
    /// Every vehicle must already be in its edge's occupancy in the supplied
    /// network, and `rngs` must cover every slot of `store`.
    pub fn vehicles(mut self, store: VehicleStore, rngs: VehicleRngs) -> Self {
        self.vehicles = Some((store, rngs));
        self
    }

    /// Validate inputs and return a ready-to-run [`Sim`].
    pub fn build(self) -> SimResult<Sim<D, R, S>> {
        // ── Validate configuration ────────────────────────────────────────
        if !(self.config.tick_secs.is_finite() && self.config.tick_secs > 0.0) {
            return Err(SimError::Config(format!(
                "tick_secs must be positive and finite, got {}",
                self.config.tick_secs
            )));
        }
        if self.network.kernel() != &self.config.kernel {
            return Err(SimError::Config(
                "network was built with different kernel constants than config.kernel".into(),
            ));
        }
        if self.config.num_threads == Some(0) {
            return Err(SimError::Config("num_threads must be at least 1".into()));
        }

        // ── Resolve the vehicle population ────────────────────────────────
        let (vehicles, rngs) = match self.vehicles {
            Some((store, rngs)) => {
                if rngs.len() < store.slot_count() {
                    return Err(SimError::VehicleCountMismatch {
                        expected: store.slot_count(),
                        got:      rngs.len(),
                        what:     "vehicle RNG table",
                    });
                }
                (store, rngs)
            }
            None => VehicleStoreBuilder::new(self.config.seed).build(),
        };

        #[cfg(feature = "parallel")]
        let pool = match self.config.num_threads {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| SimError::Config(format!("thread pool: {e}")))?,
            ),
            None => None,
        };

        log::info!(
            "built simulation: {} nodes, {} edges, {} vehicles, seed {}",
            self.network.node_count(),
            self.network.edge_count(),
            vehicles.len(),
            self.config.seed,
        );

        Ok(Sim {
            clock:    SimClock::new(),
            config:   self.config,
            network:  self.network,
            vehicles,
            rngs,
            driver:   self.driver,
            mobility: MobilityEngine::new(self.router),
            signals:  self.signals,
            events:   Vec::new(),
            #[cfg(feature = "parallel")]
            pool,
        })
    }
}
