//! The `Sim` struct and its tick loop.

use ts_behavior::{ApproachIndex, Decision, DriverModel, ThinkContext};
use ts_core::{EdgeId, NodeId, SimClock, SimConfig, Tick, VehicleClass, VehicleId};
use ts_mobility::{MobilityEngine, SpawnOptions, VehicleEvent};
use ts_spatial::{RoadNetwork, Router, SignalBoard, SignalSource};
use ts_vehicle::{VehicleRngs, VehicleStore};

use crate::telemetry::{EdgeTelemetry, VehicleTelemetry};
use crate::{SimError, SimEvent, SimObserver, SimResult, TickReport};

/// The main simulation runner.
///
/// `Sim<D, R, S>` holds all simulation state and drives the two-phase tick:
///
/// 1. **Think** (optionally parallel with the `parallel` feature): build the
///    approach index, then call [`DriverModel::think`] for every live
///    vehicle against one immutable [`ThinkContext`].
/// 2. **Move** (sequential, ascending `VehicleId`): hand the decisions to
///    [`MobilityEngine::apply`], which applies intents, integrates and
///    carries vehicles across edge ends.
///
/// Every vehicle event of the move phase is appended to the event log with
/// its tick; callers drain it with [`drain_events`](Self::drain_events).
///
/// Create via [`SimBuilder`][crate::SimBuilder].
pub struct Sim<D: DriverModel, R: Router, S: SignalSource = SignalBoard> {
    /// Global configuration (seed, tick length, total ticks, …).
    pub config: SimConfig,

    /// The single logical clock.  Only [`advance`](Self::advance) moves it.
    pub clock: SimClock,

    /// Road graph, occupancy and conflict registrations.
    pub network: RoadNetwork,

    /// Live vehicles.
    pub vehicles: VehicleStore,

    /// Per-slot deterministic RNGs, separated for the split-borrow pattern.
    pub rngs: VehicleRngs,

    /// The think-phase model.
    pub driver: D,

    /// Insertion and the move phase; owns the router.
    pub mobility: MobilityEngine<R>,

    /// Red/green state consulted during think.  Change it between ticks.
    pub signals: S,

    pub(crate) events: Vec<SimEvent>,

    #[cfg(feature = "parallel")]
    pub(crate) pool: Option<rayon::ThreadPool>,
}

impl<D: DriverModel, R: Router, S: SignalSource> Sim<D, R, S> {
    // ── Spawn ─────────────────────────────────────────────────────────────

    /// Insert a vehicle of `class` at the start of `edge`, at rest, heading
    /// for any of `destinations`.
    ///
    /// The route is planned on the vehicle's first think; a vehicle with no
    /// reachable destination is accepted here and removed on that think.
    pub fn insert_vehicle(
        &mut self,
        class:        VehicleClass,
        edge:         EdgeId,
        destinations: impl IntoIterator<Item = NodeId>,
    ) -> SimResult<VehicleId> {
        self.insert_vehicle_with(&SpawnOptions::new(class, edge, destinations))
    }

    /// Insert a vehicle with an explicit arc and initial velocity.
    pub fn insert_vehicle_with(&mut self, options: &SpawnOptions) -> SimResult<VehicleId> {
        let id = self
            .mobility
            .insert(&mut self.network, &mut self.vehicles, &mut self.rngs, options)
            .inspect_err(|e| log::debug!("insertion on {} rejected: {e}", options.edge))?;
        self.events.push(SimEvent {
            tick:  self.clock.current_tick,
            event: VehicleEvent::Spawned { vehicle: id, edge: options.edge },
        });
        Ok(id)
    }

    // ── Tick driver ───────────────────────────────────────────────────────

    /// Simulate one tick of `tick_secs` seconds.
    pub fn advance(&mut self, tick_secs: f64) -> SimResult<TickReport> {
        if !(tick_secs.is_finite() && tick_secs > 0.0) {
            return Err(SimError::Config(format!(
                "tick length must be positive and finite, got {tick_secs}"
            )));
        }
        let tick = self.clock.current_tick;

        // ── Phase 1: think (produce) ──────────────────────────────────────
        let decisions = self.think_all(tick_secs);
        let thought = decisions.len();

        // ── Phase 2: move (consume) ───────────────────────────────────────
        //
        // `apply` sorts by VehicleId, so the result does not depend on the
        // order the think phase finished in.
        let events = self.mobility.apply(
            &mut self.network,
            &mut self.vehicles,
            self.driver.car_following(),
            decisions,
            self.clock.elapsed_secs,
            tick_secs,
        );

        let mut report = TickReport { tick, thought, ..TickReport::default() };
        for event in events {
            match event {
                VehicleEvent::Arrived { .. } => report.arrived += 1,
                VehicleEvent::Died { .. }    => report.died += 1,
                _ => {}
            }
            self.events.push(SimEvent { tick, event });
        }
        report.live = self.vehicles.len();

        self.clock.advance(tick_secs);
        Ok(report)
    }

    /// Run from the current tick to `config.total_ticks` at
    /// `config.tick_secs`.
    ///
    /// Calls observer hooks at every tick boundary.  Use
    /// [`NoopObserver`][crate::NoopObserver] if you don't need callbacks.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<()> {
        let start = self.clock.current_tick;
        let remaining = self.config.total_ticks.saturating_sub(start.0);
        log::info!("running {remaining} ticks from {start}");
        self.run_ticks(remaining, observer)?;
        observer.on_sim_end(self.clock.current_tick);
        log::info!("finished at {} with {} vehicles live", self.clock, self.vehicles.len());
        Ok(())
    }

    /// Run exactly `n` ticks of `config.tick_secs` (ignores `total_ticks`).
    ///
    /// Useful for tests and incremental stepping.
    pub fn run_ticks<O: SimObserver>(&mut self, n: u64, observer: &mut O) -> SimResult<()> {
        let tick_secs = self.config.tick_secs;
        for _ in 0..n {
            let now = self.clock.current_tick;
            observer.on_tick_start(now);
            let report = self.advance(tick_secs)?;
            observer.on_tick_end(now, &report);
            if self.config.output_interval_ticks > 0
                && now.0.is_multiple_of(self.config.output_interval_ticks)
            {
                observer.on_snapshot(now, &self.vehicles, &self.network);
            }
        }
        Ok(())
    }

    // ── Event log ─────────────────────────────────────────────────────────

    /// Take every event logged since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Events logged since the last drain.
    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    // ── Telemetry ─────────────────────────────────────────────────────────

    pub fn now(&self) -> Tick {
        self.clock.current_tick
    }

    pub fn vehicle_telemetry(&self, id: VehicleId) -> Option<VehicleTelemetry> {
        self.vehicles.get(id).map(VehicleTelemetry::of)
    }

    /// Telemetry for every live vehicle in ascending `VehicleId` order.
    pub fn telemetry(&self) -> impl Iterator<Item = VehicleTelemetry> + '_ {
        self.vehicles.iter().map(VehicleTelemetry::of)
    }

    pub fn edge_telemetry(&self, edge: EdgeId) -> SimResult<EdgeTelemetry> {
        Ok(EdgeTelemetry::of(self.network.try_edge(edge)?))
    }

    /// Restart every edge's running average speed.
    pub fn reset_edge_speeds(&mut self) {
        self.network.reset_speed_stats();
    }

    // ── Think phase ───────────────────────────────────────────────────────

    /// Compute one decision per live vehicle.
    ///
    /// With the `parallel` Cargo feature the thinks run on Rayon's pool (or
    /// the configured one when `num_threads` is set).
    fn think_all(&mut self, tick_secs: f64) -> Vec<(VehicleId, Decision)> {
        let approaches = ApproachIndex::build(&self.network, &self.vehicles);

        // Explicit field borrows so the borrow checker sees disjoint access.
        let store  = &self.vehicles;
        let driver = &self.driver;
        let rngs   = &mut self.rngs;
        let ctx = ThinkContext::new(
            self.clock.elapsed_secs,
            tick_secs,
            &self.network,
            store,
            &self.signals,
            &self.mobility.router,
            &approaches,
        );

        #[cfg(not(feature = "parallel"))]
        {
            rngs.inner
                .iter_mut()
                .enumerate()
                .filter_map(|(slot, rng)| store.slot(slot).map(|v| (v.id, driver.think(v, &ctx, rng))))
                .collect()
        }

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            // Each slot's RNG is handed out exactly once by `par_iter_mut`.
            let think = |rngs: &mut VehicleRngs| -> Vec<(VehicleId, Decision)> {
                rngs.inner
                    .par_iter_mut()
                    .enumerate()
                    .filter_map(|(slot, rng)| store.slot(slot).map(|v| (v.id, driver.think(v, &ctx, rng))))
                    .collect()
            };
            match &self.pool {
                Some(pool) => pool.install(|| think(rngs)),
                None       => think(rngs),
            }
        }
    }
}
