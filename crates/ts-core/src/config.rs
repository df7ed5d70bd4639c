//! Run configuration and kernel tunables.
//!
//! Typically loaded from a JSON file by the application crate (with the
//! `serde` feature) and passed to `SimBuilder`.  Every field has a default
//! so partial files work with `#[serde(default)]`.

/// Top-level simulation configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    /// Master RNG seed.  The same seed always produces identical results.
    pub seed: u64,

    /// Tick length used by `Sim::run_ticks`.  `Sim::advance` takes its own.
    pub tick_secs: f64,

    /// Ticks simulated by `Sim::run`.
    pub total_ticks: u64,

    /// Worker thread count passed to Rayon.  `None` uses all logical cores.
    pub num_threads: Option<usize>,

    /// Report a snapshot to observers every N ticks.  0 disables snapshots.
    pub output_interval_ticks: u64,

    /// Car-following, conflict, lane-change and routing constants.
    pub kernel: KernelConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed:                  42,
            tick_secs:             0.1,
            total_ticks:           3_000,
            num_threads:           None,
            output_interval_ticks: 10,
            kernel:                KernelConfig::default(),
        }
    }
}

/// Constants consulted by the per-tick kernel.
///
/// Distances are metres, times seconds, accelerations m/s².
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct KernelConfig {
    // ── Car following ─────────────────────────────────────────────────────
    /// How far ahead along the route a vehicle looks for obstacles.
    pub lookahead: f64,
    /// Step of the forward simulation used for time-to-distance estimates.
    pub idm_step: f64,
    /// Iteration cap of that forward simulation.
    pub idm_max_steps: u32,
    /// Hardest deceleration the kernel ever commands (positive number).
    pub max_braking: f64,
    /// Below this velocity a vehicle counts as stopped.
    pub stopped_velocity: f64,
    /// A stopped vehicle closer than this to a stop line is "at" it.
    pub stop_tolerance: f64,
    /// Relative spread used to randomise driver parameters around the class
    /// defaults (0.1 = ±10 %).
    pub parameter_spread: f64,

    // ── Lane-change discovery ─────────────────────────────────────────────
    /// Sampling step along an edge when casting lane-change probes.
    pub lane_change_step: f64,
    /// Length of each perpendicular probe (maximum lateral offset).
    pub lane_change_probe: f64,
    /// Maximum heading difference between the two edges, radians.
    pub lane_change_angle: f64,
    /// The merge point is advanced along the target by this multiple of the
    /// lateral offset.
    pub merge_advance_factor: f64,

    // ── Lane-change decisions (MOBIL) ─────────────────────────────────────
    /// Acceleration gain required for a voluntary change.
    pub lane_change_threshold: f64,
    /// Largest deceleration a lane change may impose on the new follower.
    pub lane_change_safe_decel: f64,
    /// Distance a vehicle drives before it may voluntarily return to the
    /// lane it just left.
    pub lane_change_cooldown: f64,

    // ── Conflicts ─────────────────────────────────────────────────────────
    /// Curves closer than this around a crossing block each other.
    pub conflict_proximity: f64,
    /// Step used when walking outward from a crossing.
    pub conflict_step: f64,
    /// Waiting distances never exceed this.
    pub max_waiting_distance: f64,
    /// Blocking windows are padded by this fraction of the reaction time.
    pub blocking_pad_fraction: f64,
    /// Waiting vehicles stop this far before the front waiting distance.
    pub conflict_stop_margin: f64,

    // ── Routing ───────────────────────────────────────────────────────────
    /// Flat cost added for each lane change.
    pub lane_change_penalty: f64,
    /// Lane-change intervals shorter than this double the penalty.
    pub short_interval: f64,
    /// Added when a lane change starts or ends next to a signal.
    pub signal_adjacent_penalty: f64,
    /// Cost per vehicle already on an edge, applied in the first hops only.
    pub congestion_penalty: f64,
    /// How many hops from the start the congestion penalty applies to.
    pub congestion_hops: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            lookahead:              120.0,
            idm_step:               0.1,
            idm_max_steps:          3_000,
            max_braking:            9.0,
            stopped_velocity:       0.1,
            stop_tolerance:         2.0,
            parameter_spread:       0.1,

            lane_change_step:       4.0,
            lane_change_probe:      6.0,
            lane_change_angle:      15f64.to_radians(),
            merge_advance_factor:   3.0,

            lane_change_threshold:  0.2,
            lane_change_safe_decel: 4.0,
            lane_change_cooldown:   80.0,

            conflict_proximity:     3.0,
            conflict_step:          0.25,
            max_waiting_distance:   30.0,
            blocking_pad_fraction:  0.5,
            conflict_stop_margin:   1.0,

            lane_change_penalty:    40.0,
            short_interval:         20.0,
            signal_adjacent_penalty: 60.0,
            congestion_penalty:     4.0,
            congestion_hops:        3,
        }
    }
}
