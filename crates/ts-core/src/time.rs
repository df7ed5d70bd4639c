//! Simulation time model.
//!
//! # Design
//!
//! Two clocks run side by side:
//!
//! - `Tick` — a monotonically increasing integer counter.  Events and output
//!   rows are stamped with it, so ordering comparisons are exact.
//! - `elapsed_secs` — accumulated simulated seconds.  The car-following and
//!   conflict code needs continuous time (arrival estimates, blocking
//!   windows), and `Sim::advance` accepts a tick length per call, so the
//!   mapping from ticks to seconds is not required to be uniform.

use std::fmt;

// ── Tick ─────────────────────────────────────────────────────────────────────

/// Integer tick counter.  Tick `n` covers the simulated interval that starts
/// after `n` calls to `SimClock::advance`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// Ticks from `earlier` up to `self`; zero if `earlier` is later.
    #[inline]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    #[inline]
    pub fn next(self) -> Tick {
        self + 1
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    fn add(self, n: u64) -> Tick {
        Tick(self.0 + n)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── SimClock ──────────────────────────────────────────────────────────────────

/// The single logical clock of a simulation run.
///
/// Only `Sim::advance` moves it; everything else reads it.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimClock {
    /// The current tick.  Incremented once per `advance`.
    pub current_tick: Tick,
    /// Simulated seconds since tick 0.
    pub elapsed_secs: f64,
    /// Length of the most recent tick in seconds (0 before the first tick).
    pub last_tick_secs: f64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the current tick after `tick_secs` simulated seconds.
    #[inline]
    pub fn advance(&mut self, tick_secs: f64) {
        self.current_tick = self.current_tick.next();
        self.elapsed_secs += tick_secs;
        self.last_tick_secs = tick_secs;
    }

    /// Elapsed time as `(hours, minutes, seconds)`, seconds rounded to
    /// hundredths.
    pub fn elapsed_hms(&self) -> (u64, u32, f64) {
        let centis = (self.elapsed_secs.max(0.0) * 100.0).round() as u64;
        let whole_minutes = centis / 6_000;
        ((whole_minutes / 60), (whole_minutes % 60) as u32, (centis % 6_000) as f64 / 100.0)
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (h, m, s) = self.elapsed_hms();
        write!(f, "{} ({}:{:02}:{:05.2})", self.current_tick, h, m, s)
    }
}
