//! The `CarFollowingModel` trait: the acceleration law behind every think.

use ts_vehicle::DriverParams;

/// The nearest thing ahead the vehicle must not run into.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Obstacle {
    /// Distance from the vehicle's front to the obstacle's rear, metres.
    /// May be negative when bodies already overlap.
    pub gap:      f64,
    /// Obstacle speed along the vehicle's path.
    pub velocity: f64,
}

impl Obstacle {
    #[inline]
    pub fn vehicle(gap: f64, velocity: f64) -> Self {
        Self { gap, velocity }
    }

    /// A standing obstacle: stop line, blocked merge, waiting position.
    #[inline]
    pub fn stop_at(distance: f64) -> Self {
        Self { gap: distance, velocity: 0.0 }
    }
}

/// Pluggable longitudinal dynamics.
///
/// # Thread safety
///
/// Called from the think phase, which may run on Rayon workers, so
/// implementations must be `Send + Sync`.
pub trait CarFollowingModel: Send + Sync {
    /// Acceleration for a driver at `velocity` whose desired speed is
    /// `desired`, following `obstacle` (or on a free road when `None`).
    fn acceleration(
        &self,
        driver:   &DriverParams,
        velocity: f64,
        desired:  f64,
        obstacle: Option<Obstacle>,
    ) -> f64;

    /// Seconds needed to cover `distance` metres on a free road starting
    /// from `velocity`.  Infinite if the distance is never reached.
    fn time_to_cover(&self, driver: &DriverParams, velocity: f64, desired: f64, distance: f64) -> f64;

    /// Hardest deceleration the model will ever return, m/s² (positive).
    fn max_braking(&self) -> f64;
}
