//! Intelligent Driver Model.
//!
//! ```text
//! a_idm = a · (1 − (v/v0)^4 − (s*/s)^2)
//! s*    = s0 + max(0, v·T + v·Δv / (2·sqrt(a·b)))
//! ```
//!
//! `Δv` is the closing speed (own minus leader).  Without an obstacle only
//! the free-road term applies.  The result is clamped to
//! `[-max_braking, a]` and the gap to a small positive floor so a touching or
//! overlapping obstacle yields full braking instead of a division by zero.

use ts_core::KernelConfig;
use ts_vehicle::DriverParams;

use crate::model::{CarFollowingModel, Obstacle};

/// Gaps below this are treated as this, metres.
const GAP_FLOOR: f64 = 0.01;

/// Desired speeds below this are treated as this, m/s.
const DESIRED_FLOOR: f64 = 0.1;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Idm {
    pub max_braking: f64,
    /// Forward-simulation step for [`time_to_cover`](CarFollowingModel::time_to_cover).
    pub step:        f64,
    pub max_steps:   u32,
}

impl Idm {
    pub fn new(config: &KernelConfig) -> Self {
        Self {
            max_braking: config.max_braking,
            step:        config.idm_step,
            max_steps:   config.idm_max_steps,
        }
    }

    /// Dynamic desired gap `s*`.
    pub fn desired_gap(driver: &DriverParams, velocity: f64, closing: f64) -> f64 {
        let a = driver.max_acceleration;
        let b = driver.comfortable_deceleration;
        let dynamic = velocity * driver.reaction_time + velocity * closing / (2.0 * (a * b).sqrt());
        driver.min_gap + dynamic.max(0.0)
    }

    /// Gap at which a driver at `velocity < desired` behind a vehicle moving
    /// at the same speed neither accelerates nor brakes.
    pub fn equilibrium_gap(driver: &DriverParams, velocity: f64, desired: f64) -> f64 {
        let free = 1.0 - (velocity / desired.max(DESIRED_FLOOR)).powi(4);
        Idm::desired_gap(driver, velocity, 0.0) / free.max(f64::EPSILON).sqrt()
    }
}

impl Default for Idm {
    fn default() -> Self {
        Idm::new(&KernelConfig::default())
    }
}

impl CarFollowingModel for Idm {
    fn acceleration(
        &self,
        driver:   &DriverParams,
        velocity: f64,
        desired:  f64,
        obstacle: Option<Obstacle>,
    ) -> f64 {
        let a = driver.max_acceleration;
        let free = 1.0 - (velocity / desired.max(DESIRED_FLOOR)).powi(4);
        let interaction = match obstacle {
            Some(o) => {
                let s_star = Idm::desired_gap(driver, velocity, velocity - o.velocity);
                let ratio = s_star / o.gap.max(GAP_FLOOR);
                ratio * ratio
            }
            None => 0.0,
        };
        (a * (free - interaction)).clamp(-self.max_braking, a)
    }

    fn time_to_cover(&self, driver: &DriverParams, velocity: f64, desired: f64, distance: f64) -> f64 {
        if distance <= 0.0 {
            return 0.0;
        }
        let mut v = velocity.max(0.0);
        let mut covered = 0.0;
        for i in 0..self.max_steps {
            let acc = self.acceleration(driver, v, desired, None);
            let next = (v + acc * self.step).max(0.0);
            let ds = 0.5 * (v + next) * self.step;
            if covered + ds >= distance {
                let fraction = if ds > 0.0 { (distance - covered) / ds } else { 1.0 };
                return (i as f64 + fraction) * self.step;
            }
            covered += ds;
            v = next;
        }
        f64::INFINITY
    }

    fn max_braking(&self) -> f64 {
        self.max_braking
    }
}
