//! MOBIL lane-change decision.
//!
//! A voluntary change happens when
//!
//! ```text
//! a'_me − a_me > threshold + p · (a_new_follower − a'_new_follower)
//! ```
//!
//! and the new follower's acceleration after the change is no harsher than
//! `-safe_deceleration`.  Forced changes skip the incentive and keep only the
//! safety criterion.

use ts_core::KernelConfig;

/// Accelerations the MOBIL criterion compares.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MobilInput {
    /// Own acceleration staying in the current lane.
    pub current: f64,
    /// Own acceleration in the target lane.
    pub target:  f64,
    /// The target lane's follower before and after the change, if any.
    pub new_follower: Option<(f64, f64)>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Mobil {
    pub threshold:         f64,
    pub safe_deceleration: f64,
}

impl Mobil {
    pub fn new(config: &KernelConfig) -> Self {
        Self {
            threshold:         config.lane_change_threshold,
            safe_deceleration: config.lane_change_safe_decel,
        }
    }

    pub fn is_safe(&self, input: &MobilInput) -> bool {
        input.new_follower.is_none_or(|(_, after)| after >= -self.safe_deceleration)
    }

    /// Own gain minus the politeness-weighted loss of the new follower.
    pub fn incentive(&self, politeness: f64, input: &MobilInput) -> f64 {
        let loss = input.new_follower.map_or(0.0, |(before, after)| before - after);
        input.target - input.current - politeness * loss
    }

    pub fn should_change(&self, politeness: f64, input: &MobilInput) -> bool {
        self.is_safe(input) && self.incentive(politeness, input) > self.threshold
    }
}

impl Default for Mobil {
    fn default() -> Self {
        Mobil::new(&KernelConfig::default())
    }
}
