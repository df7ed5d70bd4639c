//! Per-class default bodies and driver parameters.

use ts_core::{VehicleClass, VehicleId, VehicleRng};

use crate::{DriverParams, Vehicle};

/// Default MOBIL politeness for every class.
pub const DEFAULT_POLITENESS: f64 = 0.25;

/// Body dimensions and nominal driver parameters of a vehicle class.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassProfile {
    pub class:  VehicleClass,
    pub length: f64,
    pub width:  f64,
    pub params: DriverParams,
}

impl ClassProfile {
    pub fn for_class(class: VehicleClass) -> Self {
        let (length, width, a, b, s0, t) = match class {
            //                        len   width  a    b    s0   T
            VehicleClass::Car  => (4.5,  1.8,  1.5, 2.0, 2.0, 1.2),
            VehicleClass::Bus  => (12.0, 2.55, 1.0, 1.5, 2.5, 1.5),
            VehicleClass::Tram => (20.0, 2.65, 1.0, 1.3, 3.0, 1.5),
        };
        Self {
            class,
            length,
            width,
            params: DriverParams {
                max_acceleration:         a,
                comfortable_deceleration: b,
                min_gap:                  s0,
                reaction_time:            t,
                politeness:               DEFAULT_POLITENESS,
            },
        }
    }

    /// Draw per-instance driver parameters and a target-velocity multiplier,
    /// each within `±spread` of nominal.
    pub fn sample(&self, rng: &mut VehicleRng, spread: f64) -> (DriverParams, f64) {
        let p = &self.params;
        let params = DriverParams {
            max_acceleration:         rng.jitter(p.max_acceleration, spread),
            comfortable_deceleration: rng.jitter(p.comfortable_deceleration, spread),
            min_gap:                  rng.jitter(p.min_gap, spread),
            reaction_time:            rng.jitter(p.reaction_time, spread),
            politeness:               rng.jitter(p.politeness, spread),
        };
        let speed_factor = rng.jitter(1.0, spread);
        (params, speed_factor)
    }

    /// A fresh, unplaced vehicle of this class with randomised parameters.
    pub fn instantiate(&self, id: VehicleId, rng: &mut VehicleRng, spread: f64) -> Vehicle {
        let (params, speed_factor) = self.sample(rng, spread);
        Vehicle::new(id, self.class, self.length, self.width, params, speed_factor)
    }
}
