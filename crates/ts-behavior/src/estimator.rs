//! Arrival estimates for conflict registrations.

use ts_spatial::ArrivalEstimator;
use ts_vehicle::Vehicle;

use crate::model::CarFollowingModel;

/// A vehicle's current state seen through its car-following model.
pub struct VehicleEstimator<'a> {
    model:   &'a dyn CarFollowingModel,
    vehicle: &'a Vehicle,
    desired: f64,
}

impl<'a> VehicleEstimator<'a> {
    pub fn new(model: &'a dyn CarFollowingModel, vehicle: &'a Vehicle, desired: f64) -> Self {
        Self { model, vehicle, desired }
    }
}

impl ArrivalEstimator for VehicleEstimator<'_> {
    fn time_to_cover(&self, distance: f64) -> f64 {
        self.model.time_to_cover(&self.vehicle.params, self.vehicle.velocity, self.desired, distance)
    }

    fn reaction_time(&self) -> f64 {
        self.vehicle.params.reaction_time
    }

    fn length(&self) -> f64 {
        self.vehicle.length
    }
}
