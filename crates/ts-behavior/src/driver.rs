//! The `DriverModel` trait: the think-phase extension point.

use ts_core::VehicleRng;
use ts_vehicle::Vehicle;

use crate::{CarFollowingModel, Decision, ThinkContext};

/// Pluggable per-tick vehicle logic.
///
/// # Thread safety
///
/// The simulation may call `think` for many vehicles in parallel via Rayon,
/// so implementations must be `Send + Sync`.  Per-vehicle state lives in the
/// [`Vehicle`] record, never in the model.
pub trait DriverModel: Send + Sync + 'static {
    /// Decide one vehicle's acceleration and deferred writes for this tick.
    ///
    /// Must read nothing but `vehicle`, `ctx` and `rng`.
    fn think(&self, vehicle: &Vehicle, ctx: &ThinkContext<'_>, rng: &mut VehicleRng) -> Decision;

    /// The longitudinal model, used by the move phase to refresh conflict
    /// registrations with the same arrival estimates think saw.
    fn car_following(&self) -> &dyn CarFollowingModel;
}
