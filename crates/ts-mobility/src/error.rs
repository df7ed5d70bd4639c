use ts_core::{EdgeId, VehicleClass};
use ts_spatial::SpatialError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MobilityError {
    #[error("{class:?} vehicles may not use {edge}")]
    ClassNotAllowed { class: VehicleClass, edge: EdgeId },

    #[error("no room on {edge}: gap {gap:.2} m, need {required:.2} m")]
    EntryBlocked { edge: EdgeId, gap: f64, required: f64 },

    #[error("invalid placement on {edge} at arc {arc}")]
    InvalidPlacement { edge: EdgeId, arc: f64 },

    #[error("vehicle has no destination")]
    NoDestination,

    #[error(transparent)]
    Spatial(#[from] SpatialError),
}

pub type MobilityResult<T> = Result<T, MobilityError>;
