//! Errors shared by every `ts-*` crate.
//!
//! Sub-crates define their own enums and wrap `TsError` through `#[from]`.

use thiserror::Error;

use crate::VehicleId;

#[derive(Debug, Error, PartialEq)]
pub enum TsError {
    /// The ID's slot is empty or was reused by a later vehicle.
    #[error("{0} is not live")]
    VehicleNotFound(VehicleId),
}

pub type TsResult<T> = Result<T, TsError>;
