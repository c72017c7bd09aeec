use thiserror::Error;

use crate::client::ClientError;
use crate::collision::ValidationFailure;
use crate::executor::AggregateBatchError;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The provided schedule definition is malformed (bad time, weekday, …).
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// The proposed schedule collides with existing schedules. Raised before
    /// any client call is made.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationFailure),

    /// A whole client call failed (e.g. the batch-create request itself).
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// One or more per-site edit/delete calls failed after all were attempted.
    #[error("{0}")]
    Batch(#[from] AggregateBatchError),

    /// The aggregated snapshot could not be read or parsed.
    #[error("Snapshot unavailable: {0}")]
    Snapshot(String),

    #[error(transparent)]
    Core(#[from] fleetwise_core::FleetwiseError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
