//! Engine error types.

use thiserror::Error;

/// Errors from job execution and scheduling.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Persistence failure.
    #[error("store error: {0}")]
    Database(#[from] tagflow_db::DatabaseError),

    /// Remote segment service failure.
    #[error("segment API error: {0}")]
    Segment(#[from] tagflow_segment::SegmentError),

    /// Recurrence computation failure.
    #[error("schedule error: {0}")]
    Schedule(#[from] tagflow_scheduler::ScheduleError),

    /// Job or schedule input failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] tagflow_core::TagflowError),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
