use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("invalid recurrence: {0}")]
    InvalidRecurrence(String),

    #[error("no next occurrence computable for recurrence")]
    NoNextOccurrence,
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
