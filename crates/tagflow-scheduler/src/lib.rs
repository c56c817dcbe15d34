pub mod definition;
pub mod engine;
pub mod error;

pub use definition::{Recurrence, ScheduleDefinition, TimeOfDay};
pub use engine::{next_occurrence, next_run};
pub use error::{Result, ScheduleError};
