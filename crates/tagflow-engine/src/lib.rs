//! Tagflow Job Engine
//!
//! Coordinates the execution of bulk tag mutation jobs: admission with
//! bounded per-owner concurrency, ordered batch mutation with persisted
//! progress, hard timeouts, cooperative cancellation, crash resumption of
//! stale executions, and spawning of jobs from due schedules.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod mutation;
pub mod processor;
pub mod registry;
pub mod trigger;

pub use error::{EngineError, Result};
pub use mutation::{BatchMutator, MutationSummary, ProgressSink};
pub use processor::{HttpClientFactory, JobProcessor, ProcessorStats, SegmentClientFactory};
pub use registry::InFlightRegistry;
pub use trigger::spawn_due_jobs;
