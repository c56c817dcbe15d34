//! Tagflow Core - Foundation crate for the Tagflow automation engine.
//!
//! This crate provides shared types, error handling, and configuration
//! management that all other Tagflow crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`JobId`, `OwnerId`, `SegmentId`, `JobKind`)
//!
//! # Example
//!
//! ```rust
//! use tagflow_core::{AppConfig, JobId, JobKind};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.processor.max_concurrent_jobs, 3);
//!
//! let id = JobId::generate();
//! assert_eq!(JobKind::AddTags.to_string(), "add_tags");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, ProcessorConfig, SegmentApiConfig};
pub use error::{ConfigError, ConfigResult, Result, TagflowError};
pub use types::{normalize_tags, JobId, JobKind, OwnerId, SegmentId};
