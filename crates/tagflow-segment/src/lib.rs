//! Tagflow Segment API Client
//!
//! Talks to the remote customer service: resolving segment membership via
//! cursor pagination and reading/writing per-member tag sets. The engine
//! depends only on the [`SegmentApi`] trait, so tests substitute in-memory
//! fakes for the HTTP client.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod api;
pub mod client;
pub mod credentials;
pub mod error;

pub use api::{MemberId, SegmentApi};
pub use client::HttpSegmentClient;
pub use credentials::{CredentialStore, Credentials, InMemoryCredentialStore};
pub use error::{Result, SegmentError};
