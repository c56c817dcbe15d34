//! Abstract segment API surface.
//!
//! The engine talks to the remote service exclusively through [`SegmentApi`],
//! so executions can be driven against an in-memory fake in tests.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tagflow_core::SegmentId;

/// Opaque identifier of a customer record in the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberId(String);

impl MemberId {
    /// Wrap a remote member identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operations the engine needs from the remote customer service.
#[async_trait]
pub trait SegmentApi: Send + Sync {
    /// Resolve the member ids of a segment, up to `limit` members.
    ///
    /// Implementations page through the segment until exhaustion or the
    /// limit, whichever comes first.
    async fn list_member_ids(&self, segment: &SegmentId, limit: usize) -> Result<Vec<MemberId>>;

    /// Read the current tags of one member.
    async fn get_tags(&self, member: &MemberId) -> Result<Vec<String>>;

    /// Replace the full tag set of one member.
    async fn set_tags(&self, member: &MemberId, tags: &[String]) -> Result<()>;
}
