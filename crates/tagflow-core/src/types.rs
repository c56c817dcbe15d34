//! Shared types used across the Tagflow application.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::TagflowError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Newtype for job identifiers with validation.
///
/// Job IDs must be valid UUIDs (v4 format).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Create a new `JobId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is not a valid UUID v4.
    pub fn new(id: impl Into<String>) -> Result<Self, TagflowError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Create a new random `JobId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate that a string is a valid UUID v4.
    fn validate(id: &str) -> Result<(), TagflowError> {
        static UUID_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = UUID_REGEX.get_or_init(|| {
            Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
                .expect("valid regex")
        });

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(TagflowError::Validation(format!(
                "invalid job ID: must be a valid UUID v4, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for the owning user scope of jobs and schedules.
///
/// Owner IDs must be non-empty, at most 128 characters, with no whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(String);

impl OwnerId {
    /// Create a new `OwnerId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is empty, too long, or contains whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, TagflowError> {
        let id = id.into();
        if id.is_empty() || id.len() > 128 {
            return Err(TagflowError::Validation(format!(
                "invalid owner ID: must be 1-128 characters, got {} characters",
                id.len()
            )));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(TagflowError::Validation(format!(
                "invalid owner ID: must not contain whitespace, got '{id}'"
            )));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for remote segment identifiers.
///
/// The remote service assigns these; Tagflow only requires them to be
/// non-empty and free of whitespace so they can be embedded in URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentId(String);

impl SegmentId {
    /// Create a new `SegmentId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is empty or contains whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, TagflowError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TagflowError::Validation(
                "invalid segment ID: must not be empty".to_string(),
            ));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(TagflowError::Validation(format!(
                "invalid segment ID: must not contain whitespace, got '{id}'"
            )));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of bulk tag mutation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Add the job's tags to every segment member.
    AddTags,
    /// Remove the job's tags from every segment member.
    RemoveTags,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddTags => write!(f, "add_tags"),
            Self::RemoveTags => write!(f, "remove_tags"),
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = TagflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add_tags" => Ok(Self::AddTags),
            "remove_tags" => Ok(Self::RemoveTags),
            other => Err(TagflowError::Validation(format!(
                "unknown job kind '{other}'"
            ))),
        }
    }
}

/// Normalize a user-supplied tag list for a job or schedule template.
///
/// Tags are trimmed, empties dropped, and duplicates removed while
/// preserving first-seen order. The resulting list must be non-empty.
///
/// # Errors
/// Returns a validation error if no usable tags remain.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>, TagflowError> {
    let mut seen = std::collections::HashSet::new();
    let mut normalized = Vec::new();
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            normalized.push(trimmed.to_string());
        }
    }
    if normalized.is_empty() {
        return Err(TagflowError::Validation(
            "tag list must contain at least one non-empty tag".to_string(),
        ));
    }
    Ok(normalized)
}
