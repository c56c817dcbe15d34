//! Segment API error types.

use thiserror::Error;

/// Errors from the remote segment service.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// No API credentials are configured for the requesting scope.
    #[error("no credentials configured for owner '{0}'")]
    MissingCredentials(String),

    /// The remote service returned a non-success HTTP status.
    #[error("segment API error ({status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Response body, best effort
        message: String,
    },

    /// The remote service asked us to slow down.
    #[error("rate limited by segment API")]
    RateLimited,

    /// A response body could not be parsed.
    #[error("failed to parse segment API response: {0}")]
    ParseError(String),

    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Client construction or other internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for segment API operations.
pub type Result<T> = std::result::Result<T, SegmentError>;
