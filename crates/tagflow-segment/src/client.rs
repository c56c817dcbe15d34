//! HTTP client for the remote segment service.

use crate::api::{MemberId, SegmentApi};
use crate::credentials::Credentials;
use crate::error::{Result, SegmentError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tagflow_core::config::SegmentApiConfig;
use tagflow_core::SegmentId;
use tracing::{debug, warn};

/// Hard cap on the per-page member count accepted by the remote service.
const MAX_PAGE_SIZE: u32 = 250;

/// Retry attempts for transient failures, per request.
const MAX_RETRIES: u32 = 3;

/// Fixed backoff schedule between retries.
const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_millis(500),
    Duration::from_secs(1),
    Duration::from_secs(2),
];

/// `SegmentApi` implementation over the remote service's REST endpoints.
///
/// Member listing uses cursor pagination; a page whose body lacks the
/// expected shape is treated as exhaustion rather than an error, since the
/// service omits fields on the final page.
pub struct HttpSegmentClient {
    client: Client,
    base_url: String,
    api_token: String,
    page_size: u32,
}

impl HttpSegmentClient {
    /// Create a client for one owner's credentials.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: &SegmentApiConfig, credentials: &Credentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SegmentError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: credentials.api_token.clone(),
            page_size: config.page_size.min(MAX_PAGE_SIZE),
        })
    }

    /// Issue a GET with fixed-schedule retries on transient failures.
    ///
    /// Query parameters go through reqwest so opaque values (pagination
    /// cursors in particular) are percent-encoded.
    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            let outcome = self
                .client
                .get(url)
                .query(query)
                .bearer_auth(&self.api_token)
                .send()
                .await;

            match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if !is_transient(status) {
                        let message = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Unknown error".to_string());
                        return Err(SegmentError::ApiError {
                            status: status.as_u16(),
                            message,
                        });
                    }
                    last_error = Some(if status == StatusCode::TOO_MANY_REQUESTS {
                        SegmentError::RateLimited
                    } else {
                        SegmentError::ApiError {
                            status: status.as_u16(),
                            message: "transient server error".to_string(),
                        }
                    });
                }
                Err(e) => last_error = Some(SegmentError::Network(e)),
            }

            if attempt < MAX_RETRIES - 1 {
                let delay = RETRY_DELAYS[attempt as usize];
                warn!(
                    "Request to {} failed (attempt {}/{}), retrying in {:?}...",
                    url,
                    attempt + 1,
                    MAX_RETRIES,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| SegmentError::Internal("retry loop exhausted".to_string())))
    }
}

#[async_trait]
impl SegmentApi for HttpSegmentClient {
    async fn list_member_ids(&self, segment: &SegmentId, limit: usize) -> Result<Vec<MemberId>> {
        let url = format!("{}/segments/{}/members", self.base_url, segment);
        let mut members = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![("limit", self.page_size.to_string())];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let response = self.get_with_retry(&url, &query).await?;
            let page: MembersPage = response
                .json()
                .await
                .map_err(|e| SegmentError::ParseError(format!("invalid members page: {e}")))?;

            // The final page omits the members array and cursor
            let Some(batch) = page.members else {
                break;
            };
            if batch.is_empty() {
                break;
            }

            if absorb_page(&mut members, batch, limit) {
                debug!(
                    "Member listing for {} reached limit of {}, stopping",
                    segment, limit
                );
                return Ok(members);
            }

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!("Resolved {} members for segment {}", members.len(), segment);
        Ok(members)
    }

    async fn get_tags(&self, member: &MemberId) -> Result<Vec<String>> {
        let url = format!("{}/members/{}/tags", self.base_url, member);
        let response = self.get_with_retry(&url, &[]).await?;
        let body: TagsResponse = response
            .json()
            .await
            .map_err(|e| SegmentError::ParseError(format!("invalid tags response: {e}")))?;
        Ok(body.tags.unwrap_or_default())
    }

    async fn set_tags(&self, member: &MemberId, tags: &[String]) -> Result<()> {
        let url = format!("{}/members/{}/tags", self.base_url, member);
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.api_token)
            .json(&TagsRequest { tags })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SegmentError::ApiError {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Append a page of entries, stopping at `limit`. Returns true once full.
fn absorb_page(members: &mut Vec<MemberId>, batch: Vec<MemberEntry>, limit: usize) -> bool {
    for entry in batch {
        members.push(MemberId::new(entry.id));
        if members.len() >= limit {
            return true;
        }
    }
    false
}

// Segment service wire types

#[derive(Debug, Deserialize)]
struct MembersPage {
    members: Option<Vec<MemberEntry>>,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MemberEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct TagsRequest<'a> {
    tags: &'a [String],
}
