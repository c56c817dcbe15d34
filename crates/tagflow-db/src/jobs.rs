//! Job store: durable records of bulk tag mutation executions.
//!
//! This module provides CRUD operations for the `jobs` table. A job is
//! created `queued`, moves through the lifecycle state machine
//! (`queued/paused -> running -> completed/failed/cancelled`), and once
//! terminal can no longer be mutated.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};
use std::fmt;
use tagflow_core::{normalize_tags, JobId, JobKind, OwnerId, SegmentId, TagflowError};

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a processor slot
    Queued,
    /// Currently executing
    Running,
    /// Explicitly paused; re-enters the eligible pool like `Queued`
    Paused,
    /// Finished with an empty error list
    Completed,
    /// Finished with errors, or aborted by an execution failure
    Failed,
    /// Stopped by explicit cancellation or timeout
    Cancelled,
}

impl JobStatus {
    /// Whether this status permits no further mutation.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DatabaseError::Decode(format!("unknown job status '{other}'"))),
        }
    }
}

/// Progress counters persisted after every batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Members handled so far (mutated or confirmed no-op)
    pub current: u32,
    /// Total members in the segment; 0 until the member list resolves
    pub total: u32,
    /// Members skipped due to per-member errors
    pub skipped: u32,
    /// Human-readable status line
    pub message: String,
}

impl JobProgress {
    /// Progress value persisted when an execution starts.
    #[must_use]
    pub fn started() -> Self {
        Self {
            message: "Job started".to_string(),
            ..Self::default()
        }
    }
}

/// Final outcome, present only on terminal jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// True when every member finished without a per-member error;
    /// informational entries in `errors` do not negate success
    pub success: bool,
    /// Members mutated or confirmed unchanged
    pub processed_count: u32,
    /// Members skipped due to per-member errors
    pub skipped_count: u32,
    /// Per-member error strings plus informational entries
    pub errors: Vec<String>,
}

/// One bulk tag mutation execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier, immutable
    pub id: JobId,
    /// Owning user scope
    pub owner: OwnerId,
    /// Mutation kind
    pub kind: JobKind,
    /// Lifecycle status
    pub status: JobStatus,
    /// Target segment
    pub segment_id: SegmentId,
    /// Display cache of the segment name, not authoritative
    pub segment_name: String,
    /// Tags to add or remove; non-empty, order-preserving
    pub tags: Vec<String>,
    /// Progress counters
    pub progress: JobProgress,
    /// Final outcome, terminal states only
    pub result: Option<JobResult>,
    /// Cooperative cancellation flag, settable independent of status
    pub cancel_requested: bool,
    /// When the job record was created
    pub started_at: DateTime<Utc>,
    /// When the job reached a terminal state
    pub ended_at: Option<DateTime<Utc>>,
    /// Liveness signal used for stale-job detection
    pub last_updated_at: DateTime<Utc>,
}

/// Validated input for creating a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    owner: OwnerId,
    kind: JobKind,
    segment_id: SegmentId,
    segment_name: String,
    tags: Vec<String>,
}

impl NewJob {
    /// Build a new job input, normalizing and validating the tag list.
    ///
    /// # Errors
    /// Returns a validation error if no usable tags remain after trimming.
    pub fn new(
        owner: OwnerId,
        kind: JobKind,
        segment_id: SegmentId,
        segment_name: impl Into<String>,
        tags: &[String],
    ) -> std::result::Result<Self, TagflowError> {
        Ok(Self {
            owner,
            kind,
            segment_id,
            segment_name: segment_name.into(),
            tags: normalize_tags(tags)?,
        })
    }
}

/// Create a new job with status `queued`.
pub async fn create(pool: &Pool<Sqlite>, new_job: NewJob) -> Result<Job> {
    let id = JobId::generate();
    let now = Utc::now();
    let tags_json = serde_json::to_string(&new_job.tags)
        .map_err(|e| DatabaseError::Decode(format!("failed to encode tags: {e}")))?;

    sqlx::query(
        "INSERT INTO jobs (id, owner, kind, status, segment_id, segment_name, tags,
                           progress_message, started_at, last_updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.as_str())
    .bind(new_job.owner.as_str())
    .bind(new_job.kind.to_string())
    .bind(JobStatus::Queued.to_string())
    .bind(new_job.segment_id.as_str())
    .bind(&new_job.segment_name)
    .bind(&tags_json)
    .bind("")
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(Job {
        id,
        owner: new_job.owner,
        kind: new_job.kind,
        status: JobStatus::Queued,
        segment_id: new_job.segment_id,
        segment_name: new_job.segment_name,
        tags: new_job.tags,
        progress: JobProgress::default(),
        result: None,
        cancel_requested: false,
        started_at: now,
        ended_at: None,
        last_updated_at: now,
    })
}

const JOB_COLUMNS: &str = "id, owner, kind, status, segment_id, segment_name, tags,
    progress_current, progress_total, progress_skipped, progress_message,
    result, cancel_requested, started_at, ended_at, last_updated_at";

/// Get one job by owner and id.
pub async fn get(pool: &Pool<Sqlite>, owner: &OwnerId, id: &JobId) -> Result<Option<Job>> {
    let row = sqlx::query(&format!(
        "SELECT {JOB_COLUMNS} FROM jobs WHERE owner = ? AND id = ?"
    ))
    .bind(owner.as_str())
    .bind(id.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(parse_job_row).transpose()
}

/// List all jobs for an owner, newest first.
pub async fn list_by_owner(pool: &Pool<Sqlite>, owner: &OwnerId) -> Result<Vec<Job>> {
    let rows = sqlx::query(&format!(
        "SELECT {JOB_COLUMNS} FROM jobs WHERE owner = ? ORDER BY started_at DESC"
    ))
    .bind(owner.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(parse_job_row).collect()
}

/// List jobs currently marked `running` for an owner.
pub async fn list_active(pool: &Pool<Sqlite>, owner: &OwnerId) -> Result<Vec<Job>> {
    let rows = sqlx::query(&format!(
        "SELECT {JOB_COLUMNS} FROM jobs WHERE owner = ? AND status = 'running'
         ORDER BY started_at ASC"
    ))
    .bind(owner.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(parse_job_row).collect()
}

/// List jobs eligible for execution, oldest first.
///
/// Eligible jobs are `queued` or `paused`, plus `running` jobs whose
/// `last_updated_at` predates `stale_before` — those are presumed orphaned
/// by a crashed execution and re-admitted for at-least-once resumption.
pub async fn list_eligible(
    pool: &Pool<Sqlite>,
    owner: &OwnerId,
    stale_before: DateTime<Utc>,
) -> Result<Vec<Job>> {
    let rows = sqlx::query(&format!(
        "SELECT {JOB_COLUMNS} FROM jobs
         WHERE owner = ?
           AND (status IN ('queued', 'paused')
                OR (status = 'running' AND last_updated_at < ?))
         ORDER BY started_at ASC"
    ))
    .bind(owner.as_str())
    .bind(stale_before.to_rfc3339())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(parse_job_row).collect()
}

/// Transition a job to `running`, resetting its progress.
///
/// Applies to `queued`, `paused`, and (stale) `running` jobs; refuses
/// terminal jobs.
pub async fn mark_running(pool: &Pool<Sqlite>, owner: &OwnerId, id: &JobId) -> Result<()> {
    let progress = JobProgress::started();
    let updated = sqlx::query(
        "UPDATE jobs
         SET status = 'running',
             progress_current = ?, progress_total = ?, progress_skipped = ?,
             progress_message = ?, last_updated_at = ?
         WHERE owner = ? AND id = ?
           AND status IN ('queued', 'paused', 'running')",
    )
    .bind(progress.current)
    .bind(progress.total)
    .bind(progress.skipped)
    .bind(&progress.message)
    .bind(Utc::now().to_rfc3339())
    .bind(owner.as_str())
    .bind(id.as_str())
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(not_runnable(pool, owner, id).await);
    }
    Ok(())
}

/// Persist a progress checkpoint and refresh the liveness timestamp.
///
/// Returns the job's current `cancel_requested` flag so the executor can
/// observe externally requested cancellation at the same checkpoint.
pub async fn update_progress(
    pool: &Pool<Sqlite>,
    owner: &OwnerId,
    id: &JobId,
    progress: &JobProgress,
) -> Result<bool> {
    sqlx::query(
        "UPDATE jobs
         SET progress_current = ?, progress_total = ?, progress_skipped = ?,
             progress_message = ?, last_updated_at = ?
         WHERE owner = ? AND id = ?
           AND status NOT IN ('completed', 'failed', 'cancelled')",
    )
    .bind(progress.current)
    .bind(progress.total)
    .bind(progress.skipped)
    .bind(&progress.message)
    .bind(Utc::now().to_rfc3339())
    .bind(owner.as_str())
    .bind(id.as_str())
    .execute(pool)
    .await?;

    let cancel_requested: Option<i64> =
        sqlx::query_scalar("SELECT cancel_requested FROM jobs WHERE owner = ? AND id = ?")
            .bind(owner.as_str())
            .bind(id.as_str())
            .fetch_optional(pool)
            .await?;

    cancel_requested
        .map(|flag| flag != 0)
        .ok_or_else(|| DatabaseError::NotFoundWithMessage(format!("job '{id}' not found")))
}

/// Transition a job to a terminal state with its final result.
///
/// Rejects non-terminal `status` arguments and refuses to touch a job that
/// is already terminal.
pub async fn finish(
    pool: &Pool<Sqlite>,
    owner: &OwnerId,
    id: &JobId,
    status: JobStatus,
    result: &JobResult,
    progress: &JobProgress,
) -> Result<()> {
    if !status.is_terminal() {
        return Err(DatabaseError::Decode(format!(
            "finish requires a terminal status, got '{status}'"
        )));
    }
    let result_json = serde_json::to_string(result)
        .map_err(|e| DatabaseError::Decode(format!("failed to encode result: {e}")))?;
    let now = Utc::now().to_rfc3339();

    let updated = sqlx::query(
        "UPDATE jobs
         SET status = ?, result = ?, ended_at = ?,
             progress_current = ?, progress_total = ?, progress_skipped = ?,
             progress_message = ?, last_updated_at = ?
         WHERE owner = ? AND id = ?
           AND status NOT IN ('completed', 'failed', 'cancelled')",
    )
    .bind(status.to_string())
    .bind(&result_json)
    .bind(&now)
    .bind(progress.current)
    .bind(progress.total)
    .bind(progress.skipped)
    .bind(&progress.message)
    .bind(&now)
    .bind(owner.as_str())
    .bind(id.as_str())
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(not_runnable(pool, owner, id).await);
    }
    Ok(())
}

/// Set the cooperative cancellation flag on a non-terminal job.
///
/// Returns true if the flag was set, false if the job is already terminal
/// or missing. The running execution observes the flag at its next batch
/// boundary.
pub async fn request_cancel(pool: &Pool<Sqlite>, owner: &OwnerId, id: &JobId) -> Result<bool> {
    let updated = sqlx::query(
        "UPDATE jobs SET cancel_requested = 1
         WHERE owner = ? AND id = ?
           AND status NOT IN ('completed', 'failed', 'cancelled')",
    )
    .bind(owner.as_str())
    .bind(id.as_str())
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() > 0)
}

/// Pause a running job. Returns false if the job was not running.
pub async fn set_paused(pool: &Pool<Sqlite>, owner: &OwnerId, id: &JobId) -> Result<bool> {
    let updated = sqlx::query(
        "UPDATE jobs SET status = 'paused', last_updated_at = ?
         WHERE owner = ? AND id = ? AND status = 'running'",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(owner.as_str())
    .bind(id.as_str())
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() > 0)
}

/// Bulk-delete all terminal jobs for an owner. Returns the number removed.
pub async fn delete_terminal(pool: &Pool<Sqlite>, owner: &OwnerId) -> Result<u64> {
    let deleted = sqlx::query(
        "DELETE FROM jobs
         WHERE owner = ? AND status IN ('completed', 'failed', 'cancelled')",
    )
    .bind(owner.as_str())
    .execute(pool)
    .await?;

    Ok(deleted.rows_affected())
}

/// Distinguish "already terminal" from "missing" for failed guarded updates.
async fn not_runnable(pool: &Pool<Sqlite>, owner: &OwnerId, id: &JobId) -> DatabaseError {
    match get(pool, owner, id).await {
        Ok(Some(job)) if job.status.is_terminal() => DatabaseError::TerminalJob(id.to_string()),
        Ok(Some(_)) | Ok(None) => {
            DatabaseError::NotFoundWithMessage(format!("job '{id}' not found"))
        }
        Err(e) => e,
    }
}

/// Parse a database row into a `Job`.
fn parse_job_row(row: sqlx::sqlite::SqliteRow) -> Result<Job> {
    let id: String = row.get("id");
    let owner: String = row.get("owner");
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    let segment_id: String = row.get("segment_id");
    let tags_json: String = row.get("tags");
    let result_json: Option<String> = row.try_get("result").ok().flatten();

    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| DatabaseError::Decode(format!("invalid tags column: {e}")))?;
    let result: Option<JobResult> = result_json
        .map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| DatabaseError::Decode(format!("invalid result column: {e}")))
        })
        .transpose()?;

    Ok(Job {
        id: JobId::new(id).map_err(|e| DatabaseError::Decode(e.to_string()))?,
        owner: OwnerId::new(owner).map_err(|e| DatabaseError::Decode(e.to_string()))?,
        kind: kind
            .parse()
            .map_err(|e: TagflowError| DatabaseError::Decode(e.to_string()))?,
        status: status.parse()?,
        segment_id: SegmentId::new(segment_id).map_err(|e| DatabaseError::Decode(e.to_string()))?,
        segment_name: row.get("segment_name"),
        tags,
        progress: JobProgress {
            current: row.get("progress_current"),
            total: row.get("progress_total"),
            skipped: row.get("progress_skipped"),
            message: row.get("progress_message"),
        },
        result,
        cancel_requested: row.get::<i64, _>("cancel_requested") != 0,
        started_at: parse_timestamp(&row, "started_at")?,
        ended_at: row
            .try_get::<Option<String>, _>("ended_at")
            .ok()
            .flatten()
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        last_updated_at: parse_timestamp(&row, "last_updated_at")?,
    })
}

fn parse_timestamp(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let value: String = row.get(column);
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("invalid {column}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use chrono::Duration;

    async fn setup_test_db() -> Database {
        let db = Database::new(":memory:").await.expect("create test database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    fn owner() -> OwnerId {
        OwnerId::new("user-1").expect("owner id")
    }

    fn new_job(tags: &[&str]) -> NewJob {
        let tags: Vec<String> = tags.iter().map(ToString::to_string).collect();
        NewJob::new(
            owner(),
            JobKind::AddTags,
            SegmentId::new("seg-1").expect("segment id"),
            "VIP customers",
            &tags,
        )
        .expect("new job")
    }

    #[tokio::test]
    async fn test_create_job_is_queued() {
        let db = setup_test_db().await;

        let job = create(db.pool(), new_job(&["vip"])).await.expect("create job");

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, JobProgress::default());
        assert!(job.result.is_none());
        assert!(!job.cancel_requested);

        let fetched = get(db.pool(), &owner(), &job.id)
            .await
            .expect("get job")
            .expect("job exists");
        assert_eq!(fetched.tags, vec!["vip".to_string()]);
        assert_eq!(fetched.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_tags() {
        let result = NewJob::new(
            owner(),
            JobKind::AddTags,
            SegmentId::new("seg-1").expect("segment id"),
            "VIP",
            &["  ".to_string()],
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_scoped_by_owner() {
        let db = setup_test_db().await;
        let job = create(db.pool(), new_job(&["vip"])).await.expect("create job");

        let other = OwnerId::new("user-2").expect("owner id");
        let fetched = get(db.pool(), &other, &job.id).await.expect("get job");
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn test_list_eligible_includes_queued_paused_and_stale() {
        let db = setup_test_db().await;

        let queued = create(db.pool(), new_job(&["a"])).await.expect("create queued");
        let paused = create(db.pool(), new_job(&["b"])).await.expect("create paused");
        let fresh = create(db.pool(), new_job(&["c"])).await.expect("create fresh");
        let stale = create(db.pool(), new_job(&["d"])).await.expect("create stale");

        // paused
        mark_running(db.pool(), &owner(), &paused.id).await.expect("run paused");
        set_paused(db.pool(), &owner(), &paused.id).await.expect("pause");

        // fresh running: last update is now
        mark_running(db.pool(), &owner(), &fresh.id).await.expect("run fresh");

        // stale running: backdate its liveness timestamp 10 minutes
        mark_running(db.pool(), &owner(), &stale.id).await.expect("run stale");
        let stale_ts = (Utc::now() - Duration::minutes(10)).to_rfc3339();
        sqlx::query("UPDATE jobs SET last_updated_at = ? WHERE id = ?")
            .bind(&stale_ts)
            .bind(stale.id.as_str())
            .execute(db.pool())
            .await
            .expect("backdate");

        let stale_before = Utc::now() - Duration::minutes(5);
        let eligible = list_eligible(db.pool(), &owner(), stale_before)
            .await
            .expect("list eligible");

        let ids: Vec<&str> = eligible.iter().map(|j| j.id.as_str()).collect();
        assert!(ids.contains(&queued.id.as_str()));
        assert!(ids.contains(&paused.id.as_str()));
        assert!(ids.contains(&stale.id.as_str()));
        assert!(!ids.contains(&fresh.id.as_str()));
        assert_eq!(eligible.len(), 3);
    }

    #[tokio::test]
    async fn test_list_eligible_ordered_oldest_first() {
        let db = setup_test_db().await;
        let first = create(db.pool(), new_job(&["a"])).await.expect("create first");
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        let second = create(db.pool(), new_job(&["b"])).await.expect("create second");

        let eligible = list_eligible(db.pool(), &owner(), Utc::now())
            .await
            .expect("list eligible");
        assert_eq!(eligible[0].id, first.id);
        assert_eq!(eligible[1].id, second.id);
    }

    #[tokio::test]
    async fn test_mark_running_resets_progress() {
        let db = setup_test_db().await;
        let job = create(db.pool(), new_job(&["vip"])).await.expect("create job");

        mark_running(db.pool(), &owner(), &job.id).await.expect("mark running");

        let running = get(db.pool(), &owner(), &job.id)
            .await
            .expect("get job")
            .expect("job exists");
        assert_eq!(running.status, JobStatus::Running);
        assert_eq!(running.progress.message, "Job started");
        assert_eq!(running.progress.current, 0);
    }

    #[tokio::test]
    async fn test_update_progress_returns_cancel_flag() {
        let db = setup_test_db().await;
        let job = create(db.pool(), new_job(&["vip"])).await.expect("create job");
        mark_running(db.pool(), &owner(), &job.id).await.expect("mark running");

        let progress = JobProgress {
            current: 10,
            total: 40,
            skipped: 1,
            message: "Processed 10 of 40".to_string(),
        };
        let cancel = update_progress(db.pool(), &owner(), &job.id, &progress)
            .await
            .expect("update progress");
        assert!(!cancel);

        request_cancel(db.pool(), &owner(), &job.id)
            .await
            .expect("request cancel");
        let cancel = update_progress(db.pool(), &owner(), &job.id, &progress)
            .await
            .expect("update progress");
        assert!(cancel);
    }

    #[tokio::test]
    async fn test_finish_persists_result_and_blocks_further_updates() {
        let db = setup_test_db().await;
        let job = create(db.pool(), new_job(&["vip"])).await.expect("create job");
        mark_running(db.pool(), &owner(), &job.id).await.expect("mark running");

        let result = JobResult {
            success: true,
            processed_count: 40,
            skipped_count: 0,
            errors: vec![],
        };
        let progress = JobProgress {
            current: 40,
            total: 40,
            skipped: 0,
            message: "Completed".to_string(),
        };
        finish(db.pool(), &owner(), &job.id, JobStatus::Completed, &result, &progress)
            .await
            .expect("finish job");

        let finished = get(db.pool(), &owner(), &job.id)
            .await
            .expect("get job")
            .expect("job exists");
        assert_eq!(finished.status, JobStatus::Completed);
        assert_eq!(finished.result, Some(result.clone()));
        assert!(finished.ended_at.is_some());

        // Terminal jobs reject further transitions
        let again = finish(db.pool(), &owner(), &job.id, JobStatus::Failed, &result, &progress).await;
        assert!(matches!(again, Err(DatabaseError::TerminalJob(_))));

        let rerun = mark_running(db.pool(), &owner(), &job.id).await;
        assert!(matches!(rerun, Err(DatabaseError::TerminalJob(_))));
    }

    #[tokio::test]
    async fn test_finish_rejects_non_terminal_status() {
        let db = setup_test_db().await;
        let job = create(db.pool(), new_job(&["vip"])).await.expect("create job");

        let result = finish(
            db.pool(),
            &owner(),
            &job.id,
            JobStatus::Running,
            &JobResult::default(),
            &JobProgress::default(),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_request_cancel_on_terminal_returns_false() {
        let db = setup_test_db().await;
        let job = create(db.pool(), new_job(&["vip"])).await.expect("create job");
        mark_running(db.pool(), &owner(), &job.id).await.expect("mark running");
        finish(
            db.pool(),
            &owner(),
            &job.id,
            JobStatus::Completed,
            &JobResult::default(),
            &JobProgress::default(),
        )
        .await
        .expect("finish");

        let flagged = request_cancel(db.pool(), &owner(), &job.id)
            .await
            .expect("request cancel");
        assert!(!flagged);
    }

    #[tokio::test]
    async fn test_delete_terminal_clears_history() {
        let db = setup_test_db().await;
        let done = create(db.pool(), new_job(&["a"])).await.expect("create done");
        let live = create(db.pool(), new_job(&["b"])).await.expect("create live");

        mark_running(db.pool(), &owner(), &done.id).await.expect("mark running");
        finish(
            db.pool(),
            &owner(),
            &done.id,
            JobStatus::Failed,
            &JobResult::default(),
            &JobProgress::default(),
        )
        .await
        .expect("finish");

        let deleted = delete_terminal(db.pool(), &owner()).await.expect("delete terminal");
        assert_eq!(deleted, 1);

        let remaining = list_by_owner(db.pool(), &owner()).await.expect("list jobs");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, live.id);
    }
}
