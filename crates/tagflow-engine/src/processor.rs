//! Concurrency-limited job processor.
//!
//! The processor admits eligible jobs per owner scope up to a concurrency
//! ceiling, spawns each execution as a detached task, and drives the batch
//! mutation routine with persisted progress, a hard timeout, and
//! cooperative cancellation. A per-job failure never disturbs sibling
//! executions.

use crate::error::{EngineError, Result};
use crate::mutation::{BatchMutator, MutationSummary, ProgressSink};
use crate::registry::InFlightRegistry;
use async_trait::async_trait;
use std::sync::Arc;
use tagflow_core::config::{ProcessorConfig, SegmentApiConfig};
use tagflow_core::{JobId, OwnerId};
use tagflow_db::jobs::{self, Job, JobProgress, JobResult, JobStatus};
use tagflow_db::{Database, DatabaseError};
use tagflow_segment::{CredentialStore, Credentials, HttpSegmentClient, SegmentApi};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Builds a segment client for one owner's credentials.
///
/// The processor resolves credentials per owner at admission time, so the
/// client is constructed per scope rather than shared.
pub trait SegmentClientFactory: Send + Sync {
    /// Create a client authenticated with `credentials`.
    ///
    /// # Errors
    /// Returns a segment error if the client cannot be constructed.
    fn client(&self, credentials: &Credentials) -> tagflow_segment::Result<Arc<dyn SegmentApi>>;
}

/// Default factory producing `HttpSegmentClient` instances.
pub struct HttpClientFactory {
    config: SegmentApiConfig,
}

impl HttpClientFactory {
    /// Create a factory from remote API settings.
    #[must_use]
    pub fn new(config: SegmentApiConfig) -> Self {
        Self { config }
    }
}

impl SegmentClientFactory for HttpClientFactory {
    fn client(&self, credentials: &Credentials) -> tagflow_segment::Result<Arc<dyn SegmentApi>> {
        Ok(Arc::new(HttpSegmentClient::new(&self.config, credentials)?))
    }
}

/// Read-only snapshot of processor capacity for one owner scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Jobs currently executing for the scope
    pub in_flight: usize,
    /// Concurrency ceiling
    pub max_concurrent_jobs: usize,
    /// Remaining admission capacity
    pub available_slots: usize,
}

/// Executes eligible jobs with bounded per-owner concurrency.
pub struct JobProcessor {
    config: ProcessorConfig,
    max_members: usize,
    db: Arc<Database>,
    credentials: Arc<dyn CredentialStore>,
    clients: Arc<dyn SegmentClientFactory>,
    registry: Arc<InFlightRegistry>,
}

impl JobProcessor {
    /// Create a processor with default settings.
    #[must_use]
    pub fn new(
        db: Arc<Database>,
        credentials: Arc<dyn CredentialStore>,
        clients: Arc<dyn SegmentClientFactory>,
    ) -> Self {
        Self {
            config: ProcessorConfig::default(),
            max_members: 30_000,
            db,
            credentials,
            clients,
            registry: Arc::new(InFlightRegistry::new()),
        }
    }

    /// Replace the processor settings.
    #[must_use]
    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the upper bound on members resolved per segment.
    #[must_use]
    pub fn with_max_members(mut self, max_members: usize) -> Self {
        self.max_members = max_members;
        self
    }

    /// Admit and launch eligible jobs for one owner scope.
    ///
    /// Skips the scope entirely (logged, not an error) when no credentials
    /// are configured. Otherwise lists eligible jobs oldest-first, admits up
    /// to the free slots while skipping ids already in flight, spawns each
    /// execution detached, and returns the admitted ids without waiting.
    ///
    /// # Errors
    /// Returns store errors from the eligibility query.
    #[allow(clippy::cast_possible_wrap)]
    pub async fn run_eligible(&self, owner: &OwnerId) -> Result<Vec<JobId>> {
        let Some(credentials) = self.credentials.get(owner).await else {
            warn!("No credentials configured for {}, skipping scope", owner);
            return Ok(Vec::new());
        };
        let client = self.clients.client(&credentials)?;

        let stale_before = chrono::Utc::now()
            - chrono::Duration::minutes(self.config.stale_after_minutes as i64);
        let eligible = jobs::list_eligible(self.db.pool(), owner, stale_before).await?;
        if eligible.is_empty() {
            return Ok(Vec::new());
        }

        let available = self
            .config
            .max_concurrent_jobs
            .saturating_sub(self.registry.in_flight(owner));

        let mut admitted = Vec::new();
        for job in eligible {
            if admitted.len() >= available {
                break;
            }
            // Double-admission guard: a stale-looking job may already be ours
            let Some(token) = self.registry.register(job.id.clone(), owner.clone()) else {
                continue;
            };

            info!("Admitting job {} for {}", job.id, owner);
            admitted.push(job.id.clone());
            self.spawn_execution(job, client.clone(), token);
        }

        Ok(admitted)
    }

    /// Signal cancellation of a job executing in this processor instance.
    ///
    /// Returns false when the job is not in flight here; cancellation of a
    /// job running elsewhere goes through the persisted flag.
    #[must_use]
    pub fn cancel(&self, job_id: &JobId) -> bool {
        self.registry.cancel(job_id)
    }

    /// Capacity snapshot for one owner scope.
    #[must_use]
    pub fn stats(&self, owner: &OwnerId) -> ProcessorStats {
        let in_flight = self.registry.in_flight(owner);
        ProcessorStats {
            in_flight,
            max_concurrent_jobs: self.config.max_concurrent_jobs,
            available_slots: self.config.max_concurrent_jobs.saturating_sub(in_flight),
        }
    }

    /// Launch one job execution as a detached task.
    fn spawn_execution(&self, job: Job, client: Arc<dyn SegmentApi>, token: CancellationToken) {
        let db = self.db.clone();
        let registry = self.registry.clone();
        let config = self.config.clone();
        let max_members = self.max_members;

        tokio::spawn(async move {
            let owner = job.owner.clone();
            let job_id = job.id.clone();

            let outcome = execute_job(&db, client.as_ref(), &config, max_members, job, &token).await;
            if let Err(e) = outcome {
                error!("Job {} failed: {}", job_id, e);
                fail_job_best_effort(&db, &owner, &job_id, &e).await;
            }

            registry.deregister(&job_id);
        });
    }
}

/// Run one job execution end to end.
///
/// Errors escaping this function are execution failures whose terminal
/// transition has not been confirmed; the caller converts them to a Failed
/// state at the per-job boundary.
async fn execute_job(
    db: &Database,
    client: &dyn SegmentApi,
    config: &ProcessorConfig,
    max_members: usize,
    job: Job,
    token: &CancellationToken,
) -> Result<()> {
    jobs::mark_running(db.pool(), &job.owner, &job.id).await?;

    // Hard timeout, indistinguishable from user cancellation downstream
    let timeout_token = token.clone();
    let timeout = config.job_timeout();
    let timer = tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        warn!("Job execution timed out after {:?}", timeout);
        timeout_token.cancel();
    });

    let result = execute_mutation(db, client, config, max_members, &job, token).await;
    timer.abort();
    result
}

/// Resolve members and run the batch mutation, persisting the terminal state.
async fn execute_mutation(
    db: &Database,
    client: &dyn SegmentApi,
    config: &ProcessorConfig,
    max_members: usize,
    job: &Job,
    token: &CancellationToken,
) -> Result<()> {
    let resolving = JobProgress {
        message: "Resolving segment members".to_string(),
        ..JobProgress::default()
    };
    if jobs::update_progress(db.pool(), &job.owner, &job.id, &resolving).await? {
        token.cancel();
    }

    let members = match client.list_member_ids(&job.segment_id, max_members).await {
        Ok(members) => members,
        Err(e) => {
            error!("Job {}: failed to resolve segment {}: {}", job.id, job.segment_id, e);
            let result = JobResult {
                success: false,
                processed_count: 0,
                skipped_count: 0,
                errors: vec![format!("failed to resolve segment members: {e}")],
            };
            let progress = JobProgress {
                message: "Failed to resolve segment members".to_string(),
                ..JobProgress::default()
            };
            jobs::finish(db.pool(), &job.owner, &job.id, JobStatus::Failed, &result, &progress)
                .await?;
            return Ok(());
        }
    };

    if members.is_empty() {
        info!("Job {}: segment {} has no members", job.id, job.segment_id);
        let result = JobResult {
            success: true,
            processed_count: 0,
            skipped_count: 0,
            errors: vec!["segment contains no members".to_string()],
        };
        let progress = JobProgress {
            message: "Segment contains no members".to_string(),
            ..JobProgress::default()
        };
        jobs::finish(db.pool(), &job.owner, &job.id, JobStatus::Completed, &result, &progress)
            .await?;
        return Ok(());
    }

    let mutator = BatchMutator::new(config.batch_size, config.batch_delay());
    let sink = StoreProgressSink {
        db,
        owner: job.owner.clone(),
        id: job.id.clone(),
    };
    let summary = mutator
        .apply(client, job.kind, &job.tags, &members, token, &sink)
        .await?;

    finish_from_summary(db, job, &summary).await
}

/// Persist the terminal state described by a mutation summary.
async fn finish_from_summary(db: &Database, job: &Job, summary: &MutationSummary) -> Result<()> {
    let handled = summary.processed + summary.skipped;
    let (status, message) = if summary.cancelled {
        (
            JobStatus::Cancelled,
            format!("Cancelled after {} of {} members", handled, summary.total),
        )
    } else if summary.errors.is_empty() {
        (
            JobStatus::Completed,
            format!("Processed {} members", summary.processed),
        )
    } else {
        (
            JobStatus::Failed,
            format!(
                "Processed {} members, skipped {}",
                summary.processed, summary.skipped
            ),
        )
    };

    let result = JobResult {
        success: !summary.cancelled && summary.errors.is_empty(),
        processed_count: summary.processed,
        skipped_count: summary.skipped,
        errors: summary.errors.clone(),
    };
    let progress = JobProgress {
        current: summary.processed,
        total: summary.total,
        skipped: summary.skipped,
        message,
    };

    info!("Job {} finished as {}", job.id, status);
    jobs::finish(db.pool(), &job.owner, &job.id, status, &result, &progress).await?;
    Ok(())
}

/// Convert an escaped execution error into a Failed terminal state.
///
/// Store failures here are logged and dropped; the job will surface as
/// stale and be re-admitted later.
async fn fail_job_best_effort(db: &Database, owner: &OwnerId, job_id: &JobId, e: &EngineError) {
    let result = JobResult {
        success: false,
        processed_count: 0,
        skipped_count: 0,
        errors: vec![e.to_string()],
    };
    let progress = JobProgress {
        message: "Job execution failed".to_string(),
        ..JobProgress::default()
    };
    match jobs::finish(db.pool(), owner, job_id, JobStatus::Failed, &result, &progress).await {
        Ok(()) | Err(DatabaseError::TerminalJob(_)) => {}
        Err(store_err) => {
            error!("Failed to persist failure for job {}: {}", job_id, store_err);
        }
    }
}

/// Progress sink that checkpoints into the job store.
///
/// The returned flag is the persisted `cancel_requested` value, letting
/// externally requested cancellation reach the running execution.
struct StoreProgressSink<'a> {
    db: &'a Database,
    owner: OwnerId,
    id: JobId,
}

#[async_trait]
impl ProgressSink for StoreProgressSink<'_> {
    async fn report(&self, progress: &JobProgress) -> Result<bool> {
        Ok(jobs::update_progress(self.db.pool(), &self.owner, &self.id, progress).await?)
    }
}
