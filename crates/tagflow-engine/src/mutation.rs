//! Batched tag mutation over a resolved member list.
//!
//! Members are processed in fixed-size batches, strictly in order, with a
//! progress checkpoint after every batch. Cancellation is cooperative and
//! observed only at batch boundaries, so progress counters always describe
//! whole batches.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tagflow_core::JobKind;
use tagflow_db::jobs::JobProgress;
use tagflow_segment::{MemberId, SegmentApi};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Receives a progress checkpoint after each batch.
///
/// Returns true when cancellation has been requested externally; the
/// mutator then cancels at the current boundary.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Persist or publish one progress checkpoint.
    async fn report(&self, progress: &JobProgress) -> Result<bool>;
}

/// Outcome of one mutation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationSummary {
    /// Members mutated or confirmed unchanged
    pub processed: u32,
    /// Members skipped due to per-member errors
    pub skipped: u32,
    /// Size of the member list
    pub total: u32,
    /// One entry per skipped member
    pub errors: Vec<String>,
    /// True when the pass stopped at a batch boundary before finishing
    pub cancelled: bool,
}

/// Applies one job's tag mutation across a member list in ordered batches.
pub struct BatchMutator {
    batch_size: usize,
    batch_delay: Duration,
}

impl BatchMutator {
    /// Create a mutator. A zero `batch_size` is treated as 1.
    #[must_use]
    pub fn new(batch_size: usize, batch_delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            batch_delay,
        }
    }

    /// Run the mutation pass.
    ///
    /// Per member: read the current tags, compute the target set, and skip
    /// the write when nothing changes (the idempotent no-op still counts as
    /// processed). Per-member failures are recorded and skipped without
    /// stopping the pass. On any finished pass,
    /// `processed + skipped == total`.
    ///
    /// # Errors
    /// Propagates sink failures; remote failures are absorbed per member.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn apply(
        &self,
        client: &dyn SegmentApi,
        kind: JobKind,
        tags: &[String],
        members: &[MemberId],
        token: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Result<MutationSummary> {
        let total = members.len() as u32;
        let mut summary = MutationSummary {
            total,
            ..MutationSummary::default()
        };

        let batch_count = members.len().div_ceil(self.batch_size);
        for (index, batch) in members.chunks(self.batch_size).enumerate() {
            if token.is_cancelled() {
                summary.cancelled = true;
                debug!("Mutation cancelled before batch {}/{}", index + 1, batch_count);
                return Ok(summary);
            }

            for member in batch {
                match self.mutate_member(client, kind, tags, member).await {
                    Ok(()) => summary.processed += 1,
                    Err(e) => {
                        warn!("Skipping member {}: {}", member, e);
                        summary.errors.push(format!("member {member}: {e}"));
                        summary.skipped += 1;
                    }
                }
            }

            let progress = JobProgress {
                current: summary.processed,
                total,
                skipped: summary.skipped,
                message: format!(
                    "Processed {} of {} members",
                    summary.processed + summary.skipped,
                    total
                ),
            };
            let cancel_requested = sink.report(&progress).await?;
            if cancel_requested {
                token.cancel();
            }
            if token.is_cancelled() {
                summary.cancelled = true;
                debug!("Mutation cancelled after batch {}/{}", index + 1, batch_count);
                return Ok(summary);
            }

            if index + 1 < batch_count && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        Ok(summary)
    }

    /// Mutate one member, skipping the remote write when nothing changes.
    async fn mutate_member(
        &self,
        client: &dyn SegmentApi,
        kind: JobKind,
        tags: &[String],
        member: &MemberId,
    ) -> tagflow_segment::Result<()> {
        let existing = client.get_tags(member).await?;
        let target = merge_tags(kind, &existing, tags);
        if target == existing {
            return Ok(());
        }
        client.set_tags(member, &target).await
    }
}

/// Compute a member's target tag set, preserving existing order.
///
/// Adds append missing tags in job order; removes drop matching tags
/// without disturbing the rest.
#[must_use]
pub fn merge_tags(kind: JobKind, existing: &[String], tags: &[String]) -> Vec<String> {
    match kind {
        JobKind::AddTags => {
            let mut target = existing.to_vec();
            for tag in tags {
                if !target.contains(tag) {
                    target.push(tag.clone());
                }
            }
            target
        }
        JobKind::RemoveTags => existing
            .iter()
            .filter(|tag| !tags.contains(tag))
            .cloned()
            .collect(),
    }
}
