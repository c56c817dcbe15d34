//! Schedule trigger: turns due definitions into queued jobs.
//!
//! The outer timer loop is the caller's concern; this module provides the
//! single pass it invokes.

use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};
use tagflow_core::JobId;
use tagflow_db::{jobs, schedules};
use tagflow_scheduler::engine::next_run;
use tracing::{error, info};

/// Spawn a queued job from every active definition whose time has arrived.
///
/// Each spawned job is an independent snapshot of its definition's
/// template; later edits or deletion of the definition never touch it.
/// A definition whose next occurrence cannot be computed is logged and
/// skipped, leaving the rest of the pass intact.
///
/// # Errors
/// Returns store errors; per-definition recurrence failures are absorbed.
pub async fn spawn_due_jobs(pool: &Pool<Sqlite>, now: DateTime<Utc>) -> Result<Vec<JobId>> {
    let due = schedules::list_active_due(pool, now).await?;
    let mut spawned = Vec::new();

    for definition in due {
        let next = match next_run(&definition, now) {
            Ok(next) => next,
            Err(e) => {
                error!(
                    "Schedule {}: cannot compute next occurrence, skipping: {}",
                    definition.id, e
                );
                continue;
            }
        };

        let new_job = match jobs::NewJob::new(
            definition.owner.clone(),
            definition.kind,
            definition.segment_id.clone(),
            definition.segment_name.clone(),
            &definition.tags,
        ) {
            Ok(new_job) => new_job,
            Err(e) => {
                error!("Schedule {}: invalid job template, skipping: {}", definition.id, e);
                continue;
            }
        };

        let job = jobs::create(pool, new_job).await?;
        schedules::mark_spawned(pool, &definition.owner, &definition.id, now, next).await?;

        info!(
            "Schedule {} spawned job {} (next run {})",
            definition.id, job.id, next
        );
        spawned.push(job.id);
    }

    Ok(spawned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tagflow_core::{JobKind, OwnerId, SegmentId};
    use tagflow_db::jobs::JobStatus;
    use tagflow_db::Database;
    use tagflow_scheduler::{Recurrence, ScheduleDefinition, TimeOfDay};

    async fn setup_test_db() -> Database {
        let db = Database::new(":memory:").await.expect("create test database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    fn owner() -> OwnerId {
        OwnerId::new("user-1").expect("owner id")
    }

    fn definition(recurrence: Recurrence) -> ScheduleDefinition {
        ScheduleDefinition::new(
            owner(),
            JobKind::AddTags,
            SegmentId::new("seg-1").expect("segment id"),
            "VIP customers",
            &["vip".to_string()],
            recurrence,
            "UTC",
        )
        .expect("create definition")
    }

    #[tokio::test]
    async fn test_spawn_due_jobs_creates_queued_job() {
        let db = setup_test_db().await;
        let now = Utc::now();

        let mut def = definition(Recurrence::Interval {
            interval_minutes: 30,
        });
        def.next_run = Some(now - Duration::minutes(1));
        schedules::create(db.pool(), &def).await.expect("create schedule");

        let spawned = spawn_due_jobs(db.pool(), now).await.expect("spawn due jobs");
        assert_eq!(spawned.len(), 1);

        let job = jobs::get(db.pool(), &owner(), &spawned[0])
            .await
            .expect("get job")
            .expect("job exists");
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.kind, JobKind::AddTags);
        assert_eq!(job.tags, vec!["vip".to_string()]);

        // The definition advanced past now
        let updated = schedules::get(db.pool(), &owner(), &def.id)
            .await
            .expect("get schedule")
            .expect("schedule exists");
        assert_eq!(updated.last_run.map(|t| t.timestamp()), Some(now.timestamp()));
        assert!(updated.next_run.expect("next run set") > now);
    }

    #[tokio::test]
    async fn test_spawn_due_jobs_skips_future_and_inactive() {
        let db = setup_test_db().await;
        let now = Utc::now();

        let mut future = definition(Recurrence::Daily {
            time: TimeOfDay::new(9, 0).expect("time"),
        });
        future.next_run = Some(now + Duration::hours(2));
        schedules::create(db.pool(), &future).await.expect("create future");

        let mut inactive = definition(Recurrence::Interval {
            interval_minutes: 15,
        });
        inactive.is_active = false;
        inactive.next_run = Some(now - Duration::minutes(1));
        schedules::create(db.pool(), &inactive).await.expect("create inactive");

        let spawned = spawn_due_jobs(db.pool(), now).await.expect("spawn due jobs");
        assert!(spawned.is_empty());
    }

    #[tokio::test]
    async fn test_spawned_job_independent_of_definition() {
        let db = setup_test_db().await;
        let now = Utc::now();

        let mut def = definition(Recurrence::Interval {
            interval_minutes: 30,
        });
        def.next_run = Some(now - Duration::minutes(1));
        schedules::create(db.pool(), &def).await.expect("create schedule");

        let spawned = spawn_due_jobs(db.pool(), now).await.expect("spawn due jobs");
        assert_eq!(spawned.len(), 1);

        // Deleting the definition leaves the job untouched
        schedules::delete(db.pool(), &owner(), &def.id)
            .await
            .expect("delete schedule");
        let job = jobs::get(db.pool(), &owner(), &spawned[0])
            .await
            .expect("get job");
        assert!(job.is_some());
    }
}
