//! Schedule store: persistence for recurrence definitions.
//!
//! Definitions are owned by a user scope and spawn jobs when due. The store
//! never touches jobs a definition already created.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};
use tagflow_core::{OwnerId, SegmentId, TagflowError};
use tagflow_scheduler::{Recurrence, ScheduleDefinition};

/// Persist a new schedule definition.
pub async fn create(pool: &Pool<Sqlite>, definition: &ScheduleDefinition) -> Result<()> {
    let tags_json = serde_json::to_string(&definition.tags)
        .map_err(|e| DatabaseError::Decode(format!("failed to encode tags: {e}")))?;
    let recurrence_json = serde_json::to_string(&definition.recurrence)
        .map_err(|e| DatabaseError::Decode(format!("failed to encode recurrence: {e}")))?;

    sqlx::query(
        "INSERT INTO schedules (id, owner, kind, segment_id, segment_name, tags,
                                recurrence, timezone, is_active, last_run, next_run)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&definition.id)
    .bind(definition.owner.as_str())
    .bind(definition.kind.to_string())
    .bind(definition.segment_id.as_str())
    .bind(&definition.segment_name)
    .bind(&tags_json)
    .bind(&recurrence_json)
    .bind(&definition.timezone)
    .bind(i64::from(definition.is_active))
    .bind(definition.last_run.map(|t| t.to_rfc3339()))
    .bind(definition.next_run.map(|t| t.to_rfc3339()))
    .execute(pool)
    .await?;

    tracing::info!("Created schedule {} for {}", definition.id, definition.owner);
    Ok(())
}

const SCHEDULE_COLUMNS: &str = "id, owner, kind, segment_id, segment_name, tags,
    recurrence, timezone, is_active, last_run, next_run";

/// Get one schedule definition by owner and id.
pub async fn get(
    pool: &Pool<Sqlite>,
    owner: &OwnerId,
    id: &str,
) -> Result<Option<ScheduleDefinition>> {
    let row = sqlx::query(&format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE owner = ? AND id = ?"
    ))
    .bind(owner.as_str())
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(parse_schedule_row).transpose()
}

/// List all schedule definitions for an owner.
pub async fn list_by_owner(pool: &Pool<Sqlite>, owner: &OwnerId) -> Result<Vec<ScheduleDefinition>> {
    let rows = sqlx::query(&format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE owner = ? ORDER BY id"
    ))
    .bind(owner.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(parse_schedule_row).collect()
}

/// List active definitions whose `next_run` has arrived, across all owners.
pub async fn list_active_due(
    pool: &Pool<Sqlite>,
    now: DateTime<Utc>,
) -> Result<Vec<ScheduleDefinition>> {
    let rows = sqlx::query(&format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedules
         WHERE is_active = 1 AND next_run IS NOT NULL AND next_run <= ?
         ORDER BY next_run ASC"
    ))
    .bind(now.to_rfc3339())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(parse_schedule_row).collect()
}

/// Activate or deactivate a definition.
///
/// Deactivation clears `next_run` so the definition stops spawning;
/// activation stores the caller-computed `next_run`.
pub async fn set_active(
    pool: &Pool<Sqlite>,
    owner: &OwnerId,
    id: &str,
    is_active: bool,
    next_run: Option<DateTime<Utc>>,
) -> Result<()> {
    let next_run = if is_active { next_run } else { None };
    let updated = sqlx::query(
        "UPDATE schedules SET is_active = ?, next_run = ? WHERE owner = ? AND id = ?",
    )
    .bind(i64::from(is_active))
    .bind(next_run.map(|t| t.to_rfc3339()))
    .bind(owner.as_str())
    .bind(id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundWithMessage(format!(
            "schedule '{id}' not found"
        )));
    }
    Ok(())
}

/// Record a spawn: set `last_run` and advance `next_run`.
pub async fn mark_spawned(
    pool: &Pool<Sqlite>,
    owner: &OwnerId,
    id: &str,
    last_run: DateTime<Utc>,
    next_run: DateTime<Utc>,
) -> Result<()> {
    let updated = sqlx::query(
        "UPDATE schedules SET last_run = ?, next_run = ? WHERE owner = ? AND id = ?",
    )
    .bind(last_run.to_rfc3339())
    .bind(next_run.to_rfc3339())
    .bind(owner.as_str())
    .bind(id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundWithMessage(format!(
            "schedule '{id}' not found"
        )));
    }
    Ok(())
}

/// Delete a definition. Jobs it already spawned are unaffected.
pub async fn delete(pool: &Pool<Sqlite>, owner: &OwnerId, id: &str) -> Result<bool> {
    let deleted = sqlx::query("DELETE FROM schedules WHERE owner = ? AND id = ?")
        .bind(owner.as_str())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(deleted.rows_affected() > 0)
}

fn parse_schedule_row(row: sqlx::sqlite::SqliteRow) -> Result<ScheduleDefinition> {
    let owner: String = row.get("owner");
    let kind: String = row.get("kind");
    let segment_id: String = row.get("segment_id");
    let tags_json: String = row.get("tags");
    let recurrence_json: String = row.get("recurrence");

    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| DatabaseError::Decode(format!("invalid tags column: {e}")))?;
    let recurrence: Recurrence = serde_json::from_str(&recurrence_json)
        .map_err(|e| DatabaseError::Decode(format!("invalid recurrence column: {e}")))?;

    Ok(ScheduleDefinition {
        id: row.get("id"),
        owner: OwnerId::new(owner).map_err(|e| DatabaseError::Decode(e.to_string()))?,
        kind: kind
            .parse()
            .map_err(|e: TagflowError| DatabaseError::Decode(e.to_string()))?,
        segment_id: SegmentId::new(segment_id).map_err(|e| DatabaseError::Decode(e.to_string()))?,
        segment_name: row.get("segment_name"),
        tags,
        recurrence,
        timezone: row.get("timezone"),
        is_active: row.get::<i64, _>("is_active") != 0,
        last_run: parse_optional_timestamp(&row, "last_run")?,
        next_run: parse_optional_timestamp(&row, "next_run")?,
    })
}

fn parse_optional_timestamp(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.get(column);
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| DatabaseError::Decode(format!("invalid {column}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use chrono::Duration;
    use tagflow_core::JobKind;
    use tagflow_scheduler::{Recurrence, TimeOfDay};

    async fn setup_test_db() -> Database {
        let db = Database::new(":memory:").await.expect("create test database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    fn owner() -> OwnerId {
        OwnerId::new("user-1").expect("owner id")
    }

    fn definition() -> ScheduleDefinition {
        ScheduleDefinition::new(
            owner(),
            JobKind::RemoveTags,
            SegmentId::new("seg-1").expect("segment id"),
            "Lapsed customers",
            &["win-back".to_string()],
            Recurrence::Daily {
                time: TimeOfDay::new(9, 0).expect("time"),
            },
            "America/New_York",
        )
        .expect("create definition")
    }

    #[tokio::test]
    async fn test_create_and_get_roundtrip() {
        let db = setup_test_db().await;
        let mut def = definition();
        def.next_run = Some(Utc::now() + Duration::hours(1));

        create(db.pool(), &def).await.expect("create schedule");

        let fetched = get(db.pool(), &owner(), &def.id)
            .await
            .expect("get schedule")
            .expect("schedule exists");
        assert_eq!(fetched.id, def.id);
        assert_eq!(fetched.kind, JobKind::RemoveTags);
        assert_eq!(fetched.tags, def.tags);
        assert_eq!(fetched.recurrence, def.recurrence);
        assert_eq!(fetched.timezone, "America/New_York");
        assert!(fetched.is_active);
        assert_eq!(
            fetched.next_run.map(|t| t.timestamp()),
            def.next_run.map(|t| t.timestamp())
        );
    }

    #[tokio::test]
    async fn test_list_active_due_filters() {
        let db = setup_test_db().await;
        let now = Utc::now();

        let mut due = definition();
        due.next_run = Some(now - Duration::minutes(5));
        create(db.pool(), &due).await.expect("create due");

        let mut future = definition();
        future.next_run = Some(now + Duration::hours(1));
        create(db.pool(), &future).await.expect("create future");

        let mut inactive = definition();
        inactive.is_active = false;
        inactive.next_run = Some(now - Duration::minutes(5));
        create(db.pool(), &inactive).await.expect("create inactive");

        let unset = definition();
        create(db.pool(), &unset).await.expect("create unset");

        let found = list_active_due(db.pool(), now).await.expect("list due");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, due.id);
    }

    #[tokio::test]
    async fn test_set_active_false_clears_next_run() {
        let db = setup_test_db().await;
        let mut def = definition();
        def.next_run = Some(Utc::now() + Duration::hours(1));
        create(db.pool(), &def).await.expect("create schedule");

        set_active(db.pool(), &owner(), &def.id, false, def.next_run)
            .await
            .expect("deactivate");

        let fetched = get(db.pool(), &owner(), &def.id)
            .await
            .expect("get schedule")
            .expect("schedule exists");
        assert!(!fetched.is_active);
        assert!(fetched.next_run.is_none());
    }

    #[tokio::test]
    async fn test_mark_spawned_advances_runs() {
        let db = setup_test_db().await;
        let mut def = definition();
        let now = Utc::now();
        def.next_run = Some(now - Duration::minutes(1));
        create(db.pool(), &def).await.expect("create schedule");

        let next = now + Duration::days(1);
        mark_spawned(db.pool(), &owner(), &def.id, now, next)
            .await
            .expect("mark spawned");

        let fetched = get(db.pool(), &owner(), &def.id)
            .await
            .expect("get schedule")
            .expect("schedule exists");
        assert_eq!(fetched.last_run.map(|t| t.timestamp()), Some(now.timestamp()));
        assert_eq!(fetched.next_run.map(|t| t.timestamp()), Some(next.timestamp()));
    }

    #[tokio::test]
    async fn test_mark_spawned_missing_schedule() {
        let db = setup_test_db().await;
        let result = mark_spawned(db.pool(), &owner(), "missing", Utc::now(), Utc::now()).await;
        assert!(matches!(result, Err(DatabaseError::NotFoundWithMessage(_))));
    }

    #[tokio::test]
    async fn test_delete_schedule() {
        let db = setup_test_db().await;
        let def = definition();
        create(db.pool(), &def).await.expect("create schedule");

        assert!(delete(db.pool(), &owner(), &def.id).await.expect("delete"));
        assert!(!delete(db.pool(), &owner(), &def.id).await.expect("delete again"));

        let fetched = get(db.pool(), &owner(), &def.id).await.expect("get schedule");
        assert!(fetched.is_none());
    }
}
