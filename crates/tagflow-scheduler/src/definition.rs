//! Schedule definition types.

use crate::error::{Result, ScheduleError};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tagflow_core::{normalize_tags, JobKind, OwnerId, SegmentId, TagflowError};

/// A wall-clock time of day, interpreted in the definition's timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    /// Create a validated time of day.
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        let time = Self { hour, minute };
        time.validate()?;
        Ok(time)
    }

    /// Check field ranges; deserialized values bypass `new`.
    pub fn validate(&self) -> Result<()> {
        if self.hour > 23 || self.minute > 59 {
            return Err(ScheduleError::InvalidRecurrence(format!(
                "time of day {:02}:{:02} out of range",
                self.hour, self.minute
            )));
        }
        Ok(())
    }
}

/// Recurrence rule for a schedule definition.
///
/// One variant per schedule type, each carrying only its relevant fields,
/// so invalid field combinations are unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recurrence {
    /// Every `interval_minutes` minutes, independent of wall-clock alignment.
    Interval { interval_minutes: u32 },
    /// Every day at `time` in the definition's timezone.
    Daily { time: TimeOfDay },
    /// Every week on `day_of_week` (0=Sunday..6=Saturday) at `time`.
    Weekly { day_of_week: u8, time: TimeOfDay },
    /// Every month on `day_of_month` (1-31, clamped to the month's last day) at `time`.
    Monthly { day_of_month: u8, time: TimeOfDay },
}

impl Recurrence {
    /// Validate variant-specific field ranges.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Interval { interval_minutes } => {
                if *interval_minutes == 0 {
                    return Err(ScheduleError::InvalidRecurrence(
                        "interval_minutes must be at least 1".to_string(),
                    ));
                }
            }
            Self::Daily { time } => time.validate()?,
            Self::Weekly { day_of_week, time } => {
                if *day_of_week > 6 {
                    return Err(ScheduleError::InvalidRecurrence(format!(
                        "day_of_week must be 0-6 (0=Sunday), got {day_of_week}"
                    )));
                }
                time.validate()?;
            }
            Self::Monthly { day_of_month, time } => {
                if !(1..=31).contains(day_of_month) {
                    return Err(ScheduleError::InvalidRecurrence(format!(
                        "day_of_month must be 1-31, got {day_of_month}"
                    )));
                }
                time.validate()?;
            }
        }
        Ok(())
    }
}

/// A recurrence rule that spawns jobs.
///
/// Spawned jobs are independent of the definition: editing or deleting a
/// definition never touches jobs it already created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleDefinition {
    /// Unique identifier
    pub id: String,
    /// Owning user scope
    pub owner: OwnerId,
    /// Mutation kind for spawned jobs
    pub kind: JobKind,
    /// Target segment for spawned jobs
    pub segment_id: SegmentId,
    /// Display cache of the segment name, not authoritative
    pub segment_name: String,
    /// Tags applied/removed by spawned jobs
    pub tags: Vec<String>,
    /// Recurrence rule
    pub recurrence: Recurrence,
    /// IANA timezone name the time-of-day fields are interpreted in
    pub timezone: String,
    /// Disabling stops future spawns without deleting history
    pub is_active: bool,
    /// When a job was last spawned from this definition
    pub last_run: Option<DateTime<Utc>>,
    /// Next eligible spawn instant; `None` while inactive
    pub next_run: Option<DateTime<Utc>>,
}

impl ScheduleDefinition {
    /// Create a new active definition with a fresh id.
    ///
    /// Validates the recurrence, the timezone name, and the tag list.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner: OwnerId,
        kind: JobKind,
        segment_id: SegmentId,
        segment_name: impl Into<String>,
        tags: &[String],
        recurrence: Recurrence,
        timezone: impl Into<String>,
    ) -> std::result::Result<Self, TagflowError> {
        let timezone = timezone.into();
        recurrence
            .validate()
            .map_err(|e| TagflowError::Schedule(e.to_string()))?;
        if timezone.parse::<Tz>().is_err() {
            return Err(TagflowError::Schedule(format!(
                "unknown timezone '{timezone}'"
            )));
        }
        let tags = normalize_tags(tags)?;

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner,
            kind,
            segment_id,
            segment_name: segment_name.into(),
            tags,
            recurrence,
            timezone,
            is_active: true,
            last_run: None,
            next_run: None,
        })
    }

    /// Whether this definition should spawn a job at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.next_run.is_some_and(|next| next <= now)
    }
}
