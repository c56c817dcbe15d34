//! Recurrence engine — computes the next run instant for a definition.
//!
//! `next_run` is a pure function of the definition and a supplied "now";
//! it performs no I/O and keeps no state. All time-of-day arithmetic happens
//! in the definition's IANA timezone, and the result is always strictly
//! after `now`.

use crate::definition::{Recurrence, ScheduleDefinition, TimeOfDay};
use crate::error::{Result, ScheduleError};
use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Widest search window, in days, for calendar-based recurrences.
///
/// Monthly rules can skip at most one month plus DST slack; 62 days covers
/// every case with margin.
const MAX_SEARCH_DAYS: u32 = 62;

/// Compute the next run instant for `definition`, strictly after `now`.
///
/// # Errors
/// Returns an error for an unknown timezone, invalid recurrence fields, or
/// (never expected in practice) an exhausted search window.
pub fn next_run(definition: &ScheduleDefinition, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let tz: Tz = definition
        .timezone
        .parse()
        .map_err(|_| ScheduleError::UnknownTimezone(definition.timezone.clone()))?;
    next_occurrence(&definition.recurrence, tz, now)
}

/// Compute the next occurrence of `recurrence` in `tz`, strictly after `now`.
pub fn next_occurrence(recurrence: &Recurrence, tz: Tz, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    recurrence.validate()?;

    match recurrence {
        Recurrence::Interval { interval_minutes } => {
            Ok(now + Duration::minutes(i64::from(*interval_minutes)))
        }
        Recurrence::Daily { time } => {
            let mut date = now.with_timezone(&tz).date_naive();
            for _ in 0..MAX_SEARCH_DAYS {
                if let Some(instant) = resolve_local(tz, date, *time) {
                    if instant > now {
                        return Ok(instant);
                    }
                }
                date = date.succ_opt().ok_or(ScheduleError::NoNextOccurrence)?;
            }
            Err(ScheduleError::NoNextOccurrence)
        }
        Recurrence::Weekly { day_of_week, time } => {
            let mut date = now.with_timezone(&tz).date_naive();
            for _ in 0..MAX_SEARCH_DAYS {
                if weekday_index(date) == *day_of_week {
                    if let Some(instant) = resolve_local(tz, date, *time) {
                        if instant > now {
                            return Ok(instant);
                        }
                    }
                }
                date = date.succ_opt().ok_or(ScheduleError::NoNextOccurrence)?;
            }
            Err(ScheduleError::NoNextOccurrence)
        }
        Recurrence::Monthly { day_of_month, time } => {
            let local_now = now.with_timezone(&tz);
            let mut year = local_now.year();
            let mut month = local_now.month();
            // Two extra months of slack past the immediate candidates.
            for _ in 0..4 {
                if let Some(date) = clamped_month_day(year, month, u32::from(*day_of_month)) {
                    if let Some(instant) = resolve_local(tz, date, *time) {
                        if instant > now {
                            return Ok(instant);
                        }
                    }
                }
                if month == 12 {
                    year += 1;
                    month = 1;
                } else {
                    month += 1;
                }
            }
            Err(ScheduleError::NoNextOccurrence)
        }
    }
}

/// Day-of-week index with 0=Sunday..6=Saturday.
fn weekday_index(date: NaiveDate) -> u8 {
    u8::try_from(date.weekday().num_days_from_sunday()).unwrap_or(0)
}

/// Date for `day` in the given month, clamped to the month's last day.
fn clamped_month_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let last = days_in_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.min(last))
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    Some(first_of_next.pred_opt()?.day())
}

/// Resolve a local wall-clock time on `date` to a UTC instant.
///
/// Ambiguous local times (DST fall-back) take the earlier instant. Local
/// times skipped by a DST spring-forward resolve to the earliest valid
/// instant after the gap, probing in 15-minute steps.
fn resolve_local(tz: Tz, date: NaiveDate, time: TimeOfDay) -> Option<DateTime<Utc>> {
    let naive_time = NaiveTime::from_hms_opt(u32::from(time.hour), u32::from(time.minute), 0)?;
    let mut naive = date.and_time(naive_time);

    // DST gaps are at most a few hours; 12 probes cover 3 hours.
    for _ in 0..=12 {
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => return Some(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earlier, _) => return Some(earlier.with_timezone(&Utc)),
            LocalResult::None => naive += Duration::minutes(15),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ScheduleDefinition;
    use tagflow_core::{JobKind, OwnerId, SegmentId};

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("parse test timestamp")
            .with_timezone(&Utc)
    }

    fn definition(recurrence: Recurrence, timezone: &str) -> ScheduleDefinition {
        ScheduleDefinition::new(
            OwnerId::new("user-1").expect("owner id"),
            JobKind::AddTags,
            SegmentId::new("seg-1").expect("segment id"),
            "VIP customers",
            &["vip".to_string()],
            recurrence,
            timezone,
        )
        .expect("create definition")
    }

    fn time(hour: u8, minute: u8) -> TimeOfDay {
        TimeOfDay::new(hour, minute).expect("time of day")
    }

    #[test]
    fn test_interval_adds_minutes() {
        let def = definition(
            Recurrence::Interval {
                interval_minutes: 45,
            },
            "UTC",
        );
        let now = utc("2026-06-10T12:00:00Z");
        let next = next_run(&def, now).expect("next run");
        assert_eq!(next, utc("2026-06-10T12:45:00Z"));
    }

    #[test]
    fn test_daily_before_time_lands_today() {
        let def = definition(Recurrence::Daily { time: time(9, 0) }, "UTC");
        let next = next_run(&def, utc("2026-06-10T08:00:00Z")).expect("next run");
        assert_eq!(next, utc("2026-06-10T09:00:00Z"));
    }

    #[test]
    fn test_daily_after_time_rolls_to_tomorrow() {
        let def = definition(Recurrence::Daily { time: time(9, 0) }, "UTC");
        let next = next_run(&def, utc("2026-06-10T10:00:00Z")).expect("next run");
        assert_eq!(next, utc("2026-06-11T09:00:00Z"));
    }

    #[test]
    fn test_daily_exact_time_is_strictly_after() {
        let def = definition(Recurrence::Daily { time: time(9, 0) }, "UTC");
        let next = next_run(&def, utc("2026-06-10T09:00:00Z")).expect("next run");
        assert_eq!(next, utc("2026-06-11T09:00:00Z"));
    }

    #[test]
    fn test_weekly_from_wednesday_lands_next_monday() {
        // 2026-06-10 is a Wednesday; day 1 = Monday
        let def = definition(
            Recurrence::Weekly {
                day_of_week: 1,
                time: time(9, 0),
            },
            "America/New_York",
        );
        let next = next_run(&def, utc("2026-06-10T12:00:00Z")).expect("next run");
        // Monday 2026-06-15 09:00 EDT (UTC-4)
        assert_eq!(next, utc("2026-06-15T13:00:00Z"));
    }

    #[test]
    fn test_weekly_same_day_earlier_time_rolls_a_week() {
        // 2026-06-08 is a Monday
        let def = definition(
            Recurrence::Weekly {
                day_of_week: 1,
                time: time(9, 0),
            },
            "UTC",
        );
        let next = next_run(&def, utc("2026-06-08T10:00:00Z")).expect("next run");
        assert_eq!(next, utc("2026-06-15T09:00:00Z"));
    }

    #[test]
    fn test_monthly_clamps_to_last_day() {
        // June has 30 days; day 31 clamps to the 30th
        let def = definition(
            Recurrence::Monthly {
                day_of_month: 31,
                time: time(9, 0),
            },
            "UTC",
        );
        let next = next_run(&def, utc("2026-06-05T00:00:00Z")).expect("next run");
        assert_eq!(next, utc("2026-06-30T09:00:00Z"));
    }

    #[test]
    fn test_monthly_rolls_to_next_month() {
        let def = definition(
            Recurrence::Monthly {
                day_of_month: 31,
                time: time(9, 0),
            },
            "UTC",
        );
        let next = next_run(&def, utc("2026-06-30T12:00:00Z")).expect("next run");
        // July has 31 days, no clamp
        assert_eq!(next, utc("2026-07-31T09:00:00Z"));
    }

    #[test]
    fn test_monthly_february_clamp() {
        let def = definition(
            Recurrence::Monthly {
                day_of_month: 30,
                time: time(12, 0),
            },
            "UTC",
        );
        let next = next_run(&def, utc("2026-02-01T00:00:00Z")).expect("next run");
        assert_eq!(next, utc("2026-02-28T12:00:00Z"));
    }

    #[test]
    fn test_dst_gap_resolves_after_spring_forward() {
        // 2026-03-08 02:30 does not exist in America/New_York; the clocks
        // jump from 02:00 EST to 03:00 EDT. Expect the earliest valid
        // instant after the gap: 03:00 EDT = 07:00 UTC.
        let def = definition(Recurrence::Daily { time: time(2, 30) }, "America/New_York");
        let now = utc("2026-03-08T06:00:00Z"); // 01:00 EST that morning
        let next = next_run(&def, now).expect("next run");
        assert_eq!(next, utc("2026-03-08T07:00:00Z"));
    }

    #[test]
    fn test_next_run_always_strictly_after_now() {
        let recurrences = vec![
            Recurrence::Interval { interval_minutes: 1 },
            Recurrence::Daily { time: time(0, 0) },
            Recurrence::Weekly {
                day_of_week: 0,
                time: time(23, 59),
            },
            Recurrence::Monthly {
                day_of_month: 1,
                time: time(0, 0),
            },
        ];
        let nows = vec![
            utc("2026-01-01T00:00:00Z"),
            utc("2026-02-28T23:59:00Z"),
            utc("2026-12-31T23:59:59Z"),
        ];
        for recurrence in &recurrences {
            for &now in &nows {
                let def = definition(recurrence.clone(), "America/Chicago");
                let next = next_run(&def, now).expect("next run");
                assert!(next > now, "{recurrence:?} at {now} gave {next}");
            }
        }
    }

    #[test]
    fn test_unknown_timezone_rejected_by_engine() {
        let mut def = definition(Recurrence::Daily { time: time(9, 0) }, "UTC");
        def.timezone = "Not/A_Zone".to_string();
        let result = next_run(&def, Utc::now());
        assert!(matches!(result, Err(ScheduleError::UnknownTimezone(_))));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2026, 2), Some(28));
        assert_eq!(days_in_month(2028, 2), Some(29)); // leap year
        assert_eq!(days_in_month(2026, 12), Some(31));
    }
}
