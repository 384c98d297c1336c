//! Trigger-time computation for recurring schedules.
//!
//! `next_trigger` is a pure function of the trigger spec and an explicit
//! reference instant. It never reads the process clock, so callers (and
//! tests) control time completely, and recomputing from any instant before
//! the trigger yields the same result.
//!
//! Monthly clamping: a `day_of_month` beyond the end of the anchor month
//! fires on the **last day of that month**. A day-31 schedule fires on
//! Feb 28 (29 in leap years), not in March.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::models::{ScheduleFrequency, TriggerSpec};

/// Next trigger at or after `now`. Used when a schedule is created or
/// edited: if `now` is exactly a trigger instant, that instant is returned.
pub fn next_trigger(spec: &TriggerSpec, now: DateTime<Utc>) -> DateTime<Utc> {
    compute(spec, now, true)
}

/// Next trigger strictly after `now`. Used by the tick loop once an
/// occurrence has been claimed, so the occurrence just fired is skipped.
pub fn next_trigger_after(spec: &TriggerSpec, now: DateTime<Utc>) -> DateTime<Utc> {
    compute(spec, now, false)
}

fn compute(spec: &TriggerSpec, now: DateTime<Utc>, inclusive: bool) -> DateTime<Utc> {
    let offset = i64::from(spec.tz_offset_minutes);
    // Wall clock in the schedule's reference timezone.
    let local_now: NaiveDateTime = (now + Duration::minutes(offset)).naive_utc();

    let accept = |candidate: NaiveDateTime| -> Option<DateTime<Utc>> {
        let candidate_utc = to_utc(candidate, offset);
        let due = if inclusive {
            candidate_utc >= now
        } else {
            candidate_utc > now
        };
        due.then_some(candidate_utc)
    };

    match spec.frequency {
        ScheduleFrequency::Daily => {
            let today = local_now.date().and_time(spec.time_of_day);
            accept(today).unwrap_or_else(|| to_utc(today + Duration::days(1), offset))
        }
        ScheduleFrequency::Weekly => {
            let target = i64::from(spec.day_of_week.unwrap_or(0)).rem_euclid(7);
            let today = i64::from(local_now.date().weekday().num_days_from_sunday());
            let days_ahead = (target - today).rem_euclid(7);
            let candidate =
                (local_now.date() + Duration::days(days_ahead)).and_time(spec.time_of_day);
            // Only the days_ahead == 0 candidate can be in the past.
            accept(candidate).unwrap_or_else(|| to_utc(candidate + Duration::days(7), offset))
        }
        ScheduleFrequency::Monthly => {
            let day_of_month = u32::from(spec.day_of_month.unwrap_or(1).clamp(1, 31) as u16);
            let this_month =
                clamped_date(local_now.year(), local_now.month(), day_of_month)
                    .and_time(spec.time_of_day);
            accept(this_month).unwrap_or_else(|| {
                let (year, month) = if local_now.month() == 12 {
                    (local_now.year() + 1, 1)
                } else {
                    (local_now.year(), local_now.month() + 1)
                };
                to_utc(
                    clamped_date(year, month, day_of_month).and_time(spec.time_of_day),
                    offset,
                )
            })
        }
    }
}

/// A local wall-clock instant converted to UTC for a fixed offset.
fn to_utc(local: NaiveDateTime, offset_minutes: i64) -> DateTime<Utc> {
    Utc.from_utc_datetime(&(local - Duration::minutes(offset_minutes)))
}

/// The given day within a month, clamped to the month's last day.
fn clamped_date(year: i32, month: u32, day: u32) -> NaiveDate {
    let day = day.min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).expect("clamped day is always valid")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .expect("month arithmetic stays in range")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn daily(time: NaiveTime) -> TriggerSpec {
        TriggerSpec {
            frequency: ScheduleFrequency::Daily,
            day_of_week: None,
            day_of_month: None,
            time_of_day: time,
            tz_offset_minutes: 0,
        }
    }

    fn weekly(day: i16, time: NaiveTime) -> TriggerSpec {
        TriggerSpec {
            frequency: ScheduleFrequency::Weekly,
            day_of_week: Some(day),
            day_of_month: None,
            time_of_day: time,
            tz_offset_minutes: 0,
        }
    }

    fn monthly(day: i16, time: NaiveTime) -> TriggerSpec {
        TriggerSpec {
            frequency: ScheduleFrequency::Monthly,
            day_of_week: None,
            day_of_month: Some(day),
            time_of_day: time,
            tz_offset_minutes: 0,
        }
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 4), 30);
        assert_eq!(days_in_month(2024, 12), 31);
    }

    #[test]
    fn test_daily_before_time_fires_today() {
        let spec = daily(at(9, 0));
        let now = utc(2024, 3, 6, 8, 0);
        assert_eq!(next_trigger(&spec, now), utc(2024, 3, 6, 9, 0));
    }

    #[test]
    fn test_daily_after_time_fires_tomorrow() {
        let spec = daily(at(9, 0));
        let now = utc(2024, 3, 6, 9, 1);
        assert_eq!(next_trigger(&spec, now), utc(2024, 3, 7, 9, 0));
    }

    #[test]
    fn test_daily_at_exact_time_fires_now() {
        let spec = daily(at(9, 0));
        let now = utc(2024, 3, 6, 9, 0);
        assert_eq!(next_trigger(&spec, now), now);
        assert_eq!(next_trigger_after(&spec, now), utc(2024, 3, 7, 9, 0));
    }

    #[test]
    fn test_daily_crosses_month_boundary() {
        let spec = daily(at(9, 0));
        let now = utc(2024, 1, 31, 10, 0);
        assert_eq!(next_trigger(&spec, now), utc(2024, 2, 1, 9, 0));
    }

    #[test]
    fn test_weekly_scenario_from_wednesday() {
        // Monday 09:00 schedule created Wednesday 2024-03-06 10:00
        let spec = weekly(1, at(9, 0));
        let now = utc(2024, 3, 6, 10, 0);
        assert_eq!(next_trigger(&spec, now), utc(2024, 3, 11, 9, 0));
    }

    #[test]
    fn test_weekly_exact_slot_fires_today_then_next_week() {
        let spec = weekly(1, at(9, 0));
        let slot = utc(2024, 3, 11, 9, 0); // a Monday
        assert_eq!(next_trigger(&spec, slot), slot);
        // After the engine processes the occurrence: exactly 7 days later
        assert_eq!(next_trigger_after(&spec, slot), utc(2024, 3, 18, 9, 0));
    }

    #[test]
    fn test_weekly_same_day_earlier_time_rolls_over() {
        let spec = weekly(1, at(9, 0));
        let now = utc(2024, 3, 11, 9, 30); // Monday, past the slot
        assert_eq!(next_trigger(&spec, now), utc(2024, 3, 18, 9, 0));
    }

    #[test]
    fn test_weekly_sunday_is_day_zero() {
        let spec = weekly(0, at(12, 0));
        let now = utc(2024, 3, 6, 10, 0); // Wednesday
        assert_eq!(next_trigger(&spec, now), utc(2024, 3, 10, 12, 0));
    }

    #[test]
    fn test_monthly_day_31_clamps_to_february() {
        let spec = monthly(31, at(9, 0));
        // Leap year: fires Feb 29
        let now = utc(2024, 2, 10, 0, 0);
        assert_eq!(next_trigger(&spec, now), utc(2024, 2, 29, 9, 0));
        // Non-leap year: fires Feb 28
        let now = utc(2023, 2, 10, 0, 0);
        assert_eq!(next_trigger(&spec, now), utc(2023, 2, 28, 9, 0));
    }

    #[test]
    fn test_monthly_clamped_slot_passed_goes_to_next_month() {
        let spec = monthly(31, at(9, 0));
        // Past Feb 29 09:00 in a leap year: next is March 31, not March 1
        let now = utc(2024, 2, 29, 10, 0);
        assert_eq!(next_trigger(&spec, now), utc(2024, 3, 31, 9, 0));
    }

    #[test]
    fn test_monthly_december_rolls_to_january() {
        let spec = monthly(15, at(9, 0));
        let now = utc(2024, 12, 20, 0, 0);
        assert_eq!(next_trigger(&spec, now), utc(2025, 1, 15, 9, 0));
    }

    #[test]
    fn test_monthly_first_of_month() {
        let spec = monthly(1, at(0, 30));
        let now = utc(2024, 3, 1, 0, 0);
        assert_eq!(next_trigger(&spec, now), utc(2024, 3, 1, 0, 30));
    }

    #[test]
    fn test_timezone_offset_shifts_utc_instant() {
        // 09:00 local at UTC+2 is 07:00 UTC
        let spec = TriggerSpec {
            tz_offset_minutes: 120,
            ..daily(at(9, 0))
        };
        let now = utc(2024, 3, 6, 0, 0);
        assert_eq!(next_trigger(&spec, now), utc(2024, 3, 6, 7, 0));
    }

    #[test]
    fn test_timezone_offset_can_move_trigger_across_days() {
        // 00:30 local at UTC-5 is 05:30 UTC the same local day; at 05:00 UTC
        // the local day's slot is still ahead.
        let spec = TriggerSpec {
            tz_offset_minutes: -300,
            ..daily(at(0, 30))
        };
        let now = utc(2024, 3, 6, 5, 0);
        assert_eq!(next_trigger(&spec, now), utc(2024, 3, 6, 5, 30));
    }

    #[test]
    fn test_recompute_is_idempotent_before_trigger() {
        // Recomputing from any instant up to the trigger yields the same
        // instant as the original computation.
        let spec = weekly(1, at(9, 0));
        let created = utc(2024, 3, 6, 10, 0);
        let trigger = next_trigger(&spec, created);

        for minutes_before in [1, 60, 60 * 24, 60 * 24 * 4] {
            let later = trigger - Duration::minutes(minutes_before);
            assert_eq!(next_trigger(&spec, later), trigger);
        }
        assert_eq!(next_trigger(&spec, trigger), trigger);
    }
}
