//! Daily dosing schedules
//!
//! Doses start at 08:00. One to four doses a day use fixed clinical slots;
//! higher frequencies are spaced evenly and wrap past midnight.

use chrono::{NaiveDateTime, NaiveTime};

use crate::error::{CareError, CareResult};

pub const MIN_FREQUENCY: u32 = 1;
pub const MAX_FREQUENCY: u32 = 24;
pub const FIRST_DOSE_HOUR: u32 = 8;
pub const NOT_SCHEDULED: &str = "Not scheduled";

const TIME_FORMAT: &str = "%H:%M";

pub fn validate_frequency(frequency: u32) -> CareResult<u32> {
    if (MIN_FREQUENCY..=MAX_FREQUENCY).contains(&frequency) {
        Ok(frequency)
    } else {
        Err(CareError::validation(
            "Frequency must be between 1 and 24 times per day",
        ))
    }
}

/// Hours between consecutive doses, rounded down.
pub fn dose_interval_hours(frequency: u32) -> u32 {
    24 / frequency.max(MIN_FREQUENCY)
}

pub fn schedule_times(frequency: u32) -> CareResult<Vec<String>> {
    let frequency = validate_frequency(frequency)?;

    let fixed: &[&str] = match frequency {
        1 => &["08:00"],
        2 => &["08:00", "20:00"],
        3 => &["08:00", "14:00", "20:00"],
        4 => &["08:00", "12:00", "16:00", "20:00"],
        _ => &[],
    };
    if !fixed.is_empty() {
        return Ok(fixed.iter().map(|t| t.to_string()).collect());
    }

    let interval = dose_interval_hours(frequency);
    Ok((0..frequency)
        .map(|i| format!("{:02}:00", (FIRST_DOSE_HOUR + i * interval) % 24))
        .collect())
}

/// A medication is due when it was never taken or a full dosing interval
/// has elapsed since the last dose.
pub fn is_due_soon(frequency: u32, last_taken: Option<NaiveDateTime>, now: NaiveDateTime) -> bool {
    match last_taken {
        None => true,
        Some(last) => {
            let elapsed = (now - last).num_hours();
            elapsed >= i64::from(dose_interval_hours(frequency))
        }
    }
}

/// First slot of the day, irrespective of the current time.
pub fn next_scheduled_time(times: &[String]) -> String {
    times
        .first()
        .cloned()
        .unwrap_or_else(|| NOT_SCHEDULED.to_string())
}

/// The slot on `now`'s date closest to `now`.
pub fn nearest_slot(times: &[String], now: NaiveDateTime) -> Option<NaiveDateTime> {
    times
        .iter()
        .filter_map(|t| NaiveTime::parse_from_str(t, TIME_FORMAT).ok())
        .map(|time| now.date().and_time(time))
        .min_by_key(|slot| (*slot - now).num_seconds().abs())
}

/// Parses a `HH:MM` slot and places it on the given date.
pub fn slot_on(date: chrono::NaiveDate, time: &str) -> CareResult<NaiveDateTime> {
    NaiveTime::parse_from_str(time, TIME_FORMAT)
        .map(|t| date.and_time(t))
        .map_err(|_| CareError::validation(format!("Invalid schedule time: {}", time)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_fixed_tables() {
        assert_eq!(schedule_times(1).unwrap(), vec!["08:00"]);
        assert_eq!(schedule_times(2).unwrap(), vec!["08:00", "20:00"]);
        assert_eq!(schedule_times(3).unwrap(), vec!["08:00", "14:00", "20:00"]);
        assert_eq!(
            schedule_times(4).unwrap(),
            vec!["08:00", "12:00", "16:00", "20:00"]
        );
    }

    #[test]
    fn test_six_per_day_wraps_past_midnight() {
        assert_eq!(
            schedule_times(6).unwrap(),
            vec!["08:00", "12:00", "16:00", "20:00", "00:00", "04:00"]
        );
    }

    #[test]
    fn test_length_matches_frequency_and_is_idempotent() {
        for frequency in MIN_FREQUENCY..=MAX_FREQUENCY {
            let first = schedule_times(frequency).unwrap();
            assert_eq!(first.len(), frequency as usize);
            assert_eq!(first, schedule_times(frequency).unwrap());
        }
    }

    #[test]
    fn test_out_of_range_frequency_rejected() {
        assert!(matches!(schedule_times(0), Err(CareError::Validation(_))));
        assert!(matches!(schedule_times(25), Err(CareError::Validation(_))));
    }

    #[test]
    fn test_due_soon_policy() {
        assert!(is_due_soon(2, None, at(9, 0)));
        // twice a day: due after 12 whole hours
        assert!(!is_due_soon(2, Some(at(0, 0)), at(11, 59)));
        assert!(is_due_soon(2, Some(at(0, 0)), at(12, 0)));
        assert!(is_due_soon(24, Some(at(0, 0)), at(1, 0)));
    }

    #[test]
    fn test_next_scheduled_time_is_first_slot() {
        let times = schedule_times(3).unwrap();
        assert_eq!(next_scheduled_time(&times), "08:00");
        assert_eq!(next_scheduled_time(&[]), NOT_SCHEDULED);
    }

    #[test]
    fn test_nearest_slot() {
        let times = schedule_times(3).unwrap();
        assert_eq!(nearest_slot(&times, at(13, 10)), Some(at(14, 0)));
        assert_eq!(nearest_slot(&times, at(7, 0)), Some(at(8, 0)));
        assert_eq!(nearest_slot(&[], at(7, 0)), None);
    }
}
