use chrono::{DateTime, Datelike, Days, Local, NaiveDate, TimeZone, Timelike, Weekday};

use crate::error::{Result, SchedulerError};
use crate::types::Frequency;

/// Compute the next run (unix seconds) for a schedule picked as
/// `frequency` / `weekday` / `time`, strictly after `now`.
///
/// `time` is `HH:MM`; minutes are discarded and the hour is taken mod 24.
/// `weekday` is only consulted for [`Frequency::Weekly`]. All calendar
/// arithmetic happens in `now`'s time zone, so the result always lands on the
/// requested local hour.
pub fn compute_timestamp<Tz: TimeZone>(
    frequency: Frequency,
    weekday: &str,
    time: &str,
    now: &DateTime<Tz>,
) -> Result<i64> {
    let hour = parse_hour(time)?;
    let tz = now.timezone();
    let today = now.date_naive();

    let candidate = match frequency {
        Frequency::Daily => {
            let candidate = at_local_hour(&tz, today, hour)?;
            if candidate > *now {
                candidate
            } else {
                // Today's hour already passed.
                at_local_hour(&tz, add_days(today, 1)?, hour)?
            }
        }

        Frequency::Weekly => {
            let target_dow = parse_weekday(weekday)?.num_days_from_sunday() as i64;
            let today_dow = now.weekday().num_days_from_sunday() as i64;
            let mut days_ahead = target_dow - today_dow;

            // Negative means the target day already passed this week.
            if days_ahead < 0 {
                days_ahead += 7;
            }

            let candidate = at_local_hour(&tz, add_days(today, days_ahead as u64)?, hour)?;
            if days_ahead == 0 && candidate <= *now {
                at_local_hour(&tz, add_days(today, 7)?, hour)?
            } else {
                candidate
            }
        }
    };

    Ok(candidate.timestamp())
}

/// [`compute_timestamp`] against the machine's local calendar.
pub fn compute_timestamp_local(frequency: Frequency, weekday: &str, time: &str) -> Result<i64> {
    compute_timestamp(frequency, weekday, time, &Local::now())
}

/// Parse the hour out of an `HH:MM` string. Minutes must be numeric but are
/// otherwise ignored.
pub fn parse_hour(time: &str) -> Result<u32> {
    let invalid = || SchedulerError::InvalidSchedule(format!("invalid time of day: {time:?}"));

    let (hour, minute) = time.trim().split_once(':').ok_or_else(invalid)?;
    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    minute.parse::<u32>().map_err(|_| invalid())?;
    Ok(hour % 24)
}

/// Accepts full (`monday`) and short (`mon`) names, case-insensitive.
pub fn parse_weekday(name: &str) -> Result<Weekday> {
    name.trim()
        .parse::<Weekday>()
        .map_err(|_| SchedulerError::InvalidSchedule(format!("unknown weekday: {name:?}")))
}

/// Local hour and weekday at which `timestamp` fires in `tz`.
pub fn local_hour_and_weekday<Tz: TimeZone>(timestamp: i64, tz: &Tz) -> Option<(u32, Weekday)> {
    let at = tz.timestamp_opt(timestamp, 0).single()?;
    Some((at.hour(), at.weekday()))
}

fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(days))
        .ok_or_else(|| SchedulerError::InvalidSchedule("date out of range".to_string()))
}

/// `date` at `hour`:00:00 local time. A wall-clock hour skipped by a DST
/// transition resolves to the first valid hour after it; an ambiguous one
/// resolves to its earlier instant.
fn at_local_hour<Tz: TimeZone>(tz: &Tz, date: NaiveDate, hour: u32) -> Result<DateTime<Tz>> {
    for h in hour..24 {
        let Some(naive) = date.and_hms_opt(h, 0, 0) else {
            break;
        };
        if let Some(at) = tz.from_local_datetime(&naive).earliest() {
            return Ok(at);
        }
    }
    Err(SchedulerError::InvalidSchedule(format!(
        "{date} {hour:02}:00 does not exist in the local calendar"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, Utc};

    // 2024-01-15 is a Monday.
    fn at(day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, minute, second).unwrap()
    }

    #[test]
    fn daily_rolls_to_tomorrow_once_hour_passed() {
        let now = at(15, 4, 0, 1);
        let ts = compute_timestamp(Frequency::Daily, "", "04:00", &now).unwrap();
        assert_eq!(ts, at(16, 4, 0, 0).timestamp());
    }

    #[test]
    fn daily_exact_instant_counts_as_passed() {
        let now = at(15, 4, 0, 0);
        let ts = compute_timestamp(Frequency::Daily, "", "04:00", &now).unwrap();
        assert_eq!(ts, at(16, 4, 0, 0).timestamp());
    }

    #[test]
    fn daily_later_today_stays_today() {
        let now = at(15, 3, 59, 59);
        let ts = compute_timestamp(Frequency::Daily, "", "04:00", &now).unwrap();
        assert_eq!(ts, at(15, 4, 0, 0).timestamp());
    }

    #[test]
    fn daily_is_always_strictly_in_future() {
        let start = at(15, 0, 0, 0);
        for step in 0..(48 * 4) {
            let now = start + Duration::minutes(15 * step);
            for hour in 0..24 {
                let time = format!("{hour:02}:00");
                let ts = compute_timestamp(Frequency::Daily, "", &time, &now).unwrap();
                assert!(ts > now.timestamp(), "{time} at {now}");
                assert!(ts - now.timestamp() <= 24 * 3600);
            }
        }
    }

    #[test]
    fn minutes_are_discarded_and_hour_wraps() {
        let now = at(15, 1, 0, 0);
        let ts = compute_timestamp(Frequency::Daily, "", "09:45", &now).unwrap();
        assert_eq!(ts, at(15, 9, 0, 0).timestamp());

        let wrapped = compute_timestamp(Frequency::Daily, "", "26:00", &now).unwrap();
        assert_eq!(wrapped, at(15, 2, 0, 0).timestamp());
    }

    #[test]
    fn weekly_same_day_passed_adds_seven_days() {
        let now = at(15, 14, 30, 0); // Monday
        let ts = compute_timestamp(Frequency::Weekly, "monday", "14:00", &now).unwrap();
        assert_eq!(ts, at(22, 14, 0, 0).timestamp());
    }

    #[test]
    fn weekly_same_day_not_passed_is_today() {
        let now = at(15, 13, 0, 0); // Monday
        let ts = compute_timestamp(Frequency::Weekly, "Monday", "14:00", &now).unwrap();
        assert_eq!(ts, at(15, 14, 0, 0).timestamp());
    }

    #[test]
    fn weekly_earlier_weekday_wraps_to_next_week() {
        let now = at(17, 10, 0, 0); // Wednesday
        let ts = compute_timestamp(Frequency::Weekly, "monday", "09:00", &now).unwrap();
        assert_eq!(ts, at(22, 9, 0, 0).timestamp());
    }

    #[test]
    fn weekly_later_weekday_this_week() {
        let now = at(15, 23, 0, 0); // Monday
        let ts = compute_timestamp(Frequency::Weekly, "sat", "01:00", &now).unwrap();
        assert_eq!(ts, at(20, 1, 0, 0).timestamp());
    }

    #[test]
    fn weekly_sunday_maps_to_start_of_week() {
        let now = at(20, 12, 0, 0); // Saturday
        let ts = compute_timestamp(Frequency::Weekly, "sunday", "08:00", &now).unwrap();
        assert_eq!(ts, at(21, 8, 0, 0).timestamp());
    }

    #[test]
    fn computation_uses_the_clock_time_zone() {
        // 2024-01-15 22:30 UTC is already Tuesday 00:30 at UTC+2.
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = at(15, 22, 30, 0).with_timezone(&tz);
        let ts = compute_timestamp(Frequency::Daily, "", "01:00", &now).unwrap();
        // 01:00 local on Tuesday == 23:00 UTC Monday.
        assert_eq!(ts, at(15, 23, 0, 0).timestamp());
        assert_eq!(local_hour_and_weekday(ts, &tz), Some((1, Weekday::Tue)));
    }

    #[test]
    fn malformed_input_is_rejected() {
        let now = at(15, 0, 0, 0);
        assert!(compute_timestamp(Frequency::Daily, "", "9am", &now).is_err());
        assert!(compute_timestamp(Frequency::Daily, "", "", &now).is_err());
        assert!(compute_timestamp(Frequency::Weekly, "someday", "09:00", &now).is_err());
        assert!(compute_timestamp(Frequency::Weekly, "", "09:00", &now).is_err());
    }

    #[test]
    fn weekday_is_ignored_for_daily() {
        let now = at(15, 0, 0, 0);
        assert!(compute_timestamp(Frequency::Daily, "garbage", "09:00", &now).is_ok());
    }
}
