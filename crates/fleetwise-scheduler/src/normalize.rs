//! Route-level schedule identifiers.
//!
//! Routes carry a display id of the form `{id}-{daily|weekly}-{digits}-{HH:MM}`
//! so that two schedules sharing a storage key remain distinguishable in the
//! UI. Every lookup must go through [`normalize_schedule_id`] first.

use chrono::TimeZone;

use crate::schedule::local_hour_and_weekday;
use crate::types::Frequency;

/// Strip a trailing `-{daily|weekly}-{digits}-{HH:MM}` suffix, if present.
///
/// Idempotent: an id without the suffix is returned unchanged.
pub fn normalize_schedule_id(id: &str) -> &str {
    strip_display_suffix(id).unwrap_or(id)
}

fn strip_display_suffix(id: &str) -> Option<&str> {
    let mut parts = id.rsplitn(4, '-');
    let time = parts.next()?;
    let digits = parts.next()?;
    let frequency = parts.next()?;
    let prefix = parts.next()?;

    let t = time.as_bytes();
    let time_ok = t.len() == 5
        && t[2] == b':'
        && t[..2].iter().all(u8::is_ascii_digit)
        && t[3..].iter().all(u8::is_ascii_digit);
    let digits_ok = !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit());
    let frequency_ok = frequency == "daily" || frequency == "weekly";

    (time_ok && digits_ok && frequency_ok).then_some(prefix)
}

/// Render the display id for a schedule firing at `timestamp` in `tz`.
///
/// The digits segment is the local weekday, 0 (Sunday) to 6 (Saturday).
/// Returns the canonical id unchanged when the timestamp cannot be mapped.
pub fn display_schedule_id<Tz: TimeZone>(
    canonical: &str,
    frequency: Frequency,
    timestamp: i64,
    tz: &Tz,
) -> String {
    match local_hour_and_weekday(timestamp, tz) {
        Some((hour, weekday)) => format!(
            "{canonical}-{frequency}-{}-{hour:02}:00",
            weekday.num_days_from_sunday()
        ),
        None => canonical.to_string(),
    }
}
