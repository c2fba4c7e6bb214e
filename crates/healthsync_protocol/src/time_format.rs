//! Human-readable renderings of sync timestamps.

use chrono::{DateTime, FixedOffset, Utc};

const DISPLAY_FORMAT: &str = "%b %-d, %Y at %-I:%M %p";
const ABSOLUTE_FORMAT: &str = "%b %-d, %-I:%M %p";

/// Formats an instant as e.g. `"Dec 15, 2025 at 2:30 PM"` in the given offset.
pub fn format_display_timestamp(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format(DISPLAY_FORMAT).to_string()
}

/// Formats `at` relative to `now`.
///
/// - "just now" (< 1 minute)
/// - "N min ago" (< 60 minutes)
/// - "N hours ago" (< 24 hours)
/// - "Yesterday" (1 day)
/// - "N days ago" (2-5 days)
/// - `"Dec 9, 2:30 PM"` beyond that
pub fn format_relative_timestamp(
    at: DateTime<Utc>,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> String {
    let elapsed = now.signed_duration_since(at);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes} min ago")
    } else if hours < 24 {
        format!("{hours} hours ago")
    } else if days == 1 {
        "Yesterday".to_string()
    } else if days <= 5 {
        format!("{days} days ago")
    } else {
        at.with_timezone(&offset).format(ABSOLUTE_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn display_format() {
        let at = Utc.with_ymd_and_hms(2025, 12, 15, 14, 30, 0).unwrap();
        assert_eq!(format_display_timestamp(at, utc()), "Dec 15, 2025 at 2:30 PM");

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(format_display_timestamp(at, plus_two), "Dec 15, 2025 at 4:30 PM");
    }

    #[test]
    fn relative_buckets() {
        let now = Utc.with_ymd_and_hms(2025, 12, 15, 12, 0, 0).unwrap();
        let rel = |d: Duration| format_relative_timestamp(now - d, now, utc());

        assert_eq!(rel(Duration::seconds(30)), "just now");
        assert_eq!(rel(Duration::minutes(5)), "5 min ago");
        assert_eq!(rel(Duration::hours(3)), "3 hours ago");
        assert_eq!(rel(Duration::hours(30)), "Yesterday");
        assert_eq!(rel(Duration::days(4)), "4 days ago");
        assert_eq!(rel(Duration::days(6)), "Dec 9, 12:00 PM");
    }

    #[test]
    fn future_timestamp_is_just_now() {
        let now = Utc.with_ymd_and_hms(2025, 12, 15, 12, 0, 0).unwrap();
        let at = now + Duration::minutes(10);
        assert_eq!(format_relative_timestamp(at, now, utc()), "just now");
    }
}
