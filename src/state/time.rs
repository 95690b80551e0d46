use chrono::{DateTime, Local, Utc};

/// Human-readable age of a store timestamp relative to `now`.
///
/// Buckets are inclusive at their lower edge: exactly 60 minutes is
/// "1 hour ago". Timestamps ahead of `now` (clock skew) read "Just now".
pub fn format_relative_time(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(timestamp) = timestamp else {
        return "Never".to_string();
    };

    let elapsed = now.signed_duration_since(timestamp);

    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        return "Just now".to_string();
    }
    if minutes < 60 {
        return ago(minutes, "minute");
    }

    let hours = elapsed.num_hours();
    if hours < 24 {
        return ago(hours, "hour");
    }

    let days = elapsed.num_days();
    if days < 7 {
        return ago(days, "day");
    }

    timestamp.with_timezone(&Local).format("%-m/%-d/%Y").to_string()
}

fn ago(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 15, 0, 0).unwrap()
    }

    fn before(duration: Duration) -> String {
        format_relative_time(Some(now() - duration), now())
    }

    #[test]
    fn test_never() {
        assert_eq!(format_relative_time(None, now()), "Never");
    }

    #[test]
    fn test_just_now() {
        assert_eq!(before(Duration::zero()), "Just now");
        assert_eq!(before(Duration::seconds(59)), "Just now");
        assert_eq!(before(Duration::seconds(-30)), "Just now");
    }

    #[test]
    fn test_minutes() {
        assert_eq!(before(Duration::minutes(1)), "1 minute ago");
        assert_eq!(before(Duration::minutes(5)), "5 minutes ago");
        assert_eq!(before(Duration::minutes(59)), "59 minutes ago");
    }

    #[test]
    fn test_hour_boundary_is_inclusive() {
        assert_eq!(before(Duration::minutes(60)), "1 hour ago");
        assert_eq!(before(Duration::minutes(119)), "1 hour ago");
        assert_eq!(before(Duration::hours(23)), "23 hours ago");
    }

    #[test]
    fn test_days() {
        assert_eq!(before(Duration::hours(24)), "1 day ago");
        assert_eq!(before(Duration::days(6)), "6 days ago");
    }

    #[test]
    fn test_calendar_date_after_a_week() {
        let timestamp = now() - Duration::days(7);
        let expected = timestamp.with_timezone(&Local).format("%-m/%-d/%Y").to_string();
        assert_eq!(format_relative_time(Some(timestamp), now()), expected);
    }
}
