//! Timestamp utilities

use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Timestamp from Unix epoch milliseconds (as sent by browsers)
pub fn from_unix_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// True when `event_time` is more than `threshold` older than `now`.
///
/// Events stamped in the future are never stale.
pub fn is_stale(event_time: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> bool {
    match (now - event_time).to_std() {
        Ok(age) => age > threshold,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(0), Duration::ZERO);
        assert_eq!(millis_to_duration(1000), Duration::from_secs(1));
    }

    #[test]
    fn test_from_unix_millis() {
        let t = from_unix_millis(1_700_000_000_123).unwrap();
        assert_eq!(t.timestamp(), 1_700_000_000);
        assert_eq!(t.timestamp_subsec_millis(), 123);
    }

    #[test]
    fn test_is_stale_threshold() {
        let now = now();
        let threshold = Duration::from_millis(500);

        assert!(!is_stale(now, now, threshold));
        assert!(!is_stale(now - chrono::Duration::milliseconds(499), now, threshold));
        assert!(!is_stale(now - chrono::Duration::milliseconds(500), now, threshold));
        assert!(is_stale(now - chrono::Duration::milliseconds(501), now, threshold));
        assert!(is_stale(now - chrono::Duration::seconds(10), now, threshold));
    }

    #[test]
    fn test_future_events_not_stale() {
        let now = now();
        let later = now + chrono::Duration::seconds(5);
        assert!(!is_stale(later, now, Duration::from_millis(500)));
    }
}
