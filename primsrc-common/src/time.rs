//! Timestamp utilities

use chrono::{DateTime, NaiveDate, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Absolute distance in whole days between two calendar dates
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (a - b).num_days().abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01
    }

    #[test]
    fn test_days_between_is_symmetric() {
        let a = NaiveDate::from_ymd_opt(2025, 11, 10).unwrap();
        let b = NaiveDate::from_ymd_opt(2023, 11, 2).unwrap();
        assert_eq!(days_between(a, b), days_between(b, a));
        assert_eq!(days_between(a, a), 0);
        assert_eq!(days_between(a, b), 739);
    }
}
