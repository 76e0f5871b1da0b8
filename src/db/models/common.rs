//! Common helpers shared across models.

use chrono::{DateTime, SecondsFormat, Utc};

/// Timestamp format stored in every `*_at` / `timestamp` column.
///
/// Always UTC with a `Z` suffix, so stored values order lexicographically.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time in the stored timestamp format
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamps_sort_chronologically() {
        let earlier = format_timestamp(Utc.with_ymd_and_hms(2024, 9, 30, 23, 59, 59).unwrap());
        let later = format_timestamp(Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap());
        assert!(earlier < later);
        assert_eq!(later, "2024-10-01T00:00:00.000Z");
    }
}
