//! Wall-clock helpers.
//!
//! Every timestamp the store writes goes through here so tests and storage
//! agree on the unit (Unix milliseconds).

/// Returns the current Unix timestamp in seconds.
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Returns the current Unix timestamp in milliseconds.
pub fn now_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Next value of a strictly increasing millisecond clock.
///
/// `last` is the greatest timestamp already handed out. The result is never
/// behind the wall clock and always ahead of `last`.
pub fn next_monotonic_millis(last: i64) -> i64 {
    now_timestamp_millis().max(last + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_timestamp_is_reasonable() {
        let ts = now_timestamp();
        // Should be after 2024-01-01 (1704067200)
        assert!(ts > 1704067200, "Timestamp {} is too old", ts);
        // Should be before 2100-01-01 (4102444800)
        assert!(ts < 4102444800, "Timestamp {} is too far in future", ts);
    }

    #[test]
    fn test_now_timestamp_millis_is_reasonable() {
        let ts = now_timestamp_millis();
        assert!(ts > 1704067200_000, "Timestamp {} is too old", ts);
    }

    #[test]
    fn test_monotonic_millis_never_repeats() {
        let far_future = now_timestamp_millis() + 60_000;
        assert_eq!(next_monotonic_millis(far_future), far_future + 1);

        let a = next_monotonic_millis(0);
        let b = next_monotonic_millis(a);
        assert!(b > a);
    }
}
