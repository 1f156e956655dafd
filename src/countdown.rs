//! Deadline arithmetic. Pure functions of the round deadline and a clock
//! reading; nothing here is a source of truth.

use crate::types::TimestampMs;

/// Interval at which countdowns are re-evaluated
pub const TICK_INTERVAL_MS: u64 = 1000;

/// Current wall clock in milliseconds
pub fn now_millis() -> TimestampMs {
    chrono::Utc::now().timestamp_millis()
}

/// Whole seconds left until `round_ends_at`, never negative
pub fn remaining_seconds(round_ends_at: TimestampMs, now: TimestampMs) -> u64 {
    let diff = round_ends_at.saturating_sub(now);
    if diff <= 0 {
        0
    } else {
        (diff / 1000) as u64
    }
}

/// Render seconds as `m:ss`
pub fn format_clock(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Offset between a remote clock and the local one.
///
/// `corrected_now` = local clock + offset, i.e. the local estimate of the
/// server's clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockOffset {
    offset_ms: i64,
}

impl ClockOffset {
    pub fn from_sample(server_now: TimestampMs, local_now: TimestampMs) -> Self {
        Self {
            offset_ms: server_now.saturating_sub(local_now),
        }
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    pub fn corrected(&self, local_now: TimestampMs) -> TimestampMs {
        local_now.saturating_add(self.offset_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_floors_to_seconds() {
        assert_eq!(remaining_seconds(10_000, 0), 10);
        assert_eq!(remaining_seconds(10_000, 1), 9);
        assert_eq!(remaining_seconds(10_000, 9_001), 0);
        assert_eq!(remaining_seconds(10_000, 8_999), 1);
    }

    #[test]
    fn test_remaining_never_negative() {
        assert_eq!(remaining_seconds(10_000, 10_000), 0);
        assert_eq!(remaining_seconds(10_000, 50_000), 0);
        assert_eq!(remaining_seconds(i64::MIN, i64::MAX), 0);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(40), "0:40");
        assert_eq!(format_clock(5), "0:05");
        assert_eq!(format_clock(125), "2:05");
        assert_eq!(format_clock(0), "0:00");
    }

    #[test]
    fn test_clock_offset() {
        // Server is 2.5s ahead of us
        let offset = ClockOffset::from_sample(12_500, 10_000);
        assert_eq!(offset.offset_ms(), 2_500);
        assert_eq!(offset.corrected(20_000), 22_500);

        let behind = ClockOffset::from_sample(9_000, 10_000);
        assert_eq!(behind.corrected(10_000), 9_000);
        assert_eq!(ClockOffset::default().corrected(42), 42);
    }
}
