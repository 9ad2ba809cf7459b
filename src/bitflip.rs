//! Bitflip rate tracking.
//!
//! Counts anomalous readings (values that failed validation, implausible
//! jumps) in a fixed 10-minute window and reports an events/minute rate.
//! The rate is a health signal; callers decide what to do with it.

use crate::clock::elapsed;
use crate::constants::{BITFLIP_MIN_ELAPSED_MINUTES, BITFLIP_WINDOW_MS};

/// Event counter over a fixed window.
///
/// `window_start == 0` means no event has ever been recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitflipTracker {
    count: u32,
    window_start: u32,
}

impl BitflipTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events counted in the current window
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn window_start(&self) -> u32 {
        self.window_start
    }

    /// Record one anomalous event at `now`
    pub fn record_event(&mut self, now: u32) {
        if self.window_start == 0 {
            self.window_start = now;
            self.count = 1;
            return;
        }

        if elapsed(now, self.window_start) >= BITFLIP_WINDOW_MS {
            self.count = 1;
            self.window_start = now;
        } else {
            self.count += 1;
        }
    }

    /// Events per minute in the open window, 0 once it has expired
    pub fn rate_per_minute(&self, now: u32) -> f32 {
        if self.count == 0 || self.window_start == 0 {
            return 0.0;
        }

        let since = elapsed(now, self.window_start);
        if since >= BITFLIP_WINDOW_MS {
            return 0.0;
        }

        let minutes = (since as f32 / 60_000.0).max(BITFLIP_MIN_ELAPSED_MINUTES);
        self.count as f32 / minutes
    }

    /// True if the current rate is strictly above `limit` events/minute
    pub fn exceeds(&self, now: u32, limit: f32) -> bool {
        self.rate_per_minute(now) > limit
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fresh_tracker_reports_zero() {
        let tracker = BitflipTracker::new();
        assert_eq!(tracker.rate_per_minute(123_456), 0.0);
    }

    #[test]
    fn test_three_events_in_first_minute() {
        let mut tracker = BitflipTracker::new();
        tracker.record_event(1_000);
        tracker.record_event(20_000);
        tracker.record_event(40_000);
        assert_eq!(tracker.count(), 3);
        assert_relative_eq!(tracker.rate_per_minute(61_000), 3.0);
    }

    #[test]
    fn test_floor_applies_right_after_open() {
        let mut tracker = BitflipTracker::new();
        tracker.record_event(10_000);
        tracker.record_event(10_500);
        // 500 ms elapsed is floored to 0.1 minute.
        assert_relative_eq!(tracker.rate_per_minute(10_500), 20.0);
    }

    #[test]
    fn test_window_expiry() {
        let mut tracker = BitflipTracker::new();
        tracker.record_event(1_000);
        tracker.record_event(2_000);
        assert_eq!(tracker.rate_per_minute(1_000 + BITFLIP_WINDOW_MS), 0.0);

        tracker.record_event(1_000 + BITFLIP_WINDOW_MS);
        assert_eq!(tracker.count(), 1);
        assert_eq!(tracker.window_start(), 1_000 + BITFLIP_WINDOW_MS);
    }

    #[test]
    fn test_window_survives_clock_wrap() {
        let mut tracker = BitflipTracker::new();
        let start = u32::MAX - 30_000;
        tracker.record_event(start);
        tracker.record_event(start.wrapping_add(60_000));
        assert_eq!(tracker.count(), 2);
        assert_relative_eq!(tracker.rate_per_minute(start.wrapping_add(60_000)), 2.0);
        assert!(tracker.exceeds(start.wrapping_add(60_000), 1.5));
    }
}
