//! Rollover-safe millisecond clock arithmetic.
//!
//! Every timestamp in this crate is a `u32` millisecond counter that wraps
//! after roughly 49.7 days. Durations are computed with wrapping subtraction,
//! which gives the true elapsed time as long as it is shorter than one full
//! counter period.

use std::cell::Cell;
use std::time::Instant;

/// Elapsed milliseconds from `last` to `now`, correct across counter wrap.
#[inline]
pub fn elapsed(now: u32, last: u32) -> u32 {
    now.wrapping_sub(last)
}

/// Source of the wrapping millisecond clock.
pub trait Clock {
    /// Current time in milliseconds, wrapping at `u32::MAX`
    fn now_ms(&self) -> u32;
}

/// Clock backed by [`Instant`], counting from construction.
///
/// Starts at 1 so that a sample taken immediately is never mistaken for the
/// "never published" sentinel.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        // Truncation is the wrap.
        (self.origin.elapsed().as_millis() as u32).wrapping_add(1)
    }
}

/// Manually advanced clock for replay and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u32>,
}

impl ManualClock {
    pub fn new(start: u32) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    /// Move the clock forward, wrapping past `u32::MAX`
    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }

    pub fn set(&self, ms: u32) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_plain() {
        assert_eq!(elapsed(5_000, 1_000), 4_000);
        assert_eq!(elapsed(1_000, 1_000), 0);
    }

    #[test]
    fn test_elapsed_across_wrap() {
        let last = u32::MAX - 499;
        let now = 500;
        assert_eq!(elapsed(now, last), 1_000);
    }

    #[test]
    fn test_manual_clock_wraps() {
        let clock = ManualClock::new(u32::MAX - 10);
        clock.advance(20);
        assert_eq!(clock.now_ms(), 9);
        assert_eq!(elapsed(clock.now_ms(), u32::MAX - 10), 20);
    }

    #[test]
    fn test_system_clock_never_reads_zero_at_start() {
        let clock = SystemClock::new();
        assert_ne!(clock.now_ms(), 0);
    }
}
