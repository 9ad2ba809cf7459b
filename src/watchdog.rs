//! Presence watchdog for the periodic CAN frame set.
//!
//! The inverter side of the link broadcasts a fixed set of identifiers.
//! Content is not inspected here; the watchdog only notices identifiers that
//! went silent for a whole check interval. Nothing is reported until at
//! least one expected frame has been seen, so a bus that is still booting
//! does not raise alarms.

use log::warn;

use crate::clock::elapsed;
use crate::constants::{CAN_CHECK_INTERVAL_MS, EXPECTED_CAN_IDS};

#[derive(Debug, Clone)]
pub struct FrameWatchdog {
    expected: Vec<(u16, u32)>,
    interval_ms: u32,
    last_check: u32,
    seen_any: bool,
}

impl FrameWatchdog {
    /// Watch the standard identifier set with the default 30 s interval
    pub fn new(now: u32) -> Self {
        Self::with_ids(&EXPECTED_CAN_IDS, CAN_CHECK_INTERVAL_MS, now)
    }

    pub fn with_ids(ids: &[u16], interval_ms: u32, now: u32) -> Self {
        Self {
            expected: ids.iter().map(|&id| (id, 0)).collect(),
            interval_ms,
            last_check: now,
            seen_any: false,
        }
    }

    /// Count one received frame; unexpected identifiers are ignored
    pub fn observe(&mut self, id: u16) {
        if let Some((_, count)) = self.expected.iter_mut().find(|(expected, _)| *expected == id) {
            *count = count.saturating_add(1);
            self.seen_any = true;
        }
    }

    /// Observations of `id` since the last check
    pub fn count(&self, id: u16) -> Option<u32> {
        self.expected
            .iter()
            .find(|(expected, _)| *expected == id)
            .map(|&(_, count)| count)
    }

    /// Run the periodic check.
    ///
    /// Returns `None` until the interval has elapsed. When due, returns the
    /// identifiers that were not seen since the previous check (always empty
    /// before the first frame ever arrives) and restarts the counts.
    pub fn check(&mut self, now: u32) -> Option<Vec<u16>> {
        if elapsed(now, self.last_check) < self.interval_ms {
            return None;
        }
        self.last_check = now;

        let missing: Vec<u16> = if self.seen_any {
            self.expected
                .iter()
                .filter(|(_, count)| *count == 0)
                .map(|&(id, _)| id)
                .collect()
        } else {
            Vec::new()
        };

        for (_, count) in &mut self.expected {
            *count = 0;
        }

        if !missing.is_empty() {
            let ids: Vec<String> = missing.iter().map(|id| format!("0x{:03X}", id)).collect();
            warn!("CAN frames missing: {}", ids.join(", "));
        }
        Some(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_due_before_interval() {
        let mut watchdog = FrameWatchdog::new(1_000);
        assert_eq!(watchdog.check(1_000 + CAN_CHECK_INTERVAL_MS - 1), None);
    }

    #[test]
    fn test_silent_bus_reports_nothing() {
        let mut watchdog = FrameWatchdog::new(1_000);
        assert_eq!(watchdog.check(1_000 + CAN_CHECK_INTERVAL_MS), Some(vec![]));
    }

    #[test]
    fn test_missing_ids_reported() {
        let mut watchdog = FrameWatchdog::new(0);
        for id in [0x351, 0x355, 0x359, 0x123] {
            watchdog.observe(id);
        }
        assert_eq!(watchdog.count(0x351), Some(1));
        assert_eq!(watchdog.count(0x123), None);
        assert_eq!(watchdog.check(30_000), Some(vec![0x370, 0x35C]));

        // Counts restart after each check.
        watchdog.observe(0x370);
        assert_eq!(
            watchdog.check(60_000),
            Some(vec![0x351, 0x355, 0x359, 0x35C])
        );
    }

    #[test]
    fn test_check_across_clock_wrap() {
        let start = u32::MAX - 5_000;
        let mut watchdog = FrameWatchdog::new(start);
        for id in EXPECTED_CAN_IDS {
            watchdog.observe(id);
        }
        assert_eq!(watchdog.check(start.wrapping_add(10_000)), None);
        assert_eq!(watchdog.check(start.wrapping_add(30_000)), Some(vec![]));
    }
}
