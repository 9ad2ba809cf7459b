//! Sliding stability window.
//!
//! Holds the last five samples of a channel and decides whether the channel
//! has settled. A single-sample spike widens the range past the stability
//! threshold and holds publication back until it ages out of the window.

use crate::constants::{STABILITY_BOOTSTRAP_SAMPLES, STABILITY_WINDOW_SIZE};

/// Circular buffer of the most recent samples of one channel.
#[derive(Debug, Clone)]
pub struct StabilityWindow {
    values: [f32; STABILITY_WINDOW_SIZE],
    count: usize,
    index: usize,
    /// Average last accepted as output, NaN until seeded
    pub last_published: f32,
}

impl Default for StabilityWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl StabilityWindow {
    pub fn new() -> Self {
        Self {
            values: [f32::NAN; STABILITY_WINDOW_SIZE],
            count: 0,
            index: 0,
            last_published: f32::NAN,
        }
    }

    /// Number of samples collected so far (saturates at capacity)
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == STABILITY_WINDOW_SIZE
    }

    /// Overwrite the oldest slot with `value`
    pub fn add(&mut self, value: f32) {
        self.values[self.index] = value;
        self.index = (self.index + 1) % STABILITY_WINDOW_SIZE;
        if self.count < STABILITY_WINDOW_SIZE {
            self.count += 1;
        }
    }

    fn samples(&self) -> impl Iterator<Item = f32> + '_ {
        // Until the buffer wraps, slots 0..count are exactly the written ones.
        self.values[..self.count].iter().copied().filter(|v| !v.is_nan())
    }

    /// Spread (max - min) of the valid samples, 0 with fewer than two
    pub fn range(&self) -> f32 {
        let mut valid = 0usize;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for v in self.samples() {
            valid += 1;
            min = min.min(v);
            max = max.max(v);
        }
        if valid < 2 {
            return 0.0;
        }
        max - min
    }

    /// A partial window is stable once it holds three samples; a full one
    /// is stable while its range stays within `threshold`.
    pub fn is_stable(&self, threshold: f32) -> bool {
        if self.count < STABILITY_WINDOW_SIZE {
            return self.count >= STABILITY_BOOTSTRAP_SAMPLES;
        }
        self.range() <= threshold
    }

    /// Mean of the valid samples, NaN if there are none
    pub fn average(&self) -> f32 {
        let (sum, n) = self
            .samples()
            .fold((0.0f32, 0u32), |(sum, n), v| (sum + v, n + 1));
        if n == 0 {
            f32::NAN
        } else {
            sum / n as f32
        }
    }

    /// Drop all samples and the published baseline
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}
