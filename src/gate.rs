//! Publication gates.
//!
//! A gate decides, sample by sample, whether a channel's new reading is worth
//! forwarding. Every numeric variant shares one rule: publish the first valid
//! sample, publish when the value moved by at least the threshold, and
//! publish anyway once the heartbeat interval has passed. Invalid input
//! (NaN, infinite, out of range) never touches the channel state.
//!
//! Gates are immutable parameter sets; the per-channel state lives in a
//! separate struct owned by the caller and is passed in by `&mut`.
//!
//! `last_publish == 0` means "never published". A clock that genuinely reads
//! 0 at publish time makes the next sample look like a first sample and
//! publish again; [`SystemClock`](crate::clock::SystemClock) starts at 1 to
//! stay clear of this.

use std::fmt;

use log::warn;

use crate::clock::elapsed;
use crate::constants::{DEBOUNCE_MS, HEARTBEAT_MS};
use crate::stability::StabilityWindow;

/// Common shape of every gate variant.
pub trait Gate {
    /// Sample type accepted by the gate
    type Value: Copy + fmt::Display;
    /// Per-channel state mutated on publish
    type State;

    /// Returns true if the sample should be published now. State is only
    /// updated when the sample is accepted.
    fn check(&self, state: &mut Self::State, value: Self::Value, now: u32) -> bool;

    /// Value to emit after `check` returned true
    fn output(&self, state: &Self::State) -> Self::Value;
}

/// State of a float channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatChannel {
    /// NaN until the first sample is accepted
    pub last_value: f32,
    /// Wrapping ms timestamp of the last publish, 0 = never
    pub last_publish: u32,
}

impl Default for FloatChannel {
    fn default() -> Self {
        Self {
            last_value: f32::NAN,
            last_publish: 0,
        }
    }
}

impl FloatChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn accept(&mut self, value: f32, now: u32) {
        self.last_value = value;
        self.last_publish = now;
    }
}

/// Threshold/heartbeat gate for float channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatGate {
    pub threshold: f32,
    pub min: f32,
    pub max: f32,
    pub heartbeat_ms: u32,
}

impl FloatGate {
    /// Unbounded gate with the default 60 s heartbeat
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            min: f32::NEG_INFINITY,
            max: f32::INFINITY,
            heartbeat_ms: HEARTBEAT_MS,
        }
    }

    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_heartbeat(mut self, heartbeat_ms: u32) -> Self {
        self.heartbeat_ms = heartbeat_ms;
        self
    }

    /// Finite and within `[min, max]`
    pub fn admits(&self, value: f32) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    fn is_first(&self, state: &FloatChannel) -> bool {
        state.last_publish == 0 || !self.admits(state.last_value)
    }

    fn changed_or_due(&self, baseline: f32, value: f32, last_publish: u32, now: u32) -> bool {
        (value - baseline).abs() >= self.threshold
            || elapsed(now, last_publish) >= self.heartbeat_ms
    }
}

impl Gate for FloatGate {
    type Value = f32;
    type State = FloatChannel;

    fn check(&self, state: &mut FloatChannel, value: f32, now: u32) -> bool {
        if !self.admits(value) {
            return false;
        }

        if self.is_first(state)
            || self.changed_or_due(state.last_value, value, state.last_publish, now)
        {
            state.accept(value, now);
            return true;
        }

        false
    }

    fn output(&self, state: &FloatChannel) -> f32 {
        state.last_value
    }
}

/// Float gate that vetoes physically implausible jumps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitedFloatGate {
    pub gate: FloatGate,
    /// Largest believable change per second
    pub max_rate_per_sec: f32,
}

impl RateLimitedFloatGate {
    pub fn new(gate: FloatGate, max_rate_per_sec: f32) -> Self {
        Self {
            gate,
            max_rate_per_sec,
        }
    }
}

impl Gate for RateLimitedFloatGate {
    type Value = f32;
    type State = FloatChannel;

    fn check(&self, state: &mut FloatChannel, value: f32, now: u32) -> bool {
        if !self.gate.admits(value) {
            return false;
        }

        if self.gate.is_first(state) {
            state.accept(value, now);
            return true;
        }

        let delta_ms = elapsed(now, state.last_publish);
        if delta_ms > 0 {
            let rate = (value - state.last_value).abs() / (delta_ms as f32 / 1000.0);
            if rate > self.max_rate_per_sec {
                warn!(
                    "Rate limit: {:.2}/sec (max {:.2}/sec)",
                    rate, self.max_rate_per_sec
                );
                return false;
            }
        }

        if self
            .gate
            .changed_or_due(state.last_value, value, state.last_publish, now)
        {
            state.accept(value, now);
            return true;
        }

        false
    }

    fn output(&self, state: &FloatChannel) -> f32 {
        state.last_value
    }
}

/// State of a stability-filtered float channel.
#[derive(Debug, Clone, Default)]
pub struct StableFloatChannel {
    pub channel: FloatChannel,
    pub window: StabilityWindow,
}

impl StableFloatChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel that already published `value` at `now`, with an empty window
    pub fn with_baseline(value: f32, now: u32) -> Self {
        let mut state = Self::default();
        state.channel.accept(value, now);
        state.window.last_published = value;
        state
    }
}

/// Float gate that only publishes the smoothed value of a settled window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StableFloatGate {
    pub gate: FloatGate,
    /// Largest window range still considered settled
    pub stability_threshold: f32,
}

impl StableFloatGate {
    pub fn new(gate: FloatGate, stability_threshold: f32) -> Self {
        Self {
            gate,
            stability_threshold,
        }
    }
}

impl Gate for StableFloatGate {
    type Value = f32;
    type State = StableFloatChannel;

    fn check(&self, state: &mut StableFloatChannel, value: f32, now: u32) -> bool {
        if !self.gate.admits(value) {
            return false;
        }

        let StableFloatChannel { channel, window } = state;
        window.add(value);

        if channel.last_publish == 0 || channel.last_value.is_nan() {
            channel.accept(value, now);
            window.last_published = value;
            return true;
        }

        if !window.is_stable(self.stability_threshold) {
            return false;
        }

        let average = window.average();
        if self
            .gate
            .changed_or_due(window.last_published, average, channel.last_publish, now)
        {
            channel.accept(average, now);
            window.last_published = average;
            return true;
        }

        false
    }

    fn output(&self, state: &StableFloatChannel) -> f32 {
        state.window.last_published
    }
}

/// State of an integer channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntChannel {
    /// `None` until the first sample is accepted
    pub last_value: Option<i32>,
    pub last_publish: u32,
}

impl IntChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Threshold/heartbeat gate for integer channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntGate {
    pub threshold: i32,
    pub min: i32,
    pub max: i32,
    pub heartbeat_ms: u32,
}

impl Default for IntGate {
    fn default() -> Self {
        Self {
            threshold: 1,
            min: i32::MIN,
            max: i32::MAX,
            heartbeat_ms: HEARTBEAT_MS,
        }
    }
}

impl IntGate {
    pub fn new(threshold: i32) -> Self {
        Self {
            threshold,
            ..Default::default()
        }
    }

    pub fn with_range(mut self, min: i32, max: i32) -> Self {
        self.min = min;
        self.max = max;
        self
    }
}

impl Gate for IntGate {
    type Value = i32;
    type State = IntChannel;

    fn check(&self, state: &mut IntChannel, value: i32, now: u32) -> bool {
        if value < self.min || value > self.max {
            return false;
        }

        let publish = match state.last_value {
            None => true,
            Some(_) if state.last_publish == 0 => true,
            Some(last) if last < self.min || last > self.max => true,
            Some(last) => {
                // Widen before subtracting; i32::MIN..i32::MAX spans overflow i32.
                (i64::from(value) - i64::from(last)).abs() >= i64::from(self.threshold)
                    || elapsed(now, state.last_publish) >= self.heartbeat_ms
            }
        };

        if publish {
            state.last_value = Some(value);
            state.last_publish = now;
        }
        publish
    }

    fn output(&self, state: &IntChannel) -> i32 {
        state.last_value.unwrap_or_default()
    }
}

/// Debounce phase of a boolean channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Debounce {
    /// Reading agrees with the published value
    Stable,
    /// A different reading was seen at `since` and is waiting to settle
    PendingChange { value: bool, since: u32 },
}

/// State of a boolean channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoolChannel {
    pub last_stable: bool,
    pub phase: Debounce,
}

impl Default for BoolChannel {
    fn default() -> Self {
        Self::new(false)
    }
}

impl BoolChannel {
    pub fn new(initial: bool) -> Self {
        Self {
            last_stable: initial,
            phase: Debounce::Stable,
        }
    }

    pub fn has_pending(&self) -> bool {
        matches!(self.phase, Debounce::PendingChange { .. })
    }
}

/// Debounce gate for boolean channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoolGate {
    pub debounce_ms: u32,
}

impl Default for BoolGate {
    fn default() -> Self {
        Self {
            debounce_ms: DEBOUNCE_MS,
        }
    }
}

impl Gate for BoolGate {
    type Value = bool;
    type State = BoolChannel;

    fn check(&self, state: &mut BoolChannel, value: bool, now: u32) -> bool {
        if value == state.last_stable {
            // Back to the published value: any pending change was noise.
            state.phase = Debounce::Stable;
            return false;
        }

        match state.phase {
            Debounce::PendingChange { value: pending, since } if pending == value => {
                if elapsed(now, since) >= self.debounce_ms {
                    state.last_stable = value;
                    state.phase = Debounce::Stable;
                    return true;
                }
                false
            }
            _ => {
                state.phase = Debounce::PendingChange { value, since: now };
                false
            }
        }
    }

    fn output(&self, state: &BoolChannel) -> bool {
        state.last_stable
    }
}
