//! Paced publication of gated values.
//!
//! Right after a reconnect every channel tends to pass its gate at once. The
//! [`PacedPublisher`] inserts a short pause every few publications so such a
//! burst does not saturate the link or starve the rest of the poll loop. It
//! paces call volume only; what gets published is the gates' business.

use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::constants::{PACE_EVERY, PACE_PAUSE_MS};
use crate::error::Result;
use crate::format::BoundedBuf;
use crate::gate::Gate;

/// Longest rendered payload
pub const PAYLOAD_CAPACITY: usize = 64;

/// Receiver of accepted values (an MQTT client in practice).
pub trait PublishSink {
    fn publish(&mut self, channel: &str, payload: &str, retain: bool) -> Result<()>;
}

/// Sink that stores publications in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub published: Vec<(String, String, bool)>,
}

impl PublishSink for MemorySink {
    fn publish(&mut self, channel: &str, payload: &str, retain: bool) -> Result<()> {
        self.published
            .push((channel.to_string(), payload.to_string(), retain));
        Ok(())
    }
}

/// Pause schedule: one pause of `pause` every `every` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub every: u32,
    pub pause: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            every: PACE_EVERY,
            pause: Duration::from_millis(PACE_PAUSE_MS),
        }
    }
}

/// Counts publications and says when to pause.
#[derive(Debug, Clone, Default)]
pub struct PaceCounter {
    pacing: Pacing,
    count: u64,
}

impl PaceCounter {
    pub fn new(pacing: Pacing) -> Self {
        Self { pacing, count: 0 }
    }

    /// Count one call; returns the pause owed before returning, if any
    pub fn tick(&mut self) -> Option<Duration> {
        self.count += 1;
        if self.pacing.every > 0 && self.count % u64::from(self.pacing.every) == 0 {
            Some(self.pacing.pause)
        } else {
            None
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Gate-aware publisher that paces outgoing calls.
pub struct PacedPublisher<S: PublishSink> {
    sink: S,
    pace: PaceCounter,
    payload: BoundedBuf<PAYLOAD_CAPACITY>,
    truncation_logged: bool,
}

/// Outcome of rendering and sending one payload
enum Delivery {
    Withheld,
    /// Sent; pause this long before the next publish
    Sent(Option<Duration>),
}

impl<S: PublishSink> PacedPublisher<S> {
    pub fn new(sink: S, pacing: Pacing) -> Self {
        Self {
            sink,
            pace: PaceCounter::new(pacing),
            payload: BoundedBuf::new(),
            truncation_logged: false,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Total publications handed to the sink
    pub fn count(&self) -> u64 {
        self.pace.count()
    }

    /// Render `value` and hand it to the sink, pausing every Nth call.
    ///
    /// Returns `Ok(false)` if the payload did not fit and was withheld.
    pub fn publish<V: std::fmt::Display>(
        &mut self,
        channel: &str,
        value: V,
        retain: bool,
    ) -> Result<bool> {
        match self.deliver(channel, value, retain)? {
            Delivery::Withheld => Ok(false),
            Delivery::Sent(pause) => {
                if let Some(pause) = pause {
                    thread::sleep(pause);
                }
                Ok(true)
            }
        }
    }

    /// Async flavour of [`publish`](Self::publish) that yields to the runtime
    /// instead of blocking the thread.
    #[cfg(feature = "async")]
    pub async fn publish_async<V: std::fmt::Display>(
        &mut self,
        channel: &str,
        value: V,
        retain: bool,
    ) -> Result<bool> {
        match self.deliver(channel, value, retain)? {
            Delivery::Withheld => Ok(false),
            Delivery::Sent(pause) => {
                if let Some(pause) = pause {
                    tokio::time::sleep(pause).await;
                }
                Ok(true)
            }
        }
    }

    fn deliver<V: std::fmt::Display>(
        &mut self,
        channel: &str,
        value: V,
        retain: bool,
    ) -> Result<Delivery> {
        let payload = match self.payload.format(format_args!("{value}")) {
            Ok(payload) => payload,
            Err(truncated) => {
                if !self.truncation_logged {
                    warn!("{channel}: {truncated}");
                    self.truncation_logged = true;
                }
                return Ok(Delivery::Withheld);
            }
        };

        debug!("publish {channel} = {payload}");
        self.sink.publish(channel, payload, retain)?;
        Ok(Delivery::Sent(self.pace.tick()))
    }

    /// Run `value` through `gate` and publish the gate's output if accepted.
    ///
    /// Returns whether a publication happened.
    pub fn offer<G: Gate>(
        &mut self,
        channel: &str,
        gate: &G,
        state: &mut G::State,
        value: G::Value,
        now: u32,
    ) -> Result<bool> {
        if !gate.check(state, value, now) {
            return Ok(false);
        }
        let output = gate.output(state);
        self.publish(channel, output, false)
    }
}
