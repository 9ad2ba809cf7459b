//! Gate Replay Example
//!
//! Replays a recorded stretch of monitor telemetry through the publication
//! gates and prints what would have been published. The recording contains a
//! voltage spike, an implausible current jump, a corrupted firmware string
//! and a relay that chatters before settling.
//!
//! Usage:
//!   cargo run --example gate_replay
//!   RUST_LOG=debug cargo run --example gate_replay

use log::{info, warn};
use pylon_bridge::publish::{MemorySink, PacedPublisher};
use pylon_bridge::validate;
use pylon_bridge::{
    BitflipTracker, BoolChannel, BridgeConfig, Clock, FloatChannel, ManualClock,
    RateLimitedFloatGate, Result, StableFloatChannel, StableFloatGate,
};

struct Sample {
    voltage: f32,
    current: f32,
    relay: bool,
    firmware: &'static str,
}

const fn sample(voltage: f32, current: f32, relay: bool, firmware: &'static str) -> Sample {
    Sample {
        voltage,
        current,
        relay,
        firmware,
    }
}

const RECORDING: [Sample; 8] = [
    sample(53.20, 4.1, false, "v4.16"),
    sample(53.21, 4.2, true, "v4.16"),
    sample(58.90, 4.2, false, "v4.16"),
    sample(53.22, 95.0, true, "v\u{1}.16"),
    sample(53.24, 4.3, true, "v4.16"),
    sample(53.23, 4.4, true, "v4.16"),
    sample(53.25, 6.0, true, "v4.16"),
    sample(53.24, 6.1, true, "v4.16"),
];

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = BridgeConfig::default();
    let clock = ManualClock::new(1);
    let mut publisher = PacedPublisher::new(MemorySink::default(), config.pacing());

    let voltage_gate = StableFloatGate::new(config.float_gate(0.05).with_range(40.0, 60.0), 0.2);
    let current_gate =
        RateLimitedFloatGate::new(config.float_gate(0.5).with_range(-200.0, 200.0), 20.0);
    let relay_gate = config.bool_gate();

    let mut voltage = StableFloatChannel::new();
    let mut current = FloatChannel::new();
    let mut relay = BoolChannel::new(false);
    let mut bitflips = BitflipTracker::new();

    for sample in RECORDING.iter() {
        clock.advance(1_000);
        let now = clock.now_ms();

        publisher.offer("monitor/voltage", &voltage_gate, &mut voltage, sample.voltage, now)?;
        publisher.offer("monitor/current", &current_gate, &mut current, sample.current, now)?;
        publisher.offer("monitor/relay", &relay_gate, &mut relay, sample.relay, now)?;

        if validate::firmware_version(sample.firmware) {
            publisher.publish("monitor/firmware", sample.firmware, true)?;
        } else {
            bitflips.record_event(now);
        }

        if bitflips.exceeds(now, config.bitflip_alarm_rate) {
            warn!(
                "Bitflip rate {:.1}/min above {:.1}/min",
                bitflips.rate_per_minute(now),
                config.bitflip_alarm_rate
            );
        }
    }

    for (channel, payload, retain) in &publisher.sink().published {
        info!("{:<18} {:>8} retain={}", channel, payload, retain);
    }
    info!("{} publications", publisher.count());
    Ok(())
}
