//! End-to-end tests: a polling client and the emulated responder sharing
//! frames, and a poll cycle pushing samples through gates into a sink.

use approx::assert_relative_eq;
use pylon_bridge::constants::{CID2_ALARM, CID2_ANALOG, HEARTBEAT_MS};
use pylon_bridge::protocol::{make_command, validate_response};
use pylon_bridge::publish::MemorySink;
use pylon_bridge::validate;
use pylon_bridge::*;
use std::time::Duration;

fn quiet_pacing() -> Pacing {
    Pacing {
        every: 20,
        pause: Duration::ZERO,
    }
}

#[test]
fn test_client_reads_emulated_battery() {
    let snapshot = Snapshot {
        soc: 64,
        cell_v_min: 3.28,
        cell_v_max: 3.31,
        temp_min: 18.5,
        temp_max: 22.0,
        pack_voltage: 52.6,
    };
    let responder = Responder::new(2, BatteryProfile::default(), snapshot);

    // Responder output becomes the client's scripted input.
    let answer = |cid2| {
        let request = Frame::parse(&make_command(2, cid2, 0)).unwrap();
        responder.handle(&request).unwrap()
    };
    let analog = answer(CID2_ANALOG);
    let alarm = answer(CID2_ALARM);
    let mut transport = MemoryTransport::new();
    transport.push_incoming(analog);
    transport.push_incoming(alarm);

    let bus = Bus::new(transport);
    let client = BmsClient::new(&bus, 2);

    let data = client.read_analog(0).unwrap();
    assert_eq!(data.cells.len(), 16);
    assert_relative_eq!(data.remaining_ah.unwrap(), 64.0);
    assert_relative_eq!(data.voltage.unwrap(), 52.6, epsilon = 0.002);

    let alarms = client.read_alarms(0).unwrap();
    assert!(alarms.alarms.is_empty());

    let sent = bus.into_inner().sent;
    assert_eq!(sent.len(), 2);
    assert!(sent[0].starts_with("~20024642"));
    assert!(sent[1].starts_with("~20024644"));
}

#[test]
fn test_golden_frame_validates_as_command_echo() {
    let frame = make_command(2, 0x42, 0);
    assert_eq!(frame, "~20024642E00200FD35\r");
    // A command carries CID2 where a response carries RTN.
    assert_eq!(
        validate_response(&frame, 2).unwrap_err(),
        ValidationError::ErrorCode {
            code: "42".to_string(),
            length: 20
        }
    );
}

#[test]
fn test_poll_cycle_publishes_selectively() {
    let clock = ManualClock::new(1);
    let mut publisher = PacedPublisher::new(MemorySink::default(), quiet_pacing());

    let soc_gate = IntGate::new(1).with_range(0, 100);
    let mut soc = IntChannel::new();
    let voltage_gate = StableFloatGate::new(FloatGate::new(0.05).with_range(40.0, 60.0), 0.2);
    let mut voltage = StableFloatChannel::new();
    let mut bitflips = BitflipTracker::new();

    let samples = [
        (80, 53.20),
        (80, 53.21),
        (80, 99.0), // out of range: dropped and counted
        (81, 53.22),
        (81, 53.19),
        (81, 53.20),
    ];

    for (soc_value, volts) in samples {
        clock.advance(1_000);
        let now = clock.now_ms();
        publisher
            .offer("battery/soc", &soc_gate, &mut soc, soc_value, now)
            .unwrap();
        if !voltage_gate.gate.admits(volts) {
            bitflips.record_event(now);
        }
        publisher
            .offer("battery/voltage", &voltage_gate, &mut voltage, volts, now)
            .unwrap();
    }

    let sink = publisher.into_sink();
    let soc_values: Vec<&str> = sink
        .published
        .iter()
        .filter(|(channel, _, _)| channel == "battery/soc")
        .map(|(_, payload, _)| payload.as_str())
        .collect();
    assert_eq!(soc_values, vec!["80", "81"]);

    let voltage_count = sink
        .published
        .iter()
        .filter(|(channel, _, _)| channel == "battery/voltage")
        .count();
    assert_eq!(voltage_count, 1);
    assert_eq!(bitflips.count(), 1);

    // Heartbeat forces the next voltage sample out.
    clock.advance(HEARTBEAT_MS);
    assert!(voltage_gate.check(&mut voltage, 53.2, clock.now_ms()));
}

#[test]
fn test_validators_screen_string_channels() {
    let readings = ["SmartShunt 500A/50mV", "Sm\u{7f}rtShunt", "BMV-712"];
    let accepted: Vec<&str> = readings
        .into_iter()
        .filter(|s| validate::model_description(s))
        .collect();
    assert_eq!(accepted, vec!["SmartShunt 500A/50mV", "BMV-712"]);
}
