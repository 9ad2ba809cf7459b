//! Emulated BMS that answers inverter queries.
//!
//! The inverter polls a fixed address; every request is answered from the
//! current telemetry snapshot. Unknown commands get an "invalid CID2" return
//! code with an empty payload.

use log::{debug, info, warn};

use crate::constants::*;
use crate::error::{BridgeError, Result};
use crate::protocol::{alarm_info, analog_info, hex_encode, make_response, Frame};
use crate::transport::{Bus, Transport};
use crate::types::{AlarmBlock, BatteryProfile, Snapshot};

/// Live telemetry the responder reports.
pub trait TelemetrySource {
    fn snapshot(&self) -> Snapshot;

    /// Alarm status bytes; all normal unless overridden
    fn alarms(&self) -> AlarmBlock {
        AlarmBlock::default()
    }
}

impl TelemetrySource for Snapshot {
    fn snapshot(&self) -> Snapshot {
        *self
    }
}

/// Human-readable name of a command code
pub fn command_name(cid2: u8) -> &'static str {
    match cid2 {
        CID2_ANALOG => "GetAnalog",
        CID2_ALARM => "GetAlarm",
        CID2_SYSTEM_PARAM => "GetSysParam",
        CID2_MANUFACTURER => "GetMfr",
        CID2_FIRMWARE => "GetFirmware",
        CID2_SERIAL => "GetSerial",
        CID2_PROTOCOL_VERSION => "GetProtocol",
        _ => "Unknown",
    }
}

pub struct Responder<S: TelemetrySource> {
    address: u8,
    profile: BatteryProfile,
    source: S,
    served: u64,
}

impl<S: TelemetrySource> Responder<S> {
    pub fn new(address: u8, profile: BatteryProfile, source: S) -> Self {
        Self {
            address,
            profile,
            source,
            served: 0,
        }
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Requests answered so far
    pub fn served(&self) -> u64 {
        self.served
    }

    /// Build the encoded response to `request`.
    ///
    /// Analog and alarm answers carry the battery number asked for in the
    /// request INFO, falling back to the profile's.
    pub fn handle(&self, request: &Frame) -> Result<String> {
        let profile = &self.profile;
        let batt = request
            .info_bytes()
            .ok()
            .and_then(|bytes| bytes.first().copied())
            .unwrap_or(profile.battery_number);

        let (rtn, info) = match request.code {
            CID2_ANALOG => (RTN_OK, analog_info(&self.source.snapshot(), profile, batt)),
            CID2_ALARM => (RTN_OK, alarm_info(&self.source.alarms(), batt)),
            // info flag, battery count, cells per battery, reserved
            CID2_SYSTEM_PARAM => (RTN_OK, format!("0001{:02X}00", CELL_COUNT)),
            CID2_MANUFACTURER => (RTN_OK, hex_encode(profile.manufacturer.as_bytes())),
            CID2_FIRMWARE => (RTN_OK, hex_encode(profile.firmware.as_bytes())),
            CID2_SERIAL => (RTN_OK, hex_encode(profile.serial.as_bytes())),
            CID2_PROTOCOL_VERSION => (RTN_OK, "0020".to_string()),
            other => {
                warn!("Unknown CID2: 0x{:02X}", other);
                (RTN_CID2_INVALID, String::new())
            }
        };
        make_response(self.address, rtn, &info)
    }

    /// Wait for one request on `bus` and answer it.
    ///
    /// Returns `Ok(false)` when nothing addressed to us arrived before the
    /// transport timed out, or the request was malformed.
    pub fn serve_once<T: Transport>(&mut self, bus: &Bus<T>) -> Result<bool> {
        let mut port = bus.lock()?;

        let raw = match port.receive_frame() {
            Ok(raw) => raw,
            Err(BridgeError::Timeout) => return Ok(false),
            Err(e) => return Err(e),
        };

        let request = match Frame::parse(&raw) {
            Ok(request) => request,
            Err(e) => {
                warn!("Dropping request {:?}: {}", raw.trim_end(), e);
                return Ok(false);
            }
        };

        if request.address != self.address {
            debug!("Ignoring request for address {}", request.address);
            return Ok(false);
        }

        let response = self.handle(&request)?;
        port.send(response.as_bytes())?;

        self.served += 1;
        info!(
            "[{:4}] {} info={} -> {}",
            self.served,
            command_name(request.code),
            if request.info().is_empty() {
                "(none)"
            } else {
                request.info()
            },
            response.trim_end()
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{decode_alarm, decode_analog};
    use crate::protocol::{make_command, validate_response};
    use crate::transport::MemoryTransport;

    fn responder() -> Responder<Snapshot> {
        Responder::new(DEFAULT_ADDRESS, BatteryProfile::default(), Snapshot::default())
    }

    fn request(code: u8, info: &str) -> Frame {
        Frame::new(DEFAULT_ADDRESS, code, info).unwrap()
    }

    #[test]
    fn test_handle_analog() {
        let response = responder().handle(&request(CID2_ANALOG, "00")).unwrap();
        assert_eq!(validate_response(&response, 2), Ok(()));
        let frame = Frame::parse(&response).unwrap();
        let data = decode_analog(frame.info()).unwrap();
        assert_eq!(data.cells.len(), CELL_COUNT);
        assert_eq!(data.cycles, Some(50));
    }

    #[test]
    fn test_handle_echoes_requested_battery() {
        let r = responder();
        for (code, info) in [(CID2_ANALOG, "03"), (CID2_ALARM, "03")] {
            let frame = Frame::parse(&r.handle(&request(code, info)).unwrap()).unwrap();
            assert_eq!(&frame.info()[2..4], "03");
        }

        let frame = Frame::parse(&r.handle(&request(CID2_ALARM, "")).unwrap()).unwrap();
        let data = decode_alarm(frame.info()).unwrap();
        assert_eq!(data.battery_number, BatteryProfile::default().battery_number);
    }

    #[test]
    fn test_handle_info_queries() {
        let r = responder();
        let answer = |code| Frame::parse(&r.handle(&request(code, "")).unwrap()).unwrap();

        let firmware = answer(CID2_FIRMWARE);
        assert_eq!(firmware.info_bytes().unwrap(), b"V1.0".to_vec());

        let serial = answer(CID2_SERIAL);
        assert_eq!(serial.info_bytes().unwrap(), b"FAKE00001".to_vec());

        assert_eq!(answer(CID2_SYSTEM_PARAM).info(), "00011000");
        assert_eq!(answer(CID2_PROTOCOL_VERSION).info(), "0020");
    }

    #[test]
    fn test_handle_unknown_command() {
        let response = responder().handle(&request(0x99, "")).unwrap();
        let frame = Frame::parse(&response).unwrap();
        assert_eq!(frame.code, RTN_CID2_INVALID);
        assert!(frame.info().is_empty());
    }

    #[test]
    fn test_serve_once_round_trip() {
        let mut transport = MemoryTransport::new();
        transport.push_incoming(make_command(2, CID2_ALARM, 0));
        transport.push_incoming(make_command(7, CID2_ALARM, 0));
        transport.push_incoming("~garbage\r");
        let bus = Bus::new(transport);
        let mut r = responder();

        assert!(r.serve_once(&bus).unwrap());
        assert!(!r.serve_once(&bus).unwrap());
        assert!(!r.serve_once(&bus).unwrap());
        assert!(!r.serve_once(&bus).unwrap());
        assert_eq!(r.served(), 1);

        let sent = bus.into_inner().sent;
        assert_eq!(sent.len(), 1);
        assert_eq!(validate_response(&sent[0], 2), Ok(()));
    }

    #[test]
    fn test_command_name() {
        assert_eq!(command_name(0x42), "GetAnalog");
        assert_eq!(command_name(0x01), "Unknown");
    }
}
