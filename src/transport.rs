//! Byte transport and bus ownership.
//!
//! RS485 is half duplex: one request and its response must complete before
//! the next request goes out. [`Bus`] hands out a [`BusGuard`] for the whole
//! round trip; dropping the guard on any exit path frees the bus.

use std::cell::{RefCell, RefMut};
use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use log::{debug, warn};
use serialport::SerialPort;

use crate::constants::{BAUD_RATE, CID2_ALARM, CID2_ANALOG, EOI, SOI, TIMEOUT_MS};
use crate::decode::{decode_alarm, decode_analog};
use crate::error::{BridgeError, Result};
use crate::protocol::{make_command, validate_response, Frame};
use crate::types::{AlarmData, AnalogData};

/// Longest frame accepted before giving up on a terminator
pub const MAX_FRAME_LEN: usize = 512;

/// Raw frame transport.
pub trait Transport {
    /// Write one encoded frame
    fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Read one frame from `~` through `\r` inclusive.
    ///
    /// Returns [`BridgeError::Timeout`] if no complete frame arrives.
    fn receive_frame(&mut self) -> Result<String>;
}

/// Serial port transport
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open `port_name` at the protocol's default baud rate
    pub fn new(port_name: &str) -> Result<Self> {
        Self::with_settings(port_name, BAUD_RATE, Duration::from_millis(TIMEOUT_MS))
    }

    pub fn with_settings(port_name: &str, baud: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(port_name, baud).timeout(timeout).open()?;
        Ok(Self { port })
    }

    /// List available serial ports
    pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>> {
        Ok(serialport::available_ports()?)
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::Input)?;
        self.port.write_all(frame)?;
        self.port.flush()?;
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<String> {
        let mut frame = Vec::with_capacity(128);
        let mut byte = [0u8; 1];

        loop {
            match self.port.read(&mut byte) {
                Ok(0) => return Err(BridgeError::Timeout),
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::TimedOut => return Err(BridgeError::Timeout),
                Err(e) => return Err(e.into()),
            }

            // Line noise before the start marker is dropped.
            if frame.is_empty() && byte[0] != SOI {
                continue;
            }
            frame.push(byte[0]);

            if byte[0] == EOI {
                break;
            }
            if frame.len() > MAX_FRAME_LEN {
                return Err(BridgeError::Parse(format!(
                    "no terminator within {MAX_FRAME_LEN} bytes"
                )));
            }
        }

        String::from_utf8(frame).map_err(|e| BridgeError::Parse(e.to_string()))
    }
}

/// In-memory transport with scripted incoming frames.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    pub sent: Vec<String>,
    pub incoming: VecDeque<String>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame to be returned by the next receive
    pub fn push_incoming(&mut self, frame: impl Into<String>) {
        self.incoming.push_back(frame.into());
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.sent.push(String::from_utf8_lossy(frame).into_owned());
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<String> {
        self.incoming.pop_front().ok_or(BridgeError::Timeout)
    }
}

/// A transport that serves one transaction at a time.
#[derive(Debug)]
pub struct Bus<T: Transport> {
    transport: RefCell<T>,
}

/// Exclusive access to the bus for one request/response round trip.
pub struct BusGuard<'a, T: Transport> {
    transport: RefMut<'a, T>,
}

impl<T: Transport> Bus<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: RefCell::new(transport),
        }
    }

    /// Take the bus, failing with [`BridgeError::BusBusy`] if a transaction
    /// is already in flight
    pub fn lock(&self) -> Result<BusGuard<'_, T>> {
        let transport = self
            .transport
            .try_borrow_mut()
            .map_err(|_| BridgeError::BusBusy)?;
        Ok(BusGuard { transport })
    }

    pub fn is_busy(&self) -> bool {
        self.transport.try_borrow_mut().is_err()
    }

    pub fn into_inner(self) -> T {
        self.transport.into_inner()
    }
}

impl<T: Transport> Deref for BusGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> DerefMut for BusGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

/// Queries batteries on the bus
pub struct BmsClient<'a, T: Transport> {
    bus: &'a Bus<T>,
    address: u8,
}

impl<'a, T: Transport> BmsClient<'a, T> {
    pub fn new(bus: &'a Bus<T>, address: u8) -> Self {
        Self { bus, address }
    }

    /// Send one command and return the validated response
    pub fn query(&self, cid2: u8, battery: u8) -> Result<Frame> {
        let mut port = self.bus.lock()?;

        let command = make_command(self.address, cid2, battery);
        debug!("TX {}", command.trim_end());
        port.send(command.as_bytes())?;

        let response = port.receive_frame()?;
        debug!("RX {}", response.trim_end());

        if let Err(reason) = validate_response(&response, self.address) {
            warn!("Battery {} CID2 0x{:02X}: {}", battery, cid2, reason);
            return Err(reason.into());
        }

        Frame::parse(&response)
    }

    pub fn read_analog(&self, battery: u8) -> Result<AnalogData> {
        let frame = self.query(CID2_ANALOG, battery)?;
        decode_analog(frame.info())
    }

    pub fn read_alarms(&self, battery: u8) -> Result<AlarmData> {
        let frame = self.query(CID2_ALARM, battery)?;
        decode_alarm(frame.info())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::protocol::make_response;

    #[test]
    fn test_lock_is_exclusive_and_released() {
        let bus = Bus::new(MemoryTransport::new());
        {
            let _guard = bus.lock().unwrap();
            assert!(bus.is_busy());
            assert!(matches!(bus.lock(), Err(BridgeError::BusBusy)));
        }
        assert!(!bus.is_busy());
    }

    #[test]
    fn test_query_sends_command_and_validates() {
        let mut transport = MemoryTransport::new();
        transport.push_incoming(make_response(2, 0x00, "1100").unwrap());
        let bus = Bus::new(transport);
        let client = BmsClient::new(&bus, 2);

        let frame = client.query(CID2_ANALOG, 0).unwrap();
        assert_eq!(frame.info(), "1100");
        assert!(!bus.is_busy());
        assert_eq!(bus.into_inner().sent, vec!["~20024642E00200FD35\r".to_string()]);
    }

    #[test]
    fn test_query_releases_bus_on_failure() {
        let mut transport = MemoryTransport::new();
        transport.push_incoming(make_response(5, 0x00, "1100").unwrap());
        let bus = Bus::new(transport);
        let client = BmsClient::new(&bus, 2);

        let err = client.query(CID2_ANALOG, 0).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::InvalidFrame(ValidationError::AddressMismatch { expected: 2, actual: 5 })
        ));
        assert!(!bus.is_busy());

        assert!(matches!(client.query(CID2_ANALOG, 0), Err(BridgeError::Timeout)));
        assert!(!bus.is_busy());
    }
}
