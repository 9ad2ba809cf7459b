//! Protocol and timing constants.
//!
//! This module defines the constants used by the Pylontech RS485 framing,
//! the publication gates and the CAN frame watchdog.

/// Start-of-frame marker
pub const SOI: u8 = b'~';

/// End-of-frame marker
pub const EOI: u8 = b'\r';

/// Protocol version field
pub const VER: &str = "20";

/// Device class field (battery)
pub const CID1: &str = "46";

/// Shortest response that can carry a return code, LENID and checksum
pub const MIN_RESPONSE_LEN: usize = 18;

/// Largest INFO a LENID can describe, in hex characters
pub const MAX_INFO_LEN: usize = 0xFFF;

/// Default battery stack address
pub const DEFAULT_ADDRESS: u8 = 2;

/// Analog value query
pub const CID2_ANALOG: u8 = 0x42;

/// Alarm info query
pub const CID2_ALARM: u8 = 0x44;

/// System parameter query
pub const CID2_SYSTEM_PARAM: u8 = 0x4F;

/// Manufacturer info query
pub const CID2_MANUFACTURER: u8 = 0x61;

/// Firmware version query
pub const CID2_FIRMWARE: u8 = 0x62;

/// Serial number query
pub const CID2_SERIAL: u8 = 0x63;

/// Protocol version query
pub const CID2_PROTOCOL_VERSION: u8 = 0x90;

/// Return code: success
pub const RTN_OK: u8 = 0x00;

/// Return code: CID2 invalid
pub const RTN_CID2_INVALID: u8 = 0x04;

/// Cells reported per emulated battery
pub const CELL_COUNT: usize = 16;

/// Temperature probes reported per emulated battery
pub const TEMP_COUNT: usize = 4;

/// Offset between tenths-Kelvin and tenths-Celsius on the wire
pub const KELVIN_OFFSET_TENTHS: i32 = 2731;

/// Baud rate used by inverters speaking the protocol
pub const BAUD_RATE: u32 = 115_200;

/// Read timeout in milliseconds
pub const TIMEOUT_MS: u64 = 300;

/// Heartbeat interval for all gates
pub const HEARTBEAT_MS: u32 = 60_000;

/// Boolean debounce interval
pub const DEBOUNCE_MS: u32 = 2_000;

/// Samples held by a stability window
pub const STABILITY_WINDOW_SIZE: usize = 5;

/// Samples needed before a partially filled window counts as stable
pub const STABILITY_BOOTSTRAP_SAMPLES: usize = 3;

/// Bitflip tracking window (10 minutes)
pub const BITFLIP_WINDOW_MS: u32 = 600_000;

/// Floor applied to the bitflip elapsed time, in minutes
pub const BITFLIP_MIN_ELAPSED_MINUTES: f32 = 0.1;

/// Publications between cooperative pauses
pub const PACE_EVERY: u32 = 20;

/// Length of each cooperative pause
pub const PACE_PAUSE_MS: u64 = 10;

/// CAN identifiers expected on the bus
pub const EXPECTED_CAN_IDS: [u16; 5] = [0x351, 0x355, 0x359, 0x370, 0x35C];

/// Interval between CAN presence checks
pub const CAN_CHECK_INTERVAL_MS: u32 = 30_000;
