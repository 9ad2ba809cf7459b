//! Decoding of analog and alarm response payloads.
//!
//! Batteries in the field send payloads of varying completeness, so decoding
//! stops quietly at the first missing field and leaves the rest unset. Only
//! a header too short to identify the battery is an error.

use chrono::Utc;

use crate::constants::KELVIN_OFFSET_TENTHS;
use crate::error::{BridgeError, Result};
use crate::types::{AlarmData, AlarmKind, AnalogData, StatusFlags};

/// Sequential reader over an ASCII hex string
struct HexCursor<'a> {
    data: &'a str,
    pos: usize,
}

impl<'a> HexCursor<'a> {
    fn new(data: &'a str) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, digits: usize) -> Option<u32> {
        let field = self.data.get(self.pos..self.pos + digits)?;
        if !field.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let value = u32::from_str_radix(field, 16).ok()?;
        self.pos += digits;
        Some(value)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(2).map(|v| v as u8)
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(4).map(|v| v as u16)
    }

    fn skip(&mut self, digits: usize) -> Option<()> {
        self.data.get(self.pos..self.pos + digits)?;
        self.pos += digits;
        Some(())
    }
}

fn header(cursor: &mut HexCursor<'_>) -> Result<(u8, u8, u8)> {
    match (cursor.u8(), cursor.u8(), cursor.u8()) {
        (Some(flag), Some(battery), Some(cells)) => Ok((flag, battery, cells)),
        _ => Err(BridgeError::Parse("payload header truncated".to_string())),
    }
}

fn kelvin_tenths_to_celsius(raw: u16) -> f32 {
    let tenths = i32::from(raw) - KELVIN_OFFSET_TENTHS;
    tenths as f32 / 10.0
}

/// Decode the INFO of an analog value response (CID2 0x42)
pub fn decode_analog(info: &str) -> Result<AnalogData> {
    let mut cursor = HexCursor::new(info);
    let (info_flag, battery_number, num_cells) = header(&mut cursor)?;

    let cells = (0..num_cells)
        .map_while(|_| cursor.u16())
        .map(|mv| f32::from(mv) / 1000.0)
        .collect();

    let temps = match cursor.u8() {
        Some(n) => (0..n)
            .map_while(|_| cursor.u16())
            .map(kelvin_tenths_to_celsius)
            .collect(),
        None => Vec::new(),
    };

    // Signed, 10 mA units
    let current = cursor.u16().map(|raw| f32::from(raw as i16) / 100.0);
    let voltage = cursor.u16().map(|mv| f32::from(mv) / 1000.0);
    let remaining_ah = cursor.u16().map(|v| f32::from(v) / 100.0);
    // User-defined byte
    let _ = cursor.skip(2);
    let total_ah = cursor.u16().map(|v| f32::from(v) / 100.0);
    let cycles = cursor.u16();

    Ok(AnalogData {
        timestamp: Utc::now(),
        info_flag,
        battery_number,
        cells,
        temps,
        current,
        voltage,
        remaining_ah,
        total_ah,
        cycles,
    })
}

/// Decode the INFO of an alarm response (CID2 0x44)
pub fn decode_alarm(info: &str) -> Result<AlarmData> {
    let mut cursor = HexCursor::new(info);
    let (info_flag, battery_number, num_cells) = header(&mut cursor)?;

    let mut data = AlarmData {
        timestamp: Utc::now(),
        info_flag,
        battery_number,
        num_cells,
        balancing_cells: Vec::new(),
        overvolt_cells: Vec::new(),
        undervolt_cells: Vec::new(),
        overtemp_sensors: Vec::new(),
        undertemp_sensors: Vec::new(),
        alarms: Vec::new(),
        status: None,
        mosfet: None,
        balance: None,
        operating_state: None,
    };

    for cell in 1..=num_cells {
        let Some(status) = cursor.u8() else { break };
        if status & 0x80 != 0 {
            data.balancing_cells.push(cell);
        }
        match status {
            0x01 => data.undervolt_cells.push(cell),
            0x02 => data.overvolt_cells.push(cell),
            _ => {}
        }
    }

    let Some(num_temps) = cursor.u8() else {
        return Ok(data);
    };
    for probe in 1..=num_temps {
        let Some(status) = cursor.u8() else { break };
        match status {
            0x01 => data.undertemp_sensors.push(probe),
            0x02 => data.overtemp_sensors.push(probe),
            _ => {}
        }
    }

    if let (Some(charge), Some(voltage), Some(discharge)) = (cursor.u8(), cursor.u8(), cursor.u8())
    {
        // Only 0x01/0x02 are limit alarms; other values are status bits.
        if matches!(charge, 0x01 | 0x02) {
            data.alarms.push(AlarmKind::ChargeOvercurrent);
        }
        match voltage {
            0x01 => data.alarms.push(AlarmKind::PackUndervolt),
            0x02 => data.alarms.push(AlarmKind::PackOvervolt),
            _ => {}
        }
        if matches!(discharge, 0x01 | 0x02) {
            data.alarms.push(AlarmKind::DischargeOvercurrent);
        }

        if let Some(byte) = cursor.u8() {
            let flags = StatusFlags::from_byte(byte);
            for kind in flags.active() {
                if !data.alarms.contains(&kind) {
                    data.alarms.push(kind);
                }
            }
            data.status = Some(flags);
        }
    }

    data.mosfet = cursor.u8();
    data.balance = cursor.u16();
    if let Some(bitmap) = data.balance {
        for cell in 1..=num_cells.min(16) {
            if bitmap & (1 << (cell - 1)) != 0 && !data.balancing_cells.contains(&cell) {
                data.balancing_cells.push(cell);
            }
        }
        data.balancing_cells.sort_unstable();
    }
    data.operating_state = cursor.u8();

    Ok(data)
}
