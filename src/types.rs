use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{CELL_COUNT, TEMP_COUNT};

/// Current telemetry used to populate emulated responses
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// State of charge, percent
    pub soc: u8,
    pub cell_v_min: f32,
    pub cell_v_max: f32,
    /// Degrees Celsius
    pub temp_min: f32,
    pub temp_max: f32,
    /// Volts
    pub pack_voltage: f32,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            soc: 80,
            cell_v_min: 3.35,
            cell_v_max: 3.35,
            temp_min: 25.0,
            temp_max: 25.0,
            pack_voltage: 53.6,
        }
    }
}

/// Static description of the emulated battery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryProfile {
    pub battery_number: u8,
    /// Nameplate capacity in Ah
    pub capacity_ah: u16,
    pub cycles: u16,
    pub manufacturer: String,
    pub firmware: String,
    pub serial: String,
}

impl Default for BatteryProfile {
    fn default() -> Self {
        Self {
            battery_number: 0,
            capacity_ah: 100,
            cycles: 50,
            manufacturer: "PYLONTECH".to_string(),
            firmware: "V1.0".to_string(),
            serial: "FAKE00001".to_string(),
        }
    }
}

/// Raw status bytes of an alarm response.
///
/// Per-cell, per-probe, current and voltage bytes: 0x00 normal, 0x01 below
/// limit, 0x02 above limit. Cell bytes also set bit 0x80 while balancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmBlock {
    pub cell_status: [u8; CELL_COUNT],
    pub temp_status: [u8; TEMP_COUNT],
    pub charge_current_status: u8,
    pub voltage_status: u8,
    pub discharge_current_status: u8,
    /// Protection flags, see [`StatusFlags`]
    pub protection: u8,
    /// Bit 0 charge FET, bit 1 discharge FET
    pub mosfet: u8,
    /// One bit per balancing cell
    pub balance: u16,
    pub operating_state: u8,
}

impl Default for AlarmBlock {
    fn default() -> Self {
        Self {
            cell_status: [0; CELL_COUNT],
            temp_status: [0; TEMP_COUNT],
            charge_current_status: 0,
            voltage_status: 0,
            discharge_current_status: 0,
            protection: 0,
            mosfet: 0x03,
            balance: 0,
            operating_state: 0,
        }
    }
}

/// Decoded analog value response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalogData {
    pub timestamp: DateTime<Utc>,
    pub info_flag: u8,
    pub battery_number: u8,
    /// Volts per cell
    pub cells: Vec<f32>,
    /// Degrees Celsius per probe
    pub temps: Vec<f32>,
    /// Amps, positive while charging
    pub current: Option<f32>,
    pub voltage: Option<f32>,
    pub remaining_ah: Option<f32>,
    pub total_ah: Option<f32>,
    pub cycles: Option<u16>,
}

impl AnalogData {
    /// Spread between the highest and lowest cell, in volts
    pub fn cell_imbalance(&self) -> Option<f32> {
        let max = self.cells.iter().copied().reduce(f32::max)?;
        let min = self.cells.iter().copied().reduce(f32::min)?;
        Some(max - min)
    }
}

/// Alarm raised by a decoded alarm response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmKind {
    ChargeOvercurrent,
    DischargeOvercurrent,
    PackUndervolt,
    PackOvervolt,
    ModuleOvervolt,
    ModuleUndervolt,
    Overtemp,
    Undertemp,
}

/// Protection flags from the status byte
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusFlags {
    pub raw: u8,
    pub module_overvolt: bool,
    pub module_undervolt: bool,
    pub charge_overcurrent: bool,
    pub discharge_overcurrent: bool,
    pub overtemp: bool,
    pub undertemp: bool,
}

impl StatusFlags {
    pub fn from_byte(raw: u8) -> Self {
        Self {
            raw,
            module_overvolt: raw & 0x01 != 0,
            module_undervolt: raw & 0x02 != 0,
            charge_overcurrent: raw & 0x04 != 0,
            discharge_overcurrent: raw & 0x08 != 0,
            overtemp: raw & 0x10 != 0,
            undertemp: raw & 0x20 != 0,
        }
    }

    /// Active flags as alarm kinds
    pub fn active(&self) -> Vec<AlarmKind> {
        [
            (self.module_overvolt, AlarmKind::ModuleOvervolt),
            (self.module_undervolt, AlarmKind::ModuleUndervolt),
            (self.charge_overcurrent, AlarmKind::ChargeOvercurrent),
            (self.discharge_overcurrent, AlarmKind::DischargeOvercurrent),
            (self.overtemp, AlarmKind::Overtemp),
            (self.undertemp, AlarmKind::Undertemp),
        ]
        .into_iter()
        .filter_map(|(on, kind)| on.then_some(kind))
        .collect()
    }
}

/// Decoded alarm response. Cell and probe numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmData {
    pub timestamp: DateTime<Utc>,
    pub info_flag: u8,
    pub battery_number: u8,
    pub num_cells: u8,
    pub balancing_cells: Vec<u8>,
    pub overvolt_cells: Vec<u8>,
    pub undervolt_cells: Vec<u8>,
    pub overtemp_sensors: Vec<u8>,
    pub undertemp_sensors: Vec<u8>,
    pub alarms: Vec<AlarmKind>,
    pub status: Option<StatusFlags>,
    /// Bit 0 charge FET, bit 1 discharge FET
    pub mosfet: Option<u8>,
    /// Balancing bitmap, bit 0 is cell 1
    pub balance: Option<u16>,
    /// 0 idle, 1 discharging, 2 charging
    pub operating_state: Option<u8>,
}
