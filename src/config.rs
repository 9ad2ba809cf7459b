//! Bridge configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::Result;
use crate::gate::{BoolGate, FloatGate};
use crate::publish::Pacing;
use crate::types::BatteryProfile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Serial device, e.g. `/dev/ttyUSB0`
    pub port: String,
    pub baud_rate: u32,
    /// Address the emulated battery answers on
    pub address: u8,
    pub timeout_ms: u64,
    pub heartbeat_ms: u32,
    pub debounce_ms: u32,
    /// Publications between pauses, 0 disables pacing
    pub pace_every: u32,
    pub pace_pause_ms: u64,
    pub can_check_interval_ms: u32,
    /// Bitflip rate (events/minute) above which a channel is flagged
    pub bitflip_alarm_rate: f32,
    pub battery: BatteryProfile,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: BAUD_RATE,
            address: DEFAULT_ADDRESS,
            timeout_ms: TIMEOUT_MS,
            heartbeat_ms: HEARTBEAT_MS,
            debounce_ms: DEBOUNCE_MS,
            pace_every: PACE_EVERY,
            pace_pause_ms: PACE_PAUSE_MS,
            can_check_interval_ms: CAN_CHECK_INTERVAL_MS,
            bitflip_alarm_rate: 1.0,
            battery: BatteryProfile::default(),
        }
    }
}

impl BridgeConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            every: self.pace_every,
            pause: Duration::from_millis(self.pace_pause_ms),
        }
    }

    /// Float gate carrying the configured heartbeat
    pub fn float_gate(&self, threshold: f32) -> FloatGate {
        FloatGate::new(threshold).with_heartbeat(self.heartbeat_ms)
    }

    pub fn bool_gate(&self) -> BoolGate {
        BoolGate {
            debounce_ms: self.debounce_ms,
        }
    }
}
