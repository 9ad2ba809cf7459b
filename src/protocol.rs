use std::fmt::Write as _;

use crate::constants::*;
use crate::error::{BridgeError, Result, ValidationError};
use crate::types::{AlarmBlock, BatteryProfile, Snapshot};

/// One Pylontech RS485 frame.
///
/// On the wire: `~ VER ADR CID1 CODE LENID INFO CHKSUM \r`, all ASCII hex.
/// `code` is CID2 in a command and RTN in a response. `info` holds the
/// already hex-encoded payload: even length, hex digits only, at most
/// [`MAX_INFO_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub address: u8,
    pub code: u8,
    info: String,
}

/// Checksum over `body`: negated byte sum, 4 uppercase hex digits
pub fn checksum(body: &str) -> String {
    format!("{:04X}", checksum_value(body))
}

fn checksum_value(body: &str) -> u16 {
    let total = body.bytes().fold(0u32, |acc, b| acc.wrapping_add(u32::from(b)));
    ((!total).wrapping_add(1) & 0xFFFF) as u16
}

/// LENID field for an INFO of `info_len` hex characters, `None` past
/// [`MAX_INFO_LEN`].
///
/// The leading digit is the negated sum of the three length digits, masked
/// to 4 bits.
pub fn lenid(info_len: usize) -> Option<String> {
    (info_len <= MAX_INFO_LEN).then(|| lenid_field(info_len as u32))
}

fn lenid_field(len: u32) -> String {
    let digit_sum = (len >> 8) + ((len >> 4) & 0xF) + (len & 0xF);
    let lchksum = (!digit_sum).wrapping_add(1) & 0xF;
    format!("{:X}{:03X}", lchksum, len)
}

/// Upper-case hex encoding of raw bytes
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02X}", b);
    }
    out
}

fn check_info(info: &str) -> Result<()> {
    if info.len() > MAX_INFO_LEN {
        return Err(BridgeError::Parse(format!(
            "info too long: {} chars (max {})",
            info.len(),
            MAX_INFO_LEN
        )));
    }
    if info.len() % 2 != 0 || !info.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(BridgeError::Parse(format!("info is not even-length hex: {info:?}")));
    }
    Ok(())
}

impl Frame {
    /// Build a frame, rejecting INFO that is odd-length, non-hex or too long
    /// for LENID.
    pub fn new(address: u8, code: u8, info: impl Into<String>) -> Result<Self> {
        let info = info.into();
        check_info(&info)?;
        Ok(Self {
            address,
            code,
            info,
        })
    }

    /// Hex-encoded payload
    pub fn info(&self) -> &str {
        &self.info
    }

    /// Everything between `~` and the checksum
    pub fn body(&self) -> String {
        format!(
            "{VER}{:02X}{CID1}{:02X}{}{}",
            self.address,
            self.code,
            lenid_field(self.info.len() as u32),
            self.info
        )
    }

    /// Full wire text including `~`, checksum and terminator
    pub fn encode(&self) -> String {
        let body = self.body();
        let chk = checksum(&body);
        format!("~{body}{chk}\r")
    }

    /// Parse a complete frame, checking structure, LENID and checksum.
    ///
    /// A trailing `\r` is optional.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim_end_matches(['\r', '\n']);
        let body = text
            .strip_prefix('~')
            .ok_or_else(|| BridgeError::Parse("missing start of frame".to_string()))?;
        if !body.is_ascii() || body.len() < 16 {
            return Err(BridgeError::Parse(format!(
                "frame too short: {} chars",
                text.len()
            )));
        }

        let (content, received_chk) = body.split_at(body.len() - 4);
        if checksum(content) != received_chk {
            return Err(ValidationError::ChecksumMismatch.into());
        }

        if &content[0..2] != VER || &content[4..6] != CID1 {
            return Err(BridgeError::Parse(format!(
                "unsupported header {}",
                &content[0..6]
            )));
        }

        let address = parse_hex_u8(&content[2..4])?;
        let code = parse_hex_u8(&content[6..8])?;
        let lenid_field = &content[8..12];
        let info = &content[12..];

        // The declared length is compared unmasked against the real one.
        if lenid(info.len()).as_deref() != Some(lenid_field) {
            return Err(BridgeError::Parse(format!(
                "LENID {} does not match {} info chars",
                lenid_field,
                info.len()
            )));
        }

        Self::new(address, code, info)
    }

    /// Decode INFO back into raw bytes
    pub fn info_bytes(&self) -> Result<Vec<u8>> {
        (0..self.info.len())
            .step_by(2)
            .map(|i| {
                let pair = self.info.get(i..i + 2).ok_or_else(|| {
                    BridgeError::Parse(format!("odd-length info {:?}", self.info))
                })?;
                parse_hex_u8(pair)
            })
            .collect()
    }
}

fn parse_hex_u8(s: &str) -> Result<u8> {
    if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(BridgeError::Parse(format!("bad hex byte {s:?}")));
    }
    u8::from_str_radix(s, 16).map_err(|e| BridgeError::Parse(format!("bad hex {s:?}: {e}")))
}

/// Command frame asking battery `batt` at `addr` for `cid2`
pub fn make_command(addr: u8, cid2: u8, batt: u8) -> String {
    Frame {
        address: addr,
        code: cid2,
        info: format!("{:02X}", batt),
    }
    .encode()
}

/// Response frame with return code `rtn` and hex `info`
pub fn make_response(addr: u8, rtn: u8, info: &str) -> Result<String> {
    Ok(Frame::new(addr, rtn, info)?.encode())
}

/// Recompute and compare the checksum of a received frame.
///
/// The checksum covers everything after `~` up to the last four hex digits
/// before the terminator.
pub fn verify_checksum(response: &str) -> bool {
    let len = response.len();
    if len < 6 || !response.is_ascii() {
        return false;
    }
    let body = &response[1..len - 5];
    let received = &response[len - 5..len - 1];
    checksum(body) == received
}

/// Structural check of a response to a query sent to `expected_addr`.
pub fn validate_response(
    response: &str,
    expected_addr: u8,
) -> std::result::Result<(), ValidationError> {
    let len = response.len();
    let code = if response.is_ascii() {
        response.get(7..9)
    } else {
        None
    };

    if len < MIN_RESPONSE_LEN || code != Some("00") {
        return Err(ValidationError::ErrorCode {
            code: code.unwrap_or("?").to_string(),
            length: len,
        });
    }

    let field = &response[3..5];
    let actual = parse_hex_u8(field).map_err(|_| ValidationError::MalformedAddress {
        field: field.to_string(),
    })?;
    if actual != expected_addr {
        return Err(ValidationError::AddressMismatch {
            expected: expected_addr,
            actual,
        });
    }

    if !verify_checksum(response) {
        return Err(ValidationError::ChecksumMismatch);
    }

    Ok(())
}

/// INFO payload of an analog value response (CID2 0x42) for battery `batt`.
///
/// Cell voltages are spread -5/0/+5 mV around the min/max midpoint, the four
/// probes report min, mid, mid, max, and the current is always reported idle.
pub fn analog_info(snapshot: &Snapshot, profile: &BatteryProfile, batt: u8) -> String {
    let mut info = String::with_capacity(128);
    info.push_str("11");
    let _ = write!(info, "{:02X}", batt);
    let _ = write!(info, "{:02X}", CELL_COUNT);

    let cell_avg = (snapshot.cell_v_min + snapshot.cell_v_max) / 2.0;
    for i in 0..CELL_COUNT {
        let v = cell_avg + ((i % 3) as f32 - 1.0) * 0.005;
        let _ = write!(info, "{:04X}", to_u16(v * 1000.0));
    }

    let _ = write!(info, "{:02X}", TEMP_COUNT);
    let t_min = to_u16((snapshot.temp_min as f64 + 273.1) * 10.0) as u32;
    let t_max = to_u16((snapshot.temp_max as f64 + 273.1) * 10.0) as u32;
    let t_mid = (t_min + t_max) / 2;
    for t in [t_min, t_mid, t_mid, t_max] {
        let _ = write!(info, "{:04X}", t);
    }

    info.push_str("0000");
    let _ = write!(info, "{:04X}", to_u16(snapshot.pack_voltage * 1000.0));

    // 10 mAh units: soc% of capacity_ah * 100
    let remain = u32::from(snapshot.soc.min(100)) * u32::from(profile.capacity_ah);
    let _ = write!(info, "{:04X}", remain.min(0xFFFF));
    info.push_str("03");
    let _ = write!(info, "{:04X}", (u32::from(profile.capacity_ah) * 100).min(0xFFFF));
    let _ = write!(info, "{:04X}", profile.cycles);
    info
}

/// INFO payload of an alarm response (CID2 0x44) for battery `batt`.
///
/// After the cell and probe bytes come charge current, module voltage and
/// discharge current status, the protection byte, the MOSFET byte, the
/// balance bitmap and the operating state.
pub fn alarm_info(block: &AlarmBlock, batt: u8) -> String {
    let mut info = String::with_capacity(64);
    info.push_str("11");
    let _ = write!(info, "{:02X}", batt);
    let _ = write!(info, "{:02X}", CELL_COUNT);
    info.push_str(&hex_encode(&block.cell_status));
    let _ = write!(info, "{:02X}", TEMP_COUNT);
    info.push_str(&hex_encode(&block.temp_status));
    let _ = write!(
        info,
        "{:02X}{:02X}{:02X}{:02X}",
        block.charge_current_status,
        block.voltage_status,
        block.discharge_current_status,
        block.protection
    );
    let _ = write!(info, "{:02X}", block.mosfet);
    let _ = write!(info, "{:04X}", block.balance);
    let _ = write!(info, "{:02X}", block.operating_state);
    info
}

fn to_u16<F: Into<f64>>(value: F) -> u16 {
    let v: f64 = value.into();
    if v.is_nan() {
        return 0;
    }
    // Truncate toward zero, saturating at the field limits.
    v.clamp(0.0, f64::from(u16::MAX)) as u16
}
