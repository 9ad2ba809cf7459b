//! Text validators for string-typed telemetry.
//!
//! Serial links flip bits. A flipped bit in a firmware string or alarm text
//! usually produces a non-printable byte or a value outside the small set a
//! device actually reports; these predicates catch that before the value is
//! gated or published. Known-token checks are substring matches so device
//! variants with extra decoration still pass.

const MONITOR_MODES: [&str; 11] = [
    "charger",
    "load",
    "dual",
    "bmv",
    "smartshunt",
    "battery",
    "monitor",
    "-1",
    "0",
    "1",
    "2",
];

const MODEL_IDENTIFIERS: [&str; 2] = ["SmartShunt", "BMV"];

/// True if every byte is printable ASCII (32..=126)
pub fn is_printable(s: &str) -> bool {
    s.bytes().all(|b| (32..=126).contains(&b))
}

fn basic(s: &str, max_len: usize) -> bool {
    !s.is_empty() && s.len() <= max_len && is_printable(s)
}

/// Model description, e.g. `SmartShunt 500A/50mV`
pub fn model_description(s: &str) -> bool {
    basic(s, 64) && MODEL_IDENTIFIERS.iter().any(|id| s.contains(id))
}

pub fn device_type(s: &str) -> bool {
    basic(s, 32) && s.bytes().next().is_some_and(|b| b.is_ascii_alphanumeric())
}

pub fn firmware_version(s: &str) -> bool {
    basic(s, 16) && s.bytes().any(|b| b.is_ascii_digit())
}

pub fn serial_number(s: &str) -> bool {
    (4..=32).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// DC monitor mode, either a known keyword or a numeric code
pub fn monitor_mode(s: &str) -> bool {
    if !basic(s, 64) {
        return false;
    }
    let lower = s.to_ascii_lowercase();
    MONITOR_MODES.iter().any(|mode| lower.contains(mode))
        || s.bytes().all(|b| b.is_ascii_digit() || b == b'-')
}

/// Alarm condition text (`on`, `off`, `OK`, `Alarm`...)
///
/// Strings of three characters or fewer only need to start with `o`, which
/// keeps abbreviations like `ON`/`OFF` passing.
pub fn alarm_condition(s: &str) -> bool {
    if !basic(s, 16) {
        return false;
    }
    let lower = s.to_ascii_lowercase();
    if lower.len() <= 3 {
        return lower.starts_with('o') || lower.contains("alarm");
    }
    lower == "on" || lower == "off" || lower.contains("alarm") || lower.contains("ok")
}

/// Free-form alarm reason
pub fn alarm_reason(s: &str) -> bool {
    basic(s, 64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printable() {
        assert!(is_printable("Hello ~"));
        assert!(!is_printable("bad\x07"));
        assert!(!is_printable("tab\t"));
        assert!(!is_printable("caf\u{e9}"));
    }

    #[test]
    fn test_model_description() {
        assert!(model_description("SmartShunt 500A/50mV"));
        assert!(model_description("BMV-712 Smart"));
        assert!(!model_description("SmartShu\x7Fnt"));
        assert!(!model_description("Unknown device"));
        assert!(!model_description(""));
        assert!(!model_description(&format!("BMV{}", "x".repeat(62))));
    }

    #[test]
    fn test_device_type() {
        assert!(device_type("0xA389"));
        assert!(!device_type("-A389"));
        assert!(!device_type(""));
    }

    #[test]
    fn test_firmware_version() {
        assert!(firmware_version("v4.16"));
        assert!(!firmware_version("vx.yy"));
        assert!(!firmware_version("v4.16-beta-build-123"));
    }

    #[test]
    fn test_serial_number() {
        assert!(serial_number("HQ2214-ABCD"));
        assert!(!serial_number("HQ2"));
        assert!(!serial_number("HQ22 14"));
        assert!(!serial_number(&"A".repeat(33)));
    }

    #[test]
    fn test_monitor_mode() {
        assert!(monitor_mode("Solar charger"));
        assert!(monitor_mode("SMARTSHUNT"));
        assert!(monitor_mode("-9"));
        assert!(monitor_mode("7"));
        assert!(!monitor_mode("xyz"));
        assert!(!monitor_mode("char\x01ger"));
    }

    #[test]
    fn test_alarm_condition() {
        assert!(alarm_condition("ON"));
        assert!(alarm_condition("off"));
        assert!(alarm_condition("o"));
        assert!(alarm_condition("Low batt alarm"));
        // 16 characters is the ceiling
        assert!(alarm_condition("Low volts alarm!"));
        assert!(!alarm_condition("Low voltage alarm"));
        assert!(alarm_condition("Status OK"));
        assert!(!alarm_condition("xx"));
        assert!(!alarm_condition("nothing"));
        assert!(!alarm_condition("a very long alarm string"));
    }

    #[test]
    fn test_alarm_reason() {
        assert!(alarm_reason("Low battery voltage"));
        assert!(!alarm_reason(""));
        assert!(!alarm_reason("bad\x00"));
    }
}
