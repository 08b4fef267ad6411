//! GRBL error and alarm code tables. Data, not logic — reproduced verbatim
//! from the GRBL v1.1 protocol.

/// Human-readable description for a GRBL `error:<N>` code (1-27).
/// Returns `"Unknown error"` for codes outside the table.
pub fn error_description(code: u32) -> &'static str {
    match code {
        1 => "Expected command letter",
        2 => "Bad number format",
        3 => "Invalid $ statement",
        4 => "Negative value",
        5 => "Homing not enabled",
        6 => "Step pulse too short",
        7 => "EEPROM read fail",
        8 => "Not idle",
        9 => "G-code lock",
        10 => "Soft limit",
        11 => "Overflow",
        12 => "Max step rate exceeded",
        13 => "Check door",
        14 => "Line length exceeded",
        15 => "Travel exceeded",
        16 => "Invalid jog command",
        17 => "Laser mode requires PWM",
        20 => "Unsupported command",
        21 => "Modal group violation",
        22 => "Undefined feed rate",
        23 => "Invalid G-code ID",
        24 => "Value word conflict",
        25 => "Self-referencing arc",
        26 => "No arc axis words",
        27 => "Unused value words",
        _ => "Unknown error",
    }
}

/// Human-readable description for a GRBL `ALARM:<N>` code (1-9).
/// Returns `"Unknown alarm"` for codes outside the table.
pub fn alarm_description(code: u32) -> &'static str {
    match code {
        1 => "Hard limit triggered",
        2 => "Soft limit alarm",
        3 => "Abort during cycle",
        4 => "Probe fail - not cleared",
        5 => "Probe fail - not contacted",
        6 => "Homing fail - reset",
        7 => "Homing fail - door",
        8 => "Homing fail - pull off",
        9 => "Homing fail - no switch",
        _ => "Unknown alarm",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_error_codes() {
        assert_eq!(error_description(20), "Unsupported command");
        assert_eq!(error_description(1), "Expected command letter");
    }

    #[test]
    fn unknown_error_code() {
        assert_eq!(error_description(255), "Unknown error");
    }

    #[test]
    fn known_alarm_codes() {
        assert_eq!(alarm_description(1), "Hard limit triggered");
    }

    #[test]
    fn unknown_alarm_code() {
        assert_eq!(alarm_description(99), "Unknown alarm");
    }
}
