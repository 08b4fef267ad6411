//! Controller state types.
//!
//! Types and pure mutators only; the observer-notification wiring lives in
//! [`super::observer`], and the algorithms that drive transitions live in
//! [`super::GrblController`].

use serde::{Deserialize, Serialize};

/// Firmware status as reflected by the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FirmwareStatus {
    Disconnected,
    Connecting,
    Idle,
    Run,
    Jog,
    Hold,
    Door,
    Home,
    Alarm,
    Check,
    Unknown,
}

impl FirmwareStatus {
    /// Maps a status-report state word (before any `:subcode`) to a
    /// firmware status. Unknown words map to `Unknown`.
    pub fn from_state_word(word: &str) -> Self {
        match word {
            "Idle" => FirmwareStatus::Idle,
            "Run" => FirmwareStatus::Run,
            "Jog" => FirmwareStatus::Jog,
            "Hold" => FirmwareStatus::Hold,
            "Door" => FirmwareStatus::Door,
            "Home" => FirmwareStatus::Home,
            "Alarm" => FirmwareStatus::Alarm,
            "Check" => FirmwareStatus::Check,
            _ => FirmwareStatus::Unknown,
        }
    }
}

/// A machine or work position. `z` defaults to 0 when a status report omits
/// it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Everything the controller knows about the firmware right now.
///
/// Single-writer (the RX worker, except during the connection setup path)
/// with many readers; readers accept a slightly stale snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    pub firmware_status: FirmwareStatus,
    pub machine_pos: Position,
    pub work_pos: Position,
    pub feed_rate: f64,
    pub spindle_speed: f64,
    pub firmware_version: String,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            firmware_status: FirmwareStatus::Disconnected,
            machine_pos: Position::default(),
            work_pos: Position::default(),
            feed_rate: 0.0,
            spindle_speed: 0.0,
            firmware_version: String::new(),
        }
    }
}

impl ControllerState {
    /// `true` once connected and the firmware status is Idle or Alarm (a
    /// board can still be interacted with mid-alarm).
    pub fn is_idle(&self) -> bool {
        matches!(
            self.firmware_status,
            FirmwareStatus::Idle | FirmwareStatus::Alarm
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_word_mapping() {
        assert_eq!(FirmwareStatus::from_state_word("Idle"), FirmwareStatus::Idle);
        assert_eq!(FirmwareStatus::from_state_word("Run"), FirmwareStatus::Run);
        assert_eq!(
            FirmwareStatus::from_state_word("Bogus"),
            FirmwareStatus::Unknown
        );
    }

    #[test]
    fn default_state_is_disconnected_at_origin() {
        let state = ControllerState::default();
        assert_eq!(state.firmware_status, FirmwareStatus::Disconnected);
        assert_eq!(state.machine_pos, Position::default());
        assert!(!state.is_idle());
    }

    #[test]
    fn idle_includes_alarm() {
        let mut state = ControllerState::default();
        state.firmware_status = FirmwareStatus::Alarm;
        assert!(state.is_idle());
    }
}
