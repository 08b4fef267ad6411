//! Real-time and line-based GRBL commands.
//!
//! Real-time commands are single bytes with no newline, and bypass the
//! streaming engine's flow-control accounting entirely. Line commands carry
//! a trailing newline and are written through the same transport, but are
//! not accounted against `inflight`.

use std::fmt;

/// Single-byte real-time command. No newline; written directly to the
/// transport, bypassing flow control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RealtimeCommand {
    /// `?` — request a status report.
    StatusQuery,
    /// `!` — feed hold.
    FeedHold,
    /// `~` — cycle resume.
    CycleResume,
    /// `0x18` (Ctrl-X) — soft reset.
    SoftReset,
    /// `0x85` — jog cancel.
    JogCancel,
}

impl RealtimeCommand {
    /// The single byte to write to the transport.
    pub fn as_byte(self) -> u8 {
        match self {
            RealtimeCommand::StatusQuery => b'?',
            RealtimeCommand::FeedHold => b'!',
            RealtimeCommand::CycleResume => b'~',
            RealtimeCommand::SoftReset => 0x18,
            RealtimeCommand::JogCancel => 0x85,
        }
    }
}

impl fmt::Display for RealtimeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.as_byte())
    }
}

/// Jog mode: incremental (relative, `G91`, the default) or absolute (`G90`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JogMode {
    Incremental,
    Absolute,
}

/// Line-based GRBL command. Format with `Display` to get the text to send;
/// the caller appends the line terminator (matches [`super::super::gcode`]
/// command framing).
#[derive(Clone, Debug, PartialEq)]
pub enum LineCommand {
    /// `$H` — run the homing cycle.
    Home,
    /// `$X` — unlock after alarm.
    Unlock,
    /// `$$` — request all settings.
    SettingsRequest,
    /// `$G` — request parser state.
    ParserStateRequest,
    /// `$I` — request build info.
    BuildInfoRequest,
    /// `$J=<mode> [X][Y][Z] F<feed>` — jog.
    Jog {
        mode: JogMode,
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
        feed: f64,
    },
    /// `G92 X0 Y0...` — set work coordinate zero for the given axes.
    SetZero {
        x: bool,
        y: bool,
        z: bool,
    },
    /// Any other line the user (or collaborator) wants sent verbatim.
    Raw(String),
}

impl fmt::Display for LineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineCommand::Home => write!(f, "$H"),
            LineCommand::Unlock => write!(f, "$X"),
            LineCommand::SettingsRequest => write!(f, "$$"),
            LineCommand::ParserStateRequest => write!(f, "$G"),
            LineCommand::BuildInfoRequest => write!(f, "$I"),
            LineCommand::Jog {
                mode,
                x,
                y,
                z,
                feed,
            } => {
                let mode_str = match mode {
                    JogMode::Incremental => "G91",
                    JogMode::Absolute => "G90",
                };
                write!(f, "$J={}", mode_str)?;
                if let Some(x) = x {
                    if *x != 0.0 {
                        write!(f, " X{:.3}", x)?;
                    }
                }
                if let Some(y) = y {
                    if *y != 0.0 {
                        write!(f, " Y{:.3}", y)?;
                    }
                }
                if let Some(z) = z {
                    if *z != 0.0 {
                        write!(f, " Z{:.3}", z)?;
                    }
                }
                write!(f, " F{:.0}", feed)
            }
            LineCommand::SetZero { x, y, z } => {
                write!(f, "G92")?;
                if *x {
                    write!(f, " X0")?;
                }
                if *y {
                    write!(f, " Y0")?;
                }
                if *z {
                    write!(f, " Z0")?;
                }
                Ok(())
            }
            LineCommand::Raw(line) => write!(f, "{}", line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_bytes() {
        assert_eq!(RealtimeCommand::StatusQuery.as_byte(), b'?');
        assert_eq!(RealtimeCommand::FeedHold.as_byte(), b'!');
        assert_eq!(RealtimeCommand::CycleResume.as_byte(), b'~');
        assert_eq!(RealtimeCommand::SoftReset.as_byte(), 0x18);
        assert_eq!(RealtimeCommand::JogCancel.as_byte(), 0x85);
    }

    #[test]
    fn home_unlock_settings_display() {
        assert_eq!(LineCommand::Home.to_string(), "$H");
        assert_eq!(LineCommand::Unlock.to_string(), "$X");
        assert_eq!(LineCommand::SettingsRequest.to_string(), "$$");
        assert_eq!(LineCommand::ParserStateRequest.to_string(), "$G");
        assert_eq!(LineCommand::BuildInfoRequest.to_string(), "$I");
    }

    #[test]
    fn jog_display_omits_zero_axes() {
        let jog = LineCommand::Jog {
            mode: JogMode::Incremental,
            x: Some(10.0),
            y: Some(0.0),
            z: None,
            feed: 500.0,
        };
        assert_eq!(jog.to_string(), "$J=G91 X10.000 F500");
    }

    #[test]
    fn jog_display_absolute_all_axes() {
        let jog = LineCommand::Jog {
            mode: JogMode::Absolute,
            x: Some(1.5),
            y: Some(-2.25),
            z: Some(3.0),
            feed: 1000.0,
        };
        assert_eq!(jog.to_string(), "$J=G90 X1.500 Y-2.250 Z3.000 F1000");
    }

    #[test]
    fn set_zero_display() {
        assert_eq!(
            LineCommand::SetZero {
                x: true,
                y: true,
                z: false
            }
            .to_string(),
            "G92 X0 Y0"
        );
    }

    #[test]
    fn raw_line_display() {
        assert_eq!(
            LineCommand::Raw("G0 X10 Y20".to_string()).to_string(),
            "G0 X10 Y20"
        );
    }
}
