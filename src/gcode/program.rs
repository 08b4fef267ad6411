//! The program model: an ordered sequence of commands with per-line status,
//! plus bounding-box and toolpath derivations.

use super::line;
use std::fmt;

/// Lifecycle of a single command within one streaming run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandStatus {
    Queued,
    Sent,
    Ok,
    Error,
}

/// A single line of a program, in both its original and canonical form.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    raw: String,
    normalized: String,
    status: CommandStatus,
    error_code: Option<u32>,
}

impl Command {
    fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = line::normalize(&raw);
        Self {
            raw,
            normalized,
            status: CommandStatus::Queued,
            error_code: None,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn status(&self) -> CommandStatus {
        self.status
    }

    pub fn error_code(&self) -> Option<u32> {
        self.error_code
    }

    /// Bytes sent to the transport for this command.
    pub fn serial_bytes(&self) -> Vec<u8> {
        line::serial_bytes(&self.normalized)
    }

    /// Byte cost used by flow control: length of [`Command::serial_bytes`].
    pub fn byte_count(&self) -> usize {
        self.normalized.len() + 1
    }

    /// Marks this command as sent. Caller (streaming engine) must ensure
    /// this is called only once per command per run, and only after the
    /// bytes have actually been written to the transport.
    pub(crate) fn mark_sent(&mut self) {
        self.status = CommandStatus::Sent;
    }

    /// Marks this command acknowledged `ok`.
    pub(crate) fn mark_ok(&mut self) {
        self.status = CommandStatus::Ok;
    }

    /// Marks this command acknowledged `error:<code>`.
    pub(crate) fn mark_error(&mut self, code: u32) {
        self.status = CommandStatus::Error;
        self.error_code = Some(code);
    }

    fn reset(&mut self) {
        self.status = CommandStatus::Queued;
        self.error_code = None;
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{:?}]", self.normalized, self.status)
    }
}

/// Axis-wise bounding box of all motion commands, plus the toolpath.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// One point on the derived toolpath: position and whether the laser is
/// cutting at that point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToolpathPoint {
    pub x: f64,
    pub y: f64,
    pub cutting: bool,
}

/// An ordered sequence of [`Command`]s plus an identifying name.
///
/// Constructed from a file ([`Program::from_file`]) or an in-memory list of
/// lines ([`Program::from_lines`]). Empty normalized lines are dropped at
/// build time.
#[derive(Clone, Debug, Default)]
pub struct Program {
    name: String,
    commands: Vec<Command>,
}

/// Errors loading a program from disk.
#[derive(Debug, thiserror::Error)]
pub enum ProgramLoadError {
    #[error("failed to read program file {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl Program {
    /// Loads a program from a text file: lossy UTF-8 decode, one line per
    /// input line, empty (post-normalization) lines dropped.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ProgramLoadError> {
        let path_ref = path.as_ref();
        let bytes =
            std::fs::read(path_ref).map_err(|source| ProgramLoadError::ReadFailed {
                path: path_ref.display().to_string(),
                source,
            })?;
        let text = String::from_utf8_lossy(&bytes);
        let name = path_ref
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path_ref.display().to_string());
        Ok(Self::from_lines(text.lines(), name))
    }

    /// Builds a program from an in-memory sequence of lines.
    pub fn from_lines<I, S>(lines: I, name: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let commands = lines
            .into_iter()
            .map(|l| Command::new(l.as_ref()))
            .filter(|c| !c.normalized.is_empty())
            .collect();
        Self {
            name: name.into(),
            commands,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total(&self) -> usize {
        self.commands.len()
    }

    pub fn ok_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| c.status == CommandStatus::Ok)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| c.status == CommandStatus::Error)
            .count()
    }

    pub fn sent_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| c.status != CommandStatus::Queued)
            .count()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub(crate) fn commands_mut(&mut self) -> &mut [Command] {
        &mut self.commands
    }

    pub(crate) fn command_mut(&mut self, index: usize) -> Option<&mut Command> {
        self.commands.get_mut(index)
    }

    pub fn command(&self, index: usize) -> Option<&Command> {
        self.commands.get(index)
    }

    /// Sets every command back to `Queued` and clears error codes. The only
    /// permitted backward transition.
    pub fn reset_status(&mut self) {
        for cmd in self.commands_mut() {
            cmd.reset();
        }
    }

    /// Bounding box over all motion-command end positions, with modal axis
    /// tracking (an omitted axis keeps its last value; origin initially).
    /// Returns `(0,0,0,0)` if there are no motion commands.
    pub fn bounds(&self) -> Bounds {
        let mut x = 0.0_f64;
        let mut y = 0.0_f64;
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for cmd in &self.commands {
            if let Some(nx) = line::param(&cmd.normalized, 'X') {
                x = nx;
            }
            if let Some(ny) = line::param(&cmd.normalized, 'Y') {
                y = ny;
            }
            if line::is_motion(&cmd.normalized) {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }

        if min_x.is_infinite() {
            return Bounds::default();
        }
        Bounds {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Ordered (x, y, cutting?) tuples, one per motion command.
    pub fn toolpath(&self) -> Vec<ToolpathPoint> {
        let mut x = 0.0_f64;
        let mut y = 0.0_f64;
        let mut laser_on = false;
        let mut points = Vec::new();

        for cmd in &self.commands {
            if line::is_laser_on(&cmd.normalized) {
                laser_on = true;
            } else if line::is_laser_off(&cmd.normalized) {
                laser_on = false;
            }

            if let Some(nx) = line::param(&cmd.normalized, 'X') {
                x = nx;
            }
            if let Some(ny) = line::param(&cmd.normalized, 'Y') {
                y = ny;
            }

            if line::is_motion(&cmd.normalized) {
                let power = line::param(&cmd.normalized, 'S');
                let cutting = laser_on || power.is_some_and(|p| p > 0.0);
                points.push(ToolpathPoint { x, y, cutting });
            }
        }

        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_lines_dropped_at_build_time() {
        let program = Program::from_lines(["G0 X1", "", "   ", "; comment only", "G0 X2"], "t");
        assert_eq!(program.total(), 2);
    }

    #[test]
    fn reset_semantics() {
        let mut program = Program::from_lines(["G0 X1", "G0 X2"], "t");
        program.command_mut(0).unwrap().mark_sent();
        program.command_mut(0).unwrap().mark_ok();
        program.command_mut(1).unwrap().mark_sent();
        program.command_mut(1).unwrap().mark_error(20);
        assert_eq!(program.ok_count(), 1);
        assert_eq!(program.error_count(), 1);

        program.reset_status();
        assert_eq!(program.ok_count(), 0);
        assert_eq!(program.error_count(), 0);
        assert_eq!(program.sent_count(), 0);
        assert_eq!(program.total(), 2);
    }

    #[test]
    fn bounds_no_motion_commands() {
        let program = Program::from_lines(["$H", "$X"], "t");
        assert_eq!(program.bounds(), Bounds::default());
    }

    #[test]
    fn bounds_modal_tracking() {
        // P1=(0,0) start; G0 X10 -> (10,0); G1 Y5 -> (10,5); G1 X-2 Y8 -> (-2,8)
        let program = Program::from_lines(["G0 X10", "G1 Y5 F300", "G1 X-2 Y8"], "t");
        let bounds = program.bounds();
        assert_eq!(bounds.min_x, -2.0);
        assert_eq!(bounds.min_y, 0.0);
        assert_eq!(bounds.max_x, 10.0);
        assert_eq!(bounds.max_y, 8.0);
    }

    #[test]
    fn toolpath_tracks_laser_state_and_positive_s() {
        let program = Program::from_lines(
            ["M3 S0", "G1 X1 Y1 S500", "M5", "G1 X2 Y2"],
            "t",
        );
        let path = program.toolpath();
        assert_eq!(path.len(), 2);
        assert!(path[0].cutting); // S500 > 0 even though M3 S0 set power to 0 first
        assert!(!path[1].cutting); // laser off, no S param
    }

    #[test]
    fn toolpath_cutting_via_m3_without_s() {
        let program = Program::from_lines(["M3", "G1 X5 Y5"], "t");
        let path = program.toolpath();
        assert_eq!(path.len(), 1);
        assert!(path[0].cutting);
    }

    #[test]
    fn byte_count_matches_serial_bytes_len() {
        let program = Program::from_lines(["G0 X10"], "t");
        let cmd = program.command(0).unwrap();
        assert_eq!(cmd.byte_count(), cmd.serial_bytes().len());
        assert_eq!(cmd.serial_bytes(), b"G0 X10\n".to_vec());
    }
}
