//! G-code line normalization and program model.
//!
//! Pure data + parsing — no I/O besides loading a program from disk, no
//! transport awareness. Used by the streaming engine (byte costs) and by
//! external collaborators (bounding box, toolpath preview).

mod line;
mod program;

pub use line::{is_laser_off, is_laser_on, is_motion, normalize, param};
pub use program::{Bounds, Command, CommandStatus, Program, ProgramLoadError, ToolpathPoint};
