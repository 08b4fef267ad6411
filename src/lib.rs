//! Host-side controller core for GRBL v1.1-compatible CNC/laser firmware.
//!
//! This crate owns the serial link, the connection/status state machine,
//! and the character-counting streaming engine. It does not own a GUI, a
//! CLI, an image-to-G-code converter, or serial-port enumeration — those
//! are external collaborators built on top of [`GrblController`].

pub mod controller;
pub mod gcode;
pub mod protocol;
pub mod transport;

pub use controller::observer::Observers;
pub use controller::state::{ControllerState, FirmwareStatus, Position};
pub use controller::threading::{ThreadingModePreset, ThreadingParams};
pub use controller::{ControllerError, GrblController};
pub use gcode::{Bounds, Command, CommandStatus, Program, ProgramLoadError, ToolpathPoint};
pub use protocol::{JogMode, LineCommand, RealtimeCommand};
pub use transport::{Transport, TransportError, TransportReader, TransportWriter};
