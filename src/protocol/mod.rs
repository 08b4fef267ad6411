//! The GRBL v1.1 wire protocol: response classification, the real-time/line
//! command surface, and the error/alarm code tables.

mod codes;
mod command;
mod parser;

pub use codes::{alarm_description, error_description};
pub use command::{JogMode, LineCommand, RealtimeCommand};
pub use parser::{classify, Response, StatusParseError, StatusReport};
