//! Response parser: classifies a single inbound line and extracts
//! its fields. Pure — no I/O, no locking; the controller applies the result
//! to its state.

use crate::controller::state::Position;
use thiserror::Error;

/// Errors parsing a status-report body. A malformed status line is not
/// fatal to the connection; the caller logs and moves on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatusParseError {
    #[error("empty status report")]
    EmptyState,
    #[error("invalid position: {0}")]
    InvalidPosition(String),
    #[error("invalid feed/speed field: {0}")]
    InvalidFeedSpeed(String),
}

/// One parsed status report.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusReport {
    pub state_word: String,
    pub machine_pos: Option<Position>,
    pub work_pos: Option<Position>,
    pub feed_rate: Option<f64>,
    pub spindle_speed: Option<f64>,
}

/// Classification of a single inbound line, applied in rule order —
/// first match wins.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    /// `Grbl <version>...` (case-insensitive).
    Welcome { version: String },
    /// `<...>` status report.
    Status(StatusReport),
    /// Exactly `ok`.
    Ok,
    /// `error:<N>`.
    Error(u32),
    /// `ALARM:<N>`.
    Alarm(u32),
    /// Anything else — a diagnostic line for the line-received observer only.
    Diagnostic(String),
}

/// Classifies one already-framed, trimmed inbound line.
pub fn classify(line: &str) -> Response {
    if let Some(rest) = strip_welcome_prefix(line) {
        return Response::Welcome {
            version: rest.split_whitespace().next().unwrap_or("").to_string(),
        };
    }
    if line.starts_with('<') && line.ends_with('>') && line.len() >= 2 {
        return match parse_status_body(&line[1..line.len() - 1]) {
            Ok(report) => Response::Status(report),
            Err(_) => Response::Diagnostic(line.to_string()),
        };
    }
    if line == "ok" {
        return Response::Ok;
    }
    if let Some(rest) = line.strip_prefix("error:") {
        if let Ok(code) = rest.trim().parse::<u32>() {
            return Response::Error(code);
        }
    }
    if let Some(rest) = line.strip_prefix("ALARM:") {
        if let Ok(code) = rest.trim().parse::<u32>() {
            return Response::Alarm(code);
        }
    }
    Response::Diagnostic(line.to_string())
}

fn strip_welcome_prefix(line: &str) -> Option<&str> {
    if line.len() < 4 {
        return None;
    }
    if line[..4].eq_ignore_ascii_case("grbl") {
        Some(line[4..].trim_start())
    } else {
        None
    }
}

/// Parses the body of a status report (without the surrounding `<>`).
fn parse_status_body(body: &str) -> Result<StatusReport, StatusParseError> {
    let mut parts = body.split('|');
    let state_word = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(StatusParseError::EmptyState)?
        .to_string();

    let mut machine_pos = None;
    let mut work_pos = None;
    let mut wco = None;
    let mut feed_rate = None;
    let mut spindle_speed = None;

    for field in parts {
        let field = field.trim();
        if let Some(rest) = field.strip_prefix("MPos:") {
            machine_pos = Some(parse_position(rest)?);
        } else if let Some(rest) = field.strip_prefix("WPos:") {
            work_pos = Some(parse_position(rest)?);
        } else if let Some(rest) = field.strip_prefix("WCO:") {
            wco = Some(parse_position(rest)?);
        } else if let Some(rest) = field.strip_prefix("FS:") {
            let (feed, speed) = parse_feed_speed(rest)?;
            feed_rate = Some(feed);
            spindle_speed = speed;
        } else if let Some(rest) = field.strip_prefix("F:") {
            let (feed, speed) = parse_feed_speed(rest)?;
            feed_rate = Some(feed);
            spindle_speed = speed;
        }
    }

    // Work position is derived as machine - WCO when WPos is absent.
    if work_pos.is_none() {
        if let (Some(mpos), Some(wco)) = (machine_pos, wco) {
            work_pos = Some(Position {
                x: mpos.x - wco.x,
                y: mpos.y - wco.y,
                z: mpos.z - wco.z,
            });
        }
    }

    Ok(StatusReport {
        state_word,
        machine_pos,
        work_pos,
        feed_rate,
        spindle_speed,
    })
}

fn parse_position(s: &str) -> Result<Position, StatusParseError> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() < 2 {
        return Err(StatusParseError::InvalidPosition(s.to_string()));
    }
    let x: f64 = parts[0]
        .parse()
        .map_err(|_| StatusParseError::InvalidPosition(s.to_string()))?;
    let y: f64 = parts[1]
        .parse()
        .map_err(|_| StatusParseError::InvalidPosition(s.to_string()))?;
    let z: f64 = match parts.get(2) {
        Some(z_str) => z_str
            .parse()
            .map_err(|_| StatusParseError::InvalidPosition(s.to_string()))?,
        None => 0.0,
    };
    Ok(Position { x, y, z })
}

/// `FS:feed,spindle` or `F:feed[,spindle]`.
fn parse_feed_speed(s: &str) -> Result<(f64, Option<f64>), StatusParseError> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let feed: f64 = parts
        .first()
        .ok_or_else(|| StatusParseError::InvalidFeedSpeed(s.to_string()))?
        .parse()
        .map_err(|_| StatusParseError::InvalidFeedSpeed(s.to_string()))?;
    let speed = match parts.get(1) {
        Some(v) => Some(
            v.parse()
                .map_err(|_| StatusParseError::InvalidFeedSpeed(s.to_string()))?,
        ),
        None => None,
    };
    Ok((feed, speed))
}
