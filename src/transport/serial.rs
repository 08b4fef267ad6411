//! Real serial transport, built on the `serialport` crate.
//!
//! Gated behind the `serial` feature — this keeps the rest of the crate
//! (and its tests) buildable without `libudev` on Linux.

use super::{Transport, TransportError, TransportReader, TransportWriter};
use serialport::{DataBits, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, warn};

/// Baud rates the firmware is expected to support. Not enforced by
/// [`SerialTransport::open`] — left to the caller/collaborator to offer a
/// restricted choice.
pub const SUPPORTED_BAUD_RATES: [u32; 6] = [9600, 19200, 38400, 57600, 115200, 230400];

/// Default baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115200;

const BOOT_DELAY: Duration = Duration::from_secs(2);
const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// A real GRBL-compatible serial connection: 8-N-1, synchronous open,
/// boot-delay flush, finite read/write timeout.
///
/// Holds a single port handle until [`Transport::split`] is called, at
/// which point it is cloned (`try_clone`, a `dup()` of the underlying fd)
/// into independent reader/writer handles so a blocking read never shares a
/// lock with a concurrent write.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Opens `port_name` at `baud`, 8-N-1. Waits ~2s for the firmware to
    /// boot, then flushes the outbound buffer.
    pub fn open(port_name: &str, baud: u32) -> Result<Self, TransportError> {
        let port = serialport::new(port_name, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(IO_TIMEOUT)
            .open()
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        std::thread::sleep(BOOT_DELAY);
        let mut transport = SerialTransport { port };
        if let Err(e) = transport.port.clear(serialport::ClearBuffer::Output) {
            warn!("failed to flush outbound buffer after open: {}", e);
        }
        debug!("serial transport opened on {} at {} baud", port_name, baud);
        Ok(transport)
    }
}

impl Transport for SerialTransport {
    fn split(
        self: Box<Self>,
    ) -> Result<(Box<dyn TransportReader>, Box<dyn TransportWriter>), TransportError> {
        let reader_port = self
            .port
            .try_clone()
            .map_err(|e| TransportError::OpenFailed(format!("failed to clone port handle: {e}")))?;
        Ok((
            Box::new(SerialReader {
                port: reader_port,
                pending: Vec::new(),
            }),
            Box::new(SerialWriter { port: self.port }),
        ))
    }
}

/// Read half: owns its own cloned port handle exclusively — only the RX
/// worker ever touches it, so no lock is needed around `readline`.
pub struct SerialReader {
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

impl SerialReader {
    /// Pulls the next `\n`-terminated line out of `pending`, if any.
    fn take_line(&mut self) -> Option<String> {
        let newline_pos = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line_bytes: Vec<u8> = self.pending.drain(..=newline_pos).collect();
        line_bytes.pop(); // drop '\n'
        if line_bytes.last() == Some(&b'\r') {
            line_bytes.pop();
        }
        Some(String::from_utf8_lossy(&line_bytes).into_owned())
    }
}

impl TransportReader for SerialReader {
    fn readline(&mut self) -> Result<String, TransportError> {
        if let Some(line) = self.take_line() {
            return Ok(line);
        }

        let mut buf = [0u8; 256];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(String::new()),
            Ok(n) => {
                self.pending.extend_from_slice(&buf[..n]);
                Ok(self.take_line().unwrap_or_default())
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(String::new()),
            Err(e) => Err(TransportError::ReadFailed(e.to_string())),
        }
    }
}

/// Write half: shared behind the controller's writer mutex, which is held
/// only for the duration of one `write`/`close` call — never across the
/// reader's blocking read-timeout.
pub struct SerialWriter {
    port: Box<dyn SerialPort>,
}

impl TransportWriter for SerialWriter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.port
            .write_all(bytes)
            .map_err(|e| TransportError::WriteFailed(e.to_string()))
    }

    fn close(&mut self) {
        // serialport has no explicit close; dropping the port releases the
        // OS handle. Nothing to do here beyond letting Drop run.
    }
}
