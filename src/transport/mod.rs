//! Byte-level duplex transport to the firmware.
//!
//! [`Transport`] is blocking by design — the simplest correct realization
//! of a serial link, with workers run on dedicated OS threads rather than
//! async tasks. Reads and writes are split into independent handles
//! ([`TransportReader`]/[`TransportWriter`]) so a blocking read (bounded by
//! a multi-second read-timeout) never gates a concurrent real-time or
//! status-poll write: the RX worker owns the reader exclusively, while the
//! writer is shared behind a mutex that is only ever held for the duration
//! of one `write`/`close` call.

mod mock;
#[cfg(feature = "serial")]
mod serial;

pub use mock::{mock_pair, MockTransport, MockTransportHandle};
#[cfg(feature = "serial")]
pub use serial::{SerialTransport, DEFAULT_BAUD_RATE, SUPPORTED_BAUD_RATES};

use thiserror::Error;

/// Errors from a transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open transport: {0}")]
    OpenFailed(String),
    #[error("transport write failed: {0}")]
    WriteFailed(String),
    #[error("transport read failed: {0}")]
    ReadFailed(String),
    #[error("transport is closed")]
    Closed,
}

/// The read half of a split [`Transport`]. Owned exclusively by the RX
/// worker — never shared, never locked.
pub trait TransportReader: Send {
    /// Reads one `\n`-terminated line (stripped of trailing CR/LF), or
    /// returns an empty string on read timeout.
    fn readline(&mut self) -> Result<String, TransportError>;
}

/// The write half of a split [`Transport`]. Shared behind a mutex that
/// callers hold only for the duration of one `write`/`close` call, so it
/// never blocks behind the reader's multi-second read timeout.
pub trait TransportWriter: Send {
    /// Writes `bytes` verbatim. Fails with [`TransportError::WriteFailed`]
    /// on I/O error.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Closes the transport. Idempotent.
    fn close(&mut self);
}

/// A blocking duplex byte pipe, framed into lines for reads.
///
/// [`Transport::split`] consumes the combined handle and returns
/// independent reader/writer halves over the same underlying link (e.g. two
/// `try_clone()`d serial-port handles, or the two ends of an in-memory
/// channel pair). Implementations must guarantee: a full line write and a
/// single real-time-byte write are each atomic from the caller's point of
/// view — on transports without that guarantee, the writer half must
/// serialize writes with its own short-held mutex internally.
pub trait Transport: Send {
    /// Splits this transport into an exclusively-owned reader and a
    /// shareable writer.
    fn split(self: Box<Self>) -> Result<(Box<dyn TransportReader>, Box<dyn TransportWriter>), TransportError>;
}
