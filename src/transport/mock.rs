//! In-memory loopback transport for tests. Always compiled — no `serial` feature required.

use super::{Transport, TransportError, TransportReader, TransportWriter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

/// The controller-facing half before splitting: what
/// [`crate::controller::GrblController::connect_with_transport`] consumes.
pub struct MockTransport {
    inbound_rx: mpsc::Receiver<String>,
    outbound_tx: mpsc::Sender<Vec<u8>>,
    read_timeout: Duration,
    closed: Arc<AtomicBool>,
}

/// The test-facing half: push simulated firmware lines in, observe bytes
/// written by the controller out.
pub struct MockTransportHandle {
    inbound_tx: mpsc::Sender<String>,
    outbound_rx: Mutex<mpsc::Receiver<Vec<u8>>>,
}

/// Creates a connected mock transport pair. `read_timeout` governs how long
/// [`MockReader::readline`] blocks before returning an empty string.
pub fn mock_pair(read_timeout: Duration) -> (MockTransport, MockTransportHandle) {
    let (inbound_tx, inbound_rx) = mpsc::channel();
    let (outbound_tx, outbound_rx) = mpsc::channel();
    (
        MockTransport {
            inbound_rx,
            outbound_tx,
            read_timeout,
            closed: Arc::new(AtomicBool::new(false)),
        },
        MockTransportHandle {
            inbound_tx,
            outbound_rx: Mutex::new(outbound_rx),
        },
    )
}

/// Read half: owns the inbound channel exclusively, no locking.
pub struct MockReader {
    inbound_rx: mpsc::Receiver<String>,
    read_timeout: Duration,
    closed: Arc<AtomicBool>,
}

/// Write half: clonable `mpsc::Sender`, shared behind the controller's
/// writer mutex only for the duration of one `write` call.
pub struct MockWriter {
    outbound_tx: mpsc::Sender<Vec<u8>>,
    closed: Arc<AtomicBool>,
}

impl Transport for MockTransport {
    fn split(
        self: Box<Self>,
    ) -> Result<(Box<dyn TransportReader>, Box<dyn TransportWriter>), TransportError> {
        let reader = MockReader {
            inbound_rx: self.inbound_rx,
            read_timeout: self.read_timeout,
            closed: self.closed.clone(),
        };
        let writer = MockWriter {
            outbound_tx: self.outbound_tx,
            closed: self.closed,
        };
        Ok((Box::new(reader), Box::new(writer)))
    }
}

impl TransportReader for MockReader {
    fn readline(&mut self) -> Result<String, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        match self.inbound_rx.recv_timeout(self.read_timeout) {
            Ok(line) => Ok(line),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(String::new()),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(TransportError::ReadFailed(
                "firmware side disconnected".to_string(),
            )),
        }
    }
}

impl TransportWriter for MockWriter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.outbound_tx
            .send(bytes.to_vec())
            .map_err(|e| TransportError::WriteFailed(e.to_string()))
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl MockTransportHandle {
    /// Simulates the firmware emitting one line (e.g. `"ok"`, a status
    /// report, `"Grbl 1.1h ['$' for help]"`).
    pub fn push_line(&self, line: impl Into<String>) {
        let _ = self.inbound_tx.send(line.into());
    }

    /// Blocks up to `timeout` for the next chunk of bytes the controller
    /// wrote to the transport (a full line + `\n`, or a single real-time
    /// byte).
    pub fn recv_written(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.outbound_rx.lock().unwrap().recv_timeout(timeout).ok()
    }

    /// Drains all bytes written so far without blocking.
    pub fn drain_written(&self) -> Vec<Vec<u8>> {
        let rx = self.outbound_rx.lock().unwrap();
        let mut out = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            out.push(chunk);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(transport: MockTransport) -> (Box<dyn TransportReader>, Box<dyn TransportWriter>) {
        Box::new(transport).split().unwrap()
    }

    #[test]
    fn write_then_recv_written() {
        let (transport, handle) = mock_pair(Duration::from_millis(50));
        let (_reader, mut writer) = split(transport);
        writer.write(b"?").unwrap();
        let chunk = handle.recv_written(Duration::from_millis(100)).unwrap();
        assert_eq!(chunk, b"?".to_vec());
    }

    #[test]
    fn push_line_then_readline() {
        let (transport, handle) = mock_pair(Duration::from_millis(50));
        let (mut reader, _writer) = split(transport);
        handle.push_line("ok");
        assert_eq!(reader.readline().unwrap(), "ok");
    }

    #[test]
    fn readline_times_out_to_empty_string() {
        let (transport, _handle) = mock_pair(Duration::from_millis(20));
        let (mut reader, _writer) = split(transport);
        assert_eq!(reader.readline().unwrap(), "");
    }

    #[test]
    fn closed_writer_also_rejects_reads() {
        let (transport, _handle) = mock_pair(Duration::from_millis(20));
        let (mut reader, mut writer) = split(transport);
        writer.close();
        assert!(matches!(writer.write(b"x"), Err(TransportError::Closed)));
        assert!(matches!(reader.readline(), Err(TransportError::Closed)));
    }

    #[test]
    fn read_does_not_block_write() {
        // The reader blocks for its full read_timeout with nothing pushed;
        // a write on the independently-locked writer must still go through
        // immediately instead of queuing behind it.
        let (transport, handle) = mock_pair(Duration::from_secs(5));
        let (mut reader, mut writer) = split(transport);
        let reader_thread = std::thread::spawn(move || reader.readline());

        let started = std::time::Instant::now();
        writer.write(b"?").unwrap();
        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(
            handle.recv_written(Duration::from_millis(200)),
            Some(b"?".to_vec())
        );

        drop(reader_thread); // detach; the 5s recv_timeout will just expire
    }
}
