//! Status poller: a dedicated thread that asks the firmware for a
//! status report at a fixed cadence.

use crate::protocol::command::RealtimeCommand;
use crate::transport::TransportWriter;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Everything the poller thread needs. `interval_ms` is shared so
/// [`super::GrblController::set_threading_mode`] can retune a running
/// poller without restarting the thread.
///
/// `writer` is the write-only half of the split transport: locking it only
/// ever guards one `write` call, so a status poll is never stalled behind
/// the RX worker's blocking read.
pub(crate) struct PollerHandle {
    pub writer: std::sync::Arc<Mutex<Option<Box<dyn TransportWriter>>>>,
    pub alive: std::sync::Arc<AtomicBool>,
    pub interval_ms: std::sync::Arc<AtomicU64>,
}

/// Runs the poller loop: write `?` every `interval_ms`, swallowing write
/// errors.
pub(crate) fn run_poller(handle: PollerHandle) {
    debug!("status poller started");
    while handle.alive.load(Ordering::SeqCst) {
        {
            let mut writer_guard = handle.writer.lock().unwrap();
            if let Some(writer) = writer_guard.as_mut() {
                if let Err(e) = writer.write(&[RealtimeCommand::StatusQuery.as_byte()]) {
                    debug!("status poll write failed (ignored): {}", e);
                }
            }
        }
        std::thread::sleep(Duration::from_millis(handle.interval_ms.load(Ordering::SeqCst)));
    }
    debug!("status poller stopped");
}
