//! Streaming engine: character-counting flow control for a queued
//! program, run on a dedicated TX worker thread.

use super::observer::Observers;
use crate::gcode::Program;
use crate::transport::TransportWriter;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// GRBL's default receive-buffer size in bytes.
pub const RX_BUFFER_SIZE: usize = 128;

/// How long the TX worker waits on the acknowledgment signal before
/// re-checking buffer occupancy.
const ACK_WAIT: Duration = Duration::from_millis(100);

/// How long the drain phase waits for trailing acks after the last command
/// has been written.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Streaming-run state held only while a job is in progress.
/// `program` persists across runs so it can be restarted.
pub(crate) struct StreamState {
    pub program: Option<Program>,
    pub cursor: usize,
    /// FIFO of command indices that have been sent but not yet acknowledged.
    pub inflight: VecDeque<usize>,
}

impl StreamState {
    pub fn new() -> Self {
        Self {
            program: None,
            cursor: 0,
            inflight: VecDeque::new(),
        }
    }

    pub fn inflight_bytes(&self) -> usize {
        let Some(program) = &self.program else {
            return 0;
        };
        self.inflight
            .iter()
            .filter_map(|&i| program.command(i))
            .map(|c| c.byte_count())
            .sum()
    }
}

/// A level-triggered event set by the RX worker on every `ok`/`error` and
/// cleared by the TX worker after it observes it.
pub(crate) struct AckSignal {
    flag: Mutex<bool>,
    condvar: Condvar,
}

impl AckSignal {
    pub fn new() -> Self {
        Self {
            flag: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    pub fn set(&self) {
        let mut flag = self.flag.lock().unwrap();
        *flag = true;
        self.condvar.notify_one();
    }

    /// Waits up to `timeout` for the signal, clearing it either way.
    pub fn wait_timeout(&self, timeout: Duration) {
        let flag = self.flag.lock().unwrap();
        let (mut flag, _) = self
            .condvar
            .wait_timeout_while(flag, timeout, |set| !*set)
            .unwrap();
        *flag = false;
    }
}

/// Everything the TX worker needs; cloned (via `Arc`s) out of the owning
/// [`super::GrblController`] at `start_stream` time.
///
/// `writer` is the write-only half of the split transport, shared with the
/// status poller and any ad-hoc real-time/line writes; the RX worker's
/// reader half is never behind this lock.
pub(crate) struct StreamerHandle {
    pub writer: std::sync::Arc<Mutex<Option<Box<dyn TransportWriter>>>>,
    pub stream: std::sync::Arc<Mutex<StreamState>>,
    pub streaming: std::sync::Arc<AtomicBool>,
    pub paused: std::sync::Arc<AtomicBool>,
    pub abort: std::sync::Arc<AtomicBool>,
    pub alive: std::sync::Arc<AtomicBool>,
    pub ack: std::sync::Arc<AckSignal>,
    pub observers: std::sync::Arc<RwLock<Observers>>,
    /// Shared so [`super::GrblController::set_threading_mode`] can retune
    /// an in-flight streaming run without restarting the TX thread.
    pub tx_short_ms: std::sync::Arc<AtomicU64>,
}

/// Result of a next-command decision inside the TX loop.
enum NextStep {
    Done,
    Paused,
    Send { index: usize, cost: usize },
}

fn next_step(stream: &Mutex<StreamState>, paused: &AtomicBool) -> NextStep {
    let guard = stream.lock().unwrap();
    let Some(program) = &guard.program else {
        return NextStep::Done;
    };
    if guard.cursor >= program.total() {
        return NextStep::Done;
    }
    if paused.load(Ordering::SeqCst) {
        return NextStep::Paused;
    }
    let cost = program
        .command(guard.cursor)
        .map(|c| c.byte_count())
        .unwrap_or(0);
    NextStep::Send {
        index: guard.cursor,
        cost,
    }
}

/// Runs the TX worker loop. Intended to be spawned on its own
/// thread; returns when the program is exhausted, aborted, or the link
/// dies.
pub(crate) fn run_tx_worker(handle: StreamerHandle) {
    info!("streaming started");
    'outer: loop {
        if handle.abort.load(Ordering::SeqCst) {
            break;
        }

        let (index, cost) = match next_step(&handle.stream, &handle.paused) {
            NextStep::Done => break,
            NextStep::Paused => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            NextStep::Send { index, cost } => (index, cost),
        };

        loop {
            let used = handle.stream.lock().unwrap().inflight_bytes();
            if used + cost <= RX_BUFFER_SIZE {
                break;
            }
            if handle.abort.load(Ordering::SeqCst) || !handle.alive.load(Ordering::SeqCst) {
                break 'outer;
            }
            handle.ack.wait_timeout(ACK_WAIT);
        }

        if handle.abort.load(Ordering::SeqCst) || !handle.alive.load(Ordering::SeqCst) {
            break;
        }

        let bytes = {
            let guard = handle.stream.lock().unwrap();
            guard
                .program
                .as_ref()
                .and_then(|p| p.command(index))
                .map(|c| c.serial_bytes())
        };
        let Some(bytes) = bytes else { break };

        let write_result = {
            let mut writer_guard = handle.writer.lock().unwrap();
            match writer_guard.as_mut() {
                Some(writer) => writer.write(&bytes),
                None => break,
            }
        };

        match write_result {
            Ok(()) => {
                let mut guard = handle.stream.lock().unwrap();
                if let Some(program) = &mut guard.program {
                    if let Some(cmd) = program.command_mut(index) {
                        cmd.mark_sent();
                    }
                }
                guard.inflight.push_back(index);
                guard.cursor += 1;
                debug!("tx[{}]: sent", index);
            }
            Err(e) => {
                warn!("tx write failed, stopping stream: {}", e);
                handle.streaming.store(false, Ordering::SeqCst);
                handle.observers.read().unwrap().notify_job_finished();
                return;
            }
        }

        let tx_short_ms = handle.tx_short_ms.load(Ordering::SeqCst);
        if tx_short_ms > 0 {
            std::thread::sleep(Duration::from_millis(tx_short_ms));
        }
    }

    if !handle.abort.load(Ordering::SeqCst) {
        let deadline = Instant::now() + DRAIN_TIMEOUT;
        loop {
            let empty = handle.stream.lock().unwrap().inflight.is_empty();
            if empty || Instant::now() >= deadline {
                break;
            }
            handle.ack.wait_timeout(ACK_WAIT);
        }
    }

    handle.streaming.store(false, Ordering::SeqCst);
    info!("streaming finished");
    handle.observers.read().unwrap().notify_job_finished();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_signal_wait_times_out_without_set() {
        let signal = AckSignal::new();
        let started = Instant::now();
        signal.wait_timeout(Duration::from_millis(30));
        assert!(started.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn ack_signal_wakes_immediately_when_set() {
        let signal = std::sync::Arc::new(AckSignal::new());
        let signal2 = signal.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            signal2.set();
        });
        let started = Instant::now();
        signal.wait_timeout(Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn stream_state_inflight_bytes_sums_sent_commands() {
        let program = Program::from_lines(["G0 X10", "G1 X20 F500"], "t");
        let mut state = StreamState::new();
        state.program = Some(program);
        state.inflight.push_back(0);
        state.inflight.push_back(1);
        // "G0 X10\n" (7) + "G1 X20 F500\n" (12)
        assert_eq!(state.inflight_bytes(), 7 + 12);
    }
}
