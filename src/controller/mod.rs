//! [`GrblController`]: the connection/status state machine and streaming
//! driver that ties components A-H together.
//!
//! Concurrency is three dedicated `std::thread` workers — RX, status
//! poller, TX streamer — coordinated through `std::sync` primitives rather
//! than an async runtime: the transport is a blocking duplex at its core,
//! so a thread-per-worker design is both the simplest and the most direct
//! realization of it.

pub mod observer;
mod poller;
pub mod state;
mod streamer;
pub mod threading;

use crate::gcode::Program;
use crate::protocol::{
    alarm_description, classify, error_description, JogMode, LineCommand, RealtimeCommand,
    Response, StatusReport,
};
use crate::transport::{Transport, TransportError, TransportReader, TransportWriter};
use observer::Observers;
use state::{ControllerState, FirmwareStatus};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use streamer::{run_tx_worker, AckSignal, StreamState, StreamerHandle};
use thiserror::Error;
use threading::ThreadingModePreset;
use tracing::{debug, info, warn};

#[cfg(feature = "serial")]
use crate::transport::SerialTransport;

/// How long [`GrblController::connect_with_transport`] waits for the
/// firmware's welcome line before falling back to a status-query probe.
const WELCOME_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the connect fallback waits for any status report once it has
/// given up on the welcome line.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// How long [`GrblController::abort_stream`] waits before issuing the
/// post-abort safety commands, giving the soft reset time to take effect.
const ABORT_SETTLE: Duration = Duration::from_millis(500);

/// Errors from a [`GrblController`] operation.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("not connected to a controller")]
    NotConnected,
    #[error("a streaming run is already in progress")]
    AlreadyStreaming,
    #[error("no streaming run is in progress")]
    NotStreaming,
    #[error("no program is loaded")]
    NoProgramLoaded,
    #[error("refused: a streaming run owns the link")]
    Busy,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    ProgramLoad(#[from] crate::gcode::ProgramLoadError),
}

/// Everything the RX worker needs.
///
/// `reader` is owned outright, not shared behind a mutex: the RX worker is
/// its sole user for the lifetime of the connection, so a blocking
/// `readline()` (bounded by the transport's read-timeout) never contends
/// with a writer-side real-time byte or status poll.
struct RxHandle {
    reader: Box<dyn TransportReader>,
    state: Arc<RwLock<ControllerState>>,
    observers: Arc<RwLock<Observers>>,
    stream: Arc<Mutex<StreamState>>,
    ack: Arc<AckSignal>,
    alive: Arc<AtomicBool>,
}

fn set_status(
    state: &Arc<RwLock<ControllerState>>,
    observers: &Arc<RwLock<Observers>>,
    new_status: FirmwareStatus,
) {
    let changed = {
        let mut guard = state.write().unwrap();
        if guard.firmware_status != new_status {
            guard.firmware_status = new_status;
            true
        } else {
            false
        }
    };
    if changed {
        observers.read().unwrap().notify_status_change(new_status);
    }
}

fn on_ack(handle: &RxHandle, error_code: Option<u32>) {
    let progress = {
        let mut stream = handle.stream.lock().unwrap();
        match stream.inflight.pop_front() {
            Some(index) => {
                if let Some(program) = &mut stream.program {
                    if let Some(cmd) = program.command_mut(index) {
                        match error_code {
                            None => cmd.mark_ok(),
                            Some(code) => cmd.mark_error(code),
                        }
                    }
                }
                stream.program.as_ref().map(|p| {
                    if p.total() == 0 {
                        100.0
                    } else {
                        (p.ok_count() + p.error_count()) as f64 / p.total() as f64 * 100.0
                    }
                })
            }
            None => {
                debug!("stray ack with no inflight command");
                None
            }
        }
    };
    if let Some(percent) = progress {
        handle.observers.read().unwrap().notify_progress_update(percent);
    }
    handle.ack.set();
}

fn apply_status(report: StatusReport, handle: &RxHandle) {
    let word = report
        .state_word
        .split(':')
        .next()
        .unwrap_or(&report.state_word);
    set_status(
        &handle.state,
        &handle.observers,
        FirmwareStatus::from_state_word(word),
    );

    let mut changed_pos = false;
    {
        let mut state = handle.state.write().unwrap();
        if let Some(mpos) = report.machine_pos {
            if mpos != state.machine_pos {
                state.machine_pos = mpos;
                changed_pos = true;
            }
        }
        if let Some(wpos) = report.work_pos {
            if wpos != state.work_pos {
                state.work_pos = wpos;
                changed_pos = true;
            }
        }
        if let Some(feed) = report.feed_rate {
            state.feed_rate = feed;
        }
        if let Some(speed) = report.spindle_speed {
            state.spindle_speed = speed;
        }
    }
    if changed_pos {
        handle.observers.read().unwrap().notify_position_update();
    }
}

fn process_response(line: &str, handle: &RxHandle) {
    handle.observers.read().unwrap().notify_line_received(line);
    match classify(line) {
        Response::Welcome { version } => {
            handle.state.write().unwrap().firmware_version = version;
        }
        Response::Status(report) => apply_status(report, handle),
        Response::Ok => on_ack(handle, None),
        Response::Error(code) => {
            handle.observers.read().unwrap().notify_error(&format!(
                "error:{} {}",
                code,
                error_description(code)
            ));
            on_ack(handle, Some(code));
        }
        Response::Alarm(code) => {
            set_status(&handle.state, &handle.observers, FirmwareStatus::Alarm);
            handle.observers.read().unwrap().notify_error(&format!(
                "ALARM:{} {}",
                code,
                alarm_description(code)
            ));
        }
        Response::Diagnostic(_) => {}
    }
}

fn run_rx_worker(mut handle: RxHandle) {
    info!("rx worker started");
    loop {
        if !handle.alive.load(Ordering::SeqCst) {
            break;
        }
        match handle.reader.readline() {
            Ok(line) if line.is_empty() => continue,
            Ok(line) => process_response(&line, &handle),
            Err(e) => {
                warn!("rx read failed, disconnecting: {}", e);
                handle.alive.store(false, Ordering::SeqCst);
                set_status(&handle.state, &handle.observers, FirmwareStatus::Disconnected);
                break;
            }
        }
    }
    info!("rx worker stopped");
}

/// Host-side controller core for one GRBL-compatible firmware link.
///
/// Construct with [`GrblController::new`], connect with
/// [`GrblController::connect`] (real serial, behind the `serial` feature)
/// or [`GrblController::connect_with_transport`] (any [`Transport`],
/// including [`crate::transport::MockTransport`] in tests). Not a
/// singleton: every instance owns an independent set of worker threads and
/// shared state.
pub struct GrblController {
    /// The write half of the split transport. Locked only for the duration
    /// of one `write`/`close` call — the RX worker's reader half is never
    /// behind this mutex, so a blocking read can't stall it.
    writer: Arc<Mutex<Option<Box<dyn TransportWriter>>>>,
    state: Arc<RwLock<ControllerState>>,
    observers: Arc<RwLock<Observers>>,
    stream: Arc<Mutex<StreamState>>,
    streaming: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    abort: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    ack: Arc<AckSignal>,
    threading_mode: ThreadingModePreset,
    status_query_ms: Arc<AtomicU64>,
    tx_short_ms: Arc<AtomicU64>,
    rx_handle: Option<JoinHandle<()>>,
    poller_handle: Option<JoinHandle<()>>,
    tx_handle: Option<JoinHandle<()>>,
}

impl GrblController {
    pub fn new() -> Self {
        let threading_mode = ThreadingModePreset::default();
        let params = threading_mode.params();
        Self {
            writer: Arc::new(Mutex::new(None)),
            state: Arc::new(RwLock::new(ControllerState::default())),
            observers: Arc::new(RwLock::new(Observers::default())),
            stream: Arc::new(Mutex::new(StreamState::new())),
            streaming: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            abort: Arc::new(AtomicBool::new(false)),
            alive: Arc::new(AtomicBool::new(false)),
            ack: Arc::new(AckSignal::new()),
            threading_mode,
            status_query_ms: Arc::new(AtomicU64::new(params.status_query_ms)),
            tx_short_ms: Arc::new(AtomicU64::new(params.tx_short_ms)),
            rx_handle: None,
            poller_handle: None,
            tx_handle: None,
        }
    }

    /// Opens a real serial connection. Requires the `serial` feature.
    #[cfg(feature = "serial")]
    pub fn connect(&mut self, port: &str, baud: u32) -> Result<(), ControllerError> {
        let transport = SerialTransport::open(port, baud)?;
        self.connect_with_transport(Box::new(transport))
    }

    /// Connects over an arbitrary [`Transport`] and runs the connection
    /// algorithm: spawn RX + poller, wait for the welcome line, and
    /// fall back to a status-query probe if none arrives.
    pub fn connect_with_transport(
        &mut self,
        transport: Box<dyn Transport>,
    ) -> Result<(), ControllerError> {
        if self.is_connected() {
            self.disconnect();
        }

        set_status(&self.state, &self.observers, FirmwareStatus::Connecting);
        let (reader, writer) = match transport.split() {
            Ok(pair) => pair,
            Err(e) => {
                set_status(&self.state, &self.observers, FirmwareStatus::Disconnected);
                self.observers.read().unwrap().notify_error(&e.to_string());
                return Err(ControllerError::Transport(e));
            }
        };
        *self.writer.lock().unwrap() = Some(writer);
        self.alive.store(true, Ordering::SeqCst);

        let rx_handle = RxHandle {
            reader,
            state: self.state.clone(),
            observers: self.observers.clone(),
            stream: self.stream.clone(),
            ack: self.ack.clone(),
            alive: self.alive.clone(),
        };
        self.rx_handle = Some(std::thread::spawn(move || run_rx_worker(rx_handle)));

        let poller_handle = poller::PollerHandle {
            writer: self.writer.clone(),
            alive: self.alive.clone(),
            interval_ms: self.status_query_ms.clone(),
        };
        self.poller_handle = Some(std::thread::spawn(move || poller::run_poller(poller_handle)));

        let welcome_deadline = Instant::now() + WELCOME_TIMEOUT;
        while Instant::now() < welcome_deadline {
            if !self.state.read().unwrap().firmware_version.is_empty() {
                break;
            }
            if !self.alive.load(Ordering::SeqCst) {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        if !self.state.read().unwrap().firmware_version.is_empty() {
            set_status(&self.state, &self.observers, FirmwareStatus::Idle);
            self.observers.read().unwrap().notify_connected();
            return Ok(());
        }

        debug!("no welcome line seen, falling back to status-query probe");
        {
            let mut guard = self.writer.lock().unwrap();
            if let Some(w) = guard.as_mut() {
                let _ = w.write(&[RealtimeCommand::StatusQuery.as_byte()]);
            }
        }
        let probe_deadline = Instant::now() + PROBE_TIMEOUT;
        while Instant::now() < probe_deadline {
            if self.state.read().unwrap().firmware_status != FirmwareStatus::Connecting {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        if self.state.read().unwrap().firmware_status == FirmwareStatus::Connecting {
            set_status(&self.state, &self.observers, FirmwareStatus::Unknown);
        }
        self.observers.read().unwrap().notify_connected();
        Ok(())
    }

    /// Tears down the link: stops all worker threads, closes the
    /// transport, and resets to [`FirmwareStatus::Disconnected`].
    /// Idempotent.
    pub fn disconnect(&mut self) {
        if !self.is_connected() {
            return;
        }
        self.alive.store(false, Ordering::SeqCst);
        self.abort.store(true, Ordering::SeqCst);
        self.streaming.store(false, Ordering::SeqCst);

        if let Some(w) = self.writer.lock().unwrap().as_mut() {
            w.close();
        }
        *self.writer.lock().unwrap() = None;

        if let Some(h) = self.rx_handle.take() {
            let _ = h.join();
        }
        if let Some(h) = self.poller_handle.take() {
            let _ = h.join();
        }
        if let Some(h) = self.tx_handle.take() {
            let _ = h.join();
        }

        set_status(&self.state, &self.observers, FirmwareStatus::Disconnected);
        self.observers.read().unwrap().notify_disconnected();
    }

    pub fn is_connected(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// `true` for the whole life of a streaming run, including while
    /// paused — this is the flag [`GrblController::send_command`] checks
    /// to refuse interleaved ordinary commands.
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// A snapshot of everything known about the firmware right now. May be
    /// slightly stale relative to the most recent status report.
    pub fn state(&self) -> ControllerState {
        self.state.read().unwrap().clone()
    }

    /// Percentage of the loaded program's commands that have reached a
    /// terminal status (ok or error). `0.0` if no program is loaded.
    pub fn progress(&self) -> f64 {
        let stream = self.stream.lock().unwrap();
        match &stream.program {
            Some(p) if p.total() > 0 => {
                (p.ok_count() + p.error_count()) as f64 / p.total() as f64 * 100.0
            }
            Some(_) => 100.0,
            None => 0.0,
        }
    }

    /// Loads `program` as the one eligible to stream, resetting any
    /// per-line status from a previous run. Refused while a run is
    /// currently in progress.
    pub fn load_program(&mut self, program: Program) -> Result<(), ControllerError> {
        if self.is_streaming() {
            return Err(ControllerError::Busy);
        }
        let mut stream = self.stream.lock().unwrap();
        stream.program = Some(program);
        stream.cursor = 0;
        stream.inflight.clear();
        Ok(())
    }

    /// Starts (or restarts) streaming the loaded program from its first
    /// command.
    pub fn start_stream(&mut self) -> Result<(), ControllerError> {
        if !self.is_connected() {
            return Err(ControllerError::NotConnected);
        }
        if self.is_streaming() {
            return Err(ControllerError::AlreadyStreaming);
        }
        {
            let mut stream = self.stream.lock().unwrap();
            if stream.program.is_none() {
                return Err(ControllerError::NoProgramLoaded);
            }
            if let Some(program) = stream.program.as_mut() {
                program.reset_status();
            }
            stream.cursor = 0;
            stream.inflight.clear();
        }

        if let Some(h) = self.tx_handle.take() {
            let _ = h.join();
        }

        self.abort.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        self.streaming.store(true, Ordering::SeqCst);

        let handle = StreamerHandle {
            writer: self.writer.clone(),
            stream: self.stream.clone(),
            streaming: self.streaming.clone(),
            paused: self.paused.clone(),
            abort: self.abort.clone(),
            alive: self.alive.clone(),
            ack: self.ack.clone(),
            observers: self.observers.clone(),
            tx_short_ms: self.tx_short_ms.clone(),
        };
        self.tx_handle = Some(std::thread::spawn(move || run_tx_worker(handle)));
        Ok(())
    }

    /// Issues a feed hold and marks the run paused; the TX worker stops
    /// consuming new commands but inflight acknowledgments still drain.
    pub fn pause_stream(&self) -> Result<(), ControllerError> {
        if !self.is_streaming() {
            return Err(ControllerError::NotStreaming);
        }
        self.write_realtime(RealtimeCommand::FeedHold)?;
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Issues a cycle resume and clears the paused flag.
    pub fn resume_stream(&self) -> Result<(), ControllerError> {
        if !self.is_streaming() {
            return Err(ControllerError::NotStreaming);
        }
        self.write_realtime(RealtimeCommand::CycleResume)?;
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Aborts the current run: soft-resets the firmware, drops local
    /// inflight accounting, forces the state to idle, then — after a
    /// settle delay — sends `M5` and `G0 X0 Y0` as ordinary queued
    /// commands, not through the streaming engine.
    pub fn abort_stream(&mut self) -> Result<(), ControllerError> {
        if !self.is_streaming() {
            return Err(ControllerError::NotStreaming);
        }
        self.abort.store(true, Ordering::SeqCst);
        self.streaming.store(false, Ordering::SeqCst);
        self.write_realtime(RealtimeCommand::SoftReset)?;
        {
            let mut stream = self.stream.lock().unwrap();
            stream.inflight.clear();
        }
        set_status(&self.state, &self.observers, FirmwareStatus::Idle);

        if let Some(h) = self.tx_handle.take() {
            let _ = h.join();
        }
        std::thread::sleep(ABORT_SETTLE);
        let _ = self.send_command("M5");
        let _ = self.send_command("G0 X0 Y0");
        Ok(())
    }

    fn write_realtime(&self, cmd: RealtimeCommand) -> Result<(), ControllerError> {
        if !self.is_connected() {
            return Err(ControllerError::NotConnected);
        }
        let mut guard = self.writer.lock().unwrap();
        match guard.as_mut() {
            Some(w) => Ok(w.write(&[cmd.as_byte()])?),
            None => Err(ControllerError::NotConnected),
        }
    }

    pub fn soft_reset(&self) -> Result<(), ControllerError> {
        self.write_realtime(RealtimeCommand::SoftReset)
    }

    pub fn feed_hold(&self) -> Result<(), ControllerError> {
        self.write_realtime(RealtimeCommand::FeedHold)
    }

    pub fn cycle_resume(&self) -> Result<(), ControllerError> {
        self.write_realtime(RealtimeCommand::CycleResume)
    }

    pub fn jog_cancel(&self) -> Result<(), ControllerError> {
        self.write_realtime(RealtimeCommand::JogCancel)
    }

    /// Sends one line command, refused with [`ControllerError::Busy`]
    /// while a streaming run owns the link — the real-time commands above
    /// bypass this check entirely.
    pub fn send_command(&self, line: &str) -> Result<(), ControllerError> {
        if self.is_streaming() {
            return Err(ControllerError::Busy);
        }
        if !self.is_connected() {
            return Err(ControllerError::NotConnected);
        }
        let normalized = crate::gcode::normalize(line);
        let mut bytes = normalized.into_bytes();
        bytes.push(b'\n');
        let mut guard = self.writer.lock().unwrap();
        match guard.as_mut() {
            Some(w) => Ok(w.write(&bytes)?),
            None => Err(ControllerError::NotConnected),
        }
    }

    pub fn kill_alarm(&self) -> Result<(), ControllerError> {
        self.send_command(&LineCommand::Unlock.to_string())
    }

    pub fn homing(&self) -> Result<(), ControllerError> {
        self.send_command(&LineCommand::Home.to_string())
    }

    pub fn jog(
        &self,
        mode: JogMode,
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
        feed: f64,
    ) -> Result<(), ControllerError> {
        let cmd = LineCommand::Jog { mode, x, y, z, feed };
        self.send_command(&cmd.to_string())
    }

    pub fn set_zero(&self, x: bool, y: bool, z: bool) -> Result<(), ControllerError> {
        self.send_command(&LineCommand::SetZero { x, y, z }.to_string())
    }

    pub fn request_settings(&self) -> Result<(), ControllerError> {
        self.send_command(&LineCommand::SettingsRequest.to_string())
    }

    pub fn request_parser_state(&self) -> Result<(), ControllerError> {
        self.send_command(&LineCommand::ParserStateRequest.to_string())
    }

    pub fn request_build_info(&self) -> Result<(), ControllerError> {
        self.send_command(&LineCommand::BuildInfoRequest.to_string())
    }

    pub fn threading_mode(&self) -> ThreadingModePreset {
        self.threading_mode
    }

    /// Retunes the status-poll interval and inter-command pacing of any
    /// running threads in place, without restarting them.
    pub fn set_threading_mode(&mut self, preset: ThreadingModePreset) {
        self.threading_mode = preset;
        let params = preset.params();
        self.status_query_ms.store(params.status_query_ms, Ordering::SeqCst);
        self.tx_short_ms.store(params.tx_short_ms, Ordering::SeqCst);
    }

    pub fn on_status_change(&self, f: impl Fn(FirmwareStatus) + Send + Sync + 'static) {
        self.observers.write().unwrap().on_status_change(f);
    }

    pub fn on_position_update(&self, f: impl Fn() + Send + Sync + 'static) {
        self.observers.write().unwrap().on_position_update(f);
    }

    pub fn on_progress_update(&self, f: impl Fn(f64) + Send + Sync + 'static) {
        self.observers.write().unwrap().on_progress_update(f);
    }

    pub fn on_line_received(&self, f: impl Fn(&str) + Send + Sync + 'static) {
        self.observers.write().unwrap().on_line_received(f);
    }

    pub fn on_error(&self, f: impl Fn(&str) + Send + Sync + 'static) {
        self.observers.write().unwrap().on_error(f);
    }

    pub fn on_connected(&self, f: impl Fn() + Send + Sync + 'static) {
        self.observers.write().unwrap().on_connected(f);
    }

    pub fn on_disconnected(&self, f: impl Fn() + Send + Sync + 'static) {
        self.observers.write().unwrap().on_disconnected(f);
    }

    pub fn on_job_finished(&self, f: impl Fn() + Send + Sync + 'static) {
        self.observers.write().unwrap().on_job_finished(f);
    }
}

impl Default for GrblController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for GrblController {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        self.abort.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock_pair;
    use std::sync::atomic::AtomicUsize;

    fn connected_controller() -> (GrblController, crate::transport::MockTransportHandle) {
        let (transport, handle) = mock_pair(Duration::from_millis(20));
        let mut controller = GrblController::new();
        handle.push_line("Grbl 1.1h ['$' for help]");
        controller
            .connect_with_transport(Box::new(transport))
            .unwrap();
        // give the RX thread a moment to consume the welcome line
        let deadline = Instant::now() + Duration::from_secs(2);
        while controller.state().firmware_version.is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        (controller, handle)
    }

    #[test]
    fn two_controllers_are_independent_instances() {
        let a = GrblController::new();
        let b = GrblController::new();
        assert!(!a.is_connected());
        assert!(!b.is_connected());
    }

    #[test]
    fn connect_sees_welcome_line_and_becomes_idle() {
        let (controller, _handle) = connected_controller();
        assert!(controller.is_connected());
        assert_eq!(controller.state().firmware_status, FirmwareStatus::Idle);
        assert_eq!(controller.state().firmware_version, "1.1h");
    }

    #[test]
    fn send_command_normalizes_and_writes_a_line() {
        let (controller, handle) = connected_controller();
        controller.send_command("g1 x10 ; go").unwrap();
        let written = handle.recv_written(Duration::from_millis(200)).unwrap();
        assert_eq!(written, b"G1 X10\n".to_vec());
    }

    #[test]
    fn send_command_refused_while_streaming() {
        let (mut controller, _handle) = connected_controller();
        let program = Program::from_lines(["G0 X1", "G0 X2"], "t");
        controller.load_program(program).unwrap();
        controller.start_stream().unwrap();
        assert!(matches!(
            controller.send_command("$H"),
            Err(ControllerError::Busy)
        ));
        controller.abort_stream().unwrap();
    }

    #[test]
    fn streaming_completes_and_notifies_job_finished() {
        let (mut controller, handle) = connected_controller();
        let finished = Arc::new(AtomicBool::new(false));
        let finished_clone = finished.clone();
        controller.on_job_finished(move || finished_clone.store(true, Ordering::SeqCst));

        let program = Program::from_lines(["G0 X1", "G0 X2"], "t");
        controller.load_program(program).unwrap();
        controller.start_stream().unwrap();

        for _ in 0..2 {
            let _ = handle.recv_written(Duration::from_millis(500)).unwrap();
            handle.push_line("ok");
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        while !finished.load(Ordering::SeqCst) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(finished.load(Ordering::SeqCst));
        assert!(!controller.is_streaming());
        assert_eq!(controller.progress(), 100.0);
    }

    #[test]
    fn status_report_updates_position_and_fires_observer() {
        let (controller, handle) = connected_controller();
        let updates = Arc::new(AtomicUsize::new(0));
        let updates_clone = updates.clone();
        controller.on_position_update(move || {
            updates_clone.fetch_add(1, Ordering::SeqCst);
        });

        handle.push_line("<Run|MPos:1.000,2.000,0.000|FS:500,0>");
        let deadline = Instant::now() + Duration::from_secs(2);
        while updates.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(updates.load(Ordering::SeqCst), 1);
        assert_eq!(controller.state().machine_pos.x, 1.0);
        assert_eq!(controller.state().firmware_status, FirmwareStatus::Run);
    }

    #[test]
    fn realtime_write_does_not_stall_behind_a_blocked_read() {
        // A long read-timeout with nothing pushed means the RX worker sits
        // blocked inside readline() for the whole window below. A
        // real-time write must still complete promptly instead of queuing
        // behind that read on a shared lock.
        let (transport, handle) = mock_pair(Duration::from_secs(5));
        let mut controller = GrblController::new();
        handle.push_line("Grbl 1.1h ['$' for help]");
        controller
            .connect_with_transport(Box::new(transport))
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while controller.state().firmware_version.is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        // No further lines are pushed: the RX worker is now blocked inside
        // readline() for up to its 5s read-timeout.
        handle.drain_written();
        let started = Instant::now();
        controller.feed_hold().unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));

        // The status poller may also be writing `?` concurrently; look for
        // our `!` among whatever arrives rather than assuming it's first.
        let mut saw_feed_hold = false;
        let deadline = Instant::now() + Duration::from_millis(500);
        while Instant::now() < deadline {
            match handle.recv_written(Duration::from_millis(100)) {
                Some(chunk) if chunk == vec![b'!'] => {
                    saw_feed_hold = true;
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
        assert!(saw_feed_hold, "expected a feed-hold byte to reach the transport");
    }

    #[test]
    fn disconnect_is_idempotent() {
        let (mut controller, _handle) = connected_controller();
        controller.disconnect();
        assert!(!controller.is_connected());
        controller.disconnect();
        assert!(!controller.is_connected());
    }
}
