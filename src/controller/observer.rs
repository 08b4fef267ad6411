//! Observer callbacks.
//!
//! Plain callback slots rather than a single tagged-event interface. Each
//! slot is optional; all are invoked from worker-thread context and must
//! be non-blocking.
//!
//! Observers must not hold a strong reference back to the controller that
//! owns them — this is documented, not statically enforced, since
//! `Arc<dyn Fn>` cannot express a weak back-reference constraint in the
//! type system without extra plumbing.

use super::state::FirmwareStatus;
use std::sync::Arc;

type VoidFn = Arc<dyn Fn() + Send + Sync>;
type StatusFn = Arc<dyn Fn(FirmwareStatus) + Send + Sync>;
type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;
type LineFn = Arc<dyn Fn(&str) + Send + Sync>;
type ErrorFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Registered observer callbacks. Construct with [`Observers::default`] and
/// register only the events a collaborator cares about.
#[derive(Clone, Default)]
pub struct Observers {
    status_change: Option<StatusFn>,
    position_update: Option<VoidFn>,
    progress_update: Option<ProgressFn>,
    line_received: Option<LineFn>,
    error: Option<ErrorFn>,
    connected: Option<VoidFn>,
    disconnected: Option<VoidFn>,
    job_finished: Option<VoidFn>,
}

impl Observers {
    pub fn on_status_change(&mut self, f: impl Fn(FirmwareStatus) + Send + Sync + 'static) {
        self.status_change = Some(Arc::new(f));
    }

    pub fn on_position_update(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.position_update = Some(Arc::new(f));
    }

    pub fn on_progress_update(&mut self, f: impl Fn(f64) + Send + Sync + 'static) {
        self.progress_update = Some(Arc::new(f));
    }

    pub fn on_line_received(&mut self, f: impl Fn(&str) + Send + Sync + 'static) {
        self.line_received = Some(Arc::new(f));
    }

    pub fn on_error(&mut self, f: impl Fn(&str) + Send + Sync + 'static) {
        self.error = Some(Arc::new(f));
    }

    pub fn on_connected(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.connected = Some(Arc::new(f));
    }

    pub fn on_disconnected(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.disconnected = Some(Arc::new(f));
    }

    pub fn on_job_finished(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.job_finished = Some(Arc::new(f));
    }

    pub(crate) fn notify_status_change(&self, status: FirmwareStatus) {
        if let Some(f) = &self.status_change {
            f(status);
        }
    }

    pub(crate) fn notify_position_update(&self) {
        if let Some(f) = &self.position_update {
            f();
        }
    }

    pub(crate) fn notify_progress_update(&self, percent: f64) {
        if let Some(f) = &self.progress_update {
            f(percent);
        }
    }

    pub(crate) fn notify_line_received(&self, line: &str) {
        if let Some(f) = &self.line_received {
            f(line);
        }
    }

    pub(crate) fn notify_error(&self, message: &str) {
        if let Some(f) = &self.error {
            f(message);
        }
    }

    pub(crate) fn notify_connected(&self) {
        if let Some(f) = &self.connected {
            f();
        }
    }

    pub(crate) fn notify_disconnected(&self) {
        if let Some(f) = &self.disconnected {
            f();
        }
    }

    pub(crate) fn notify_job_finished(&self) {
        if let Some(f) = &self.job_finished {
            f();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn unregistered_observer_is_a_no_op() {
        let observers = Observers::default();
        observers.notify_connected();
        observers.notify_status_change(FirmwareStatus::Idle);
    }

    #[test]
    fn registered_observer_fires() {
        let mut observers = Observers::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        observers.on_connected(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        observers.notify_connected();
        observers.notify_connected();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn status_observer_receives_value() {
        let mut observers = Observers::default();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        observers.on_status_change(move |status| {
            seen_clone.lock().unwrap().push(status);
        });
        observers.notify_status_change(FirmwareStatus::Run);
        assert_eq!(*seen.lock().unwrap(), vec![FirmwareStatus::Run]);
    }
}
