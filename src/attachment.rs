use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::{CaptureRange, PaneAddress, PaneDimensions};
use crate::error::AttachError;
use crate::event::{ExitReason, OutputPayload, PaneEvent};
use crate::tmux::{MonitorProcess, TmuxBackend};

mod keys;
mod tracker;

pub use keys::SpecialKey;
pub use tracker::{
    Fingerprint, ScreenTracker, WAITING_PLACEHOLDER, backlog_shows_screen, fingerprint, is_blank,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(150);
pub const DEFAULT_BACKLOG_LINES: usize = 1000;
const INPUT_ECHO_DELAY: Duration = Duration::from_millis(25);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttachmentState {
    Connecting,
    Connected,
    Ended,
    Failed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StreamConfig {
    pub poll_interval: Duration,
    pub backlog_lines: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            backlog_lines: DEFAULT_BACKLOG_LINES,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LifecycleSignal {
    Confirmed { logical_id: String, serial: u64 },
    Ended { logical_id: String, serial: u64 },
}

pub type LifecycleNotifier = Box<dyn Fn(LifecycleSignal) + Send + 'static>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LoopOutcome {
    pub reason: ExitReason,
    pub code: Option<i32>,
    pub exit_emitted: bool,
}

// Emission holds the gate lock across the send, so nothing is published
// once the pool has closed the gate.
#[derive(Debug)]
struct EmitGate {
    open: Mutex<bool>,
    events: Sender<PaneEvent>,
}

impl EmitGate {
    fn emit(&self, event: PaneEvent) -> bool {
        let open = lock_ignoring_poison(&self.open);
        if !*open {
            return false;
        }
        self.events.send(event).is_ok()
    }

    fn close(&self) {
        *lock_ignoring_poison(&self.open) = false;
    }
}

enum LoopCommand {
    Start,
    Input(Vec<u8>),
    Key(SpecialKey),
    Resize(PaneDimensions),
    Stop,
}

#[derive(Debug)]
struct SharedStatus {
    state: AttachmentState,
    dimensions: PaneDimensions,
}

pub struct AttachmentHandle {
    logical_id: String,
    serial: u64,
    address: PaneAddress,
    created_at: DateTime<Utc>,
    commands: Sender<LoopCommand>,
    gate: Arc<EmitGate>,
    status: Arc<Mutex<SharedStatus>>,
    thread: Option<JoinHandle<LoopOutcome>>,
}

impl std::fmt::Debug for AttachmentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentHandle")
            .field("logical_id", &self.logical_id)
            .field("serial", &self.serial)
            .field("address", &self.address)
            .field("state", &self.state())
            .finish()
    }
}

pub struct AttachmentRequest {
    pub logical_id: String,
    pub serial: u64,
    pub address: PaneAddress,
    pub dimensions: PaneDimensions,
    pub config: StreamConfig,
}

/// Spawns the monitor process and the poll thread. The loop stays idle until
/// [`AttachmentHandle::start`] so the owner can record the handle first.
pub fn spawn_attachment(
    backend: Arc<dyn TmuxBackend>,
    request: AttachmentRequest,
    events: Sender<PaneEvent>,
    notifier: LifecycleNotifier,
) -> Result<AttachmentHandle, AttachError> {
    let AttachmentRequest {
        logical_id,
        serial,
        address,
        dimensions,
        config,
    } = request;

    let monitor = backend
        .spawn_monitor(&address, dimensions)
        .map_err(|reason| AttachError::SpawnFailure {
            target: address.to_string(),
            reason,
        })?;

    let (commands, command_rx) = mpsc::channel();
    let gate = Arc::new(EmitGate {
        open: Mutex::new(true),
        events,
    });
    let status = Arc::new(Mutex::new(SharedStatus {
        state: AttachmentState::Connecting,
        dimensions,
    }));

    // The monitor is handed to the thread through a slot so a failed thread
    // spawn can still reap it.
    let monitor_slot = Arc::new(Mutex::new(Some(monitor)));
    let poll_loop = PollLoop {
        logical_id: logical_id.clone(),
        serial,
        address: address.clone(),
        config,
        backend,
        monitor_slot: monitor_slot.clone(),
        commands: command_rx,
        gate: gate.clone(),
        status: status.clone(),
        notifier,
        tracker: ScreenTracker::default(),
    };

    let thread = thread::Builder::new()
        .name(format!("tether-poll-{logical_id}"))
        .spawn(move || poll_loop.run());
    let thread = match thread {
        Ok(thread) => thread,
        Err(err) => {
            if let Some(monitor) = lock_ignoring_poison(&monitor_slot).take() {
                monitor.terminate();
            }
            return Err(AttachError::SpawnFailure {
                target: address.to_string(),
                reason: format!("failed to spawn poll thread: {err}"),
            });
        }
    };

    debug!(pane = %logical_id, address = %address, serial, "attachment spawned");
    Ok(AttachmentHandle {
        logical_id,
        serial,
        address,
        created_at: Utc::now(),
        commands,
        gate,
        status,
        thread: Some(thread),
    })
}

impl AttachmentHandle {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn address(&self) -> &PaneAddress {
        &self.address
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> AttachmentState {
        lock_ignoring_poison(&self.status).state
    }

    pub fn dimensions(&self) -> PaneDimensions {
        lock_ignoring_poison(&self.status).dimensions
    }

    pub fn start(&self) {
        let _ = self.commands.send(LoopCommand::Start);
    }

    pub fn send_input(&self, bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return true;
        }
        self.commands
            .send(LoopCommand::Input(bytes.to_vec()))
            .is_ok()
    }

    pub fn send_special_key(&self, key: SpecialKey) -> bool {
        self.commands.send(LoopCommand::Key(key)).is_ok()
    }

    // The tmux pane keeps its own geometry; only the monitor client resizes.
    pub fn resize(&self, dimensions: PaneDimensions) -> bool {
        lock_ignoring_poison(&self.status).dimensions = dimensions;
        self.commands.send(LoopCommand::Resize(dimensions)).is_ok()
    }

    pub fn cancel(&self) {
        self.gate.close();
    }

    pub fn shutdown(mut self) -> LoopOutcome {
        self.cancel();
        let _ = self.commands.send(LoopCommand::Stop);
        let outcome = match self.thread.take().map(JoinHandle::join) {
            Some(Ok(outcome)) => outcome,
            Some(Err(_)) => {
                warn!(pane = %self.logical_id, "poll thread panicked");
                LoopOutcome {
                    reason: ExitReason::Failed,
                    code: None,
                    exit_emitted: false,
                }
            }
            None => LoopOutcome {
                reason: ExitReason::Disconnected,
                code: None,
                exit_emitted: false,
            },
        };
        let mut status = lock_ignoring_poison(&self.status);
        if status.state != AttachmentState::Failed {
            status.state = AttachmentState::Ended;
        }
        outcome
    }
}

impl Drop for AttachmentHandle {
    fn drop(&mut self) {
        // A dropped handle still owns a live loop; stop it without waiting.
        if self.thread.is_some() {
            self.gate.close();
            let _ = self.commands.send(LoopCommand::Stop);
        }
    }
}

struct PollLoop {
    logical_id: String,
    serial: u64,
    address: PaneAddress,
    config: StreamConfig,
    backend: Arc<dyn TmuxBackend>,
    monitor_slot: Arc<Mutex<Option<Box<dyn MonitorProcess>>>>,
    commands: Receiver<LoopCommand>,
    gate: Arc<EmitGate>,
    status: Arc<Mutex<SharedStatus>>,
    notifier: LifecycleNotifier,
    tracker: ScreenTracker,
}

enum CycleOutcome {
    Continue,
    Finished { reason: ExitReason, code: Option<i32> },
}

impl PollLoop {
    fn run(mut self) -> LoopOutcome {
        let Some(mut monitor) = lock_ignoring_poison(&self.monitor_slot).take() else {
            return self.finish_without_monitor();
        };

        if !self.wait_for_start(&mut *monitor) {
            let exit = monitor.terminate();
            return LoopOutcome {
                reason: ExitReason::Disconnected,
                code: exit.code,
                exit_emitted: false,
            };
        }

        if let Err(err) = self.initial_capture() {
            warn!(pane = %self.logical_id, address = %self.address, error = %err, "initial capture failed");
            monitor.terminate();
            return self.finish_self(ExitReason::Failed, None);
        }
        self.set_state(AttachmentState::Connected);
        (self.notifier)(LifecycleSignal::Confirmed {
            logical_id: self.logical_id.clone(),
            serial: self.serial,
        });

        let mut next_capture = Instant::now() + self.config.poll_interval;
        loop {
            let timeout = next_capture.saturating_duration_since(Instant::now());
            match self.commands.recv_timeout(timeout) {
                Ok(LoopCommand::Stop) | Err(RecvTimeoutError::Disconnected) => {
                    let exit = monitor.terminate();
                    return LoopOutcome {
                        reason: ExitReason::Disconnected,
                        code: exit.code,
                        exit_emitted: false,
                    };
                }
                Ok(LoopCommand::Start) => continue,
                Ok(LoopCommand::Input(bytes)) => {
                    self.forward_input(|backend, address| backend.send_literal(address, &bytes));
                    next_capture = next_capture.min(Instant::now() + INPUT_ECHO_DELAY);
                    continue;
                }
                Ok(LoopCommand::Key(key)) => {
                    self.forward_input(|backend, address| {
                        backend.send_named_key(address, &key.tmux_name())
                    });
                    next_capture = next_capture.min(Instant::now() + INPUT_ECHO_DELAY);
                    continue;
                }
                Ok(LoopCommand::Resize(dimensions)) => {
                    if let Err(err) = monitor.resize(dimensions) {
                        warn!(pane = %self.logical_id, error = %err, "monitor resize failed");
                    }
                    continue;
                }
                Err(RecvTimeoutError::Timeout) => {}
            }

            next_capture = Instant::now() + self.config.poll_interval;
            if let CycleOutcome::Finished { reason, code } = self.cycle(&mut *monitor) {
                let exit = monitor.terminate();
                let code = if reason == ExitReason::MonitorExited {
                    code.or(exit.code)
                } else {
                    code
                };
                return self.finish_self(reason, code);
            }
        }
    }

    fn wait_for_start(&self, monitor: &mut dyn MonitorProcess) -> bool {
        loop {
            match self.commands.recv() {
                Ok(LoopCommand::Start) => return true,
                Ok(LoopCommand::Resize(dimensions)) => {
                    let _ = monitor.resize(dimensions);
                }
                Ok(LoopCommand::Input(_)) | Ok(LoopCommand::Key(_)) => {
                    debug!(pane = %self.logical_id, "input dropped before start");
                }
                Ok(LoopCommand::Stop) | Err(_) => return false,
            }
        }
    }

    fn initial_capture(&mut self) -> Result<(), String> {
        let screen = self
            .backend
            .capture_pane(&self.address, CaptureRange::Visible);
        let backlog = self.backend.capture_pane(
            &self.address,
            CaptureRange::Backlog(self.config.backlog_lines),
        )?;

        // Seed only with a screen the backlog already shows; otherwise the
        // first cycle redraws.
        match screen {
            Ok(screen) if backlog_shows_screen(&backlog, &screen) => self.tracker.seed(&screen),
            Ok(_) => debug!(pane = %self.logical_id, "screen moved during startup capture"),
            Err(err) => debug!(pane = %self.logical_id, error = %err, "seed capture failed"),
        }

        let payload = if is_blank(&backlog) {
            OutputPayload::Backlog(WAITING_PLACEHOLDER.to_string())
        } else {
            OutputPayload::Backlog(backlog)
        };
        self.emit_output(payload);
        Ok(())
    }

    fn cycle(&mut self, monitor: &mut dyn MonitorProcess) -> CycleOutcome {
        if !self.backend.session_exists(&self.address.session) {
            info!(pane = %self.logical_id, address = %self.address, "session ended");
            return CycleOutcome::Finished {
                reason: ExitReason::PaneEnded,
                code: None,
            };
        }
        if let Some(exit) = monitor.try_exit() {
            warn!(pane = %self.logical_id, code = ?exit.code, "monitor exited");
            return CycleOutcome::Finished {
                reason: ExitReason::MonitorExited,
                code: exit.code,
            };
        }

        match self
            .backend
            .capture_pane(&self.address, CaptureRange::Visible)
        {
            Ok(screen) => {
                if self.tracker.observe_screen(&screen) {
                    self.emit_output(OutputPayload::Redraw(screen));
                }
            }
            Err(err) => {
                if !self.backend.exists(&self.address) {
                    info!(pane = %self.logical_id, address = %self.address, "pane ended");
                    return CycleOutcome::Finished {
                        reason: ExitReason::PaneEnded,
                        code: None,
                    };
                }
                warn!(pane = %self.logical_id, error = %err, "capture failed; skipping cycle");
                return CycleOutcome::Continue;
            }
        }

        match self.backend.cursor_position(&self.address) {
            Ok(position) => {
                if self.tracker.observe_cursor(position) {
                    self.emit_output(OutputPayload::Cursor(position));
                }
            }
            Err(err) => debug!(pane = %self.logical_id, error = %err, "cursor query failed"),
        }
        CycleOutcome::Continue
    }

    fn forward_input<F>(&self, send: F)
    where
        F: FnOnce(&dyn TmuxBackend, &PaneAddress) -> Result<(), String>,
    {
        if let Err(err) = send(self.backend.as_ref(), &self.address) {
            warn!(pane = %self.logical_id, error = %err, "input injection failed");
            let failure = AttachError::InjectionFailure {
                pane_id: self.logical_id.clone(),
                reason: err,
            };
            self.gate.emit(PaneEvent::InputFailed {
                pane_id: self.logical_id.clone(),
                reason: failure.to_string(),
            });
        }
    }

    fn emit_output(&self, payload: OutputPayload) {
        self.gate.emit(PaneEvent::Output {
            pane_id: self.logical_id.clone(),
            payload,
        });
    }

    fn set_state(&self, state: AttachmentState) {
        lock_ignoring_poison(&self.status).state = state;
    }

    fn finish_self(&self, reason: ExitReason, code: Option<i32>) -> LoopOutcome {
        self.set_state(if reason == ExitReason::Failed {
            AttachmentState::Failed
        } else {
            AttachmentState::Ended
        });
        let exit_emitted = self.gate.emit(PaneEvent::Exit {
            pane_id: self.logical_id.clone(),
            code,
            reason,
        });
        (self.notifier)(LifecycleSignal::Ended {
            logical_id: self.logical_id.clone(),
            serial: self.serial,
        });
        LoopOutcome {
            reason,
            code,
            exit_emitted,
        }
    }

    fn finish_without_monitor(&self) -> LoopOutcome {
        self.finish_self(ExitReason::Failed, None)
    }
}

pub(crate) fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
