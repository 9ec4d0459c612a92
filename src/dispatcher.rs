use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::attachment::SpecialKey;
use crate::domain::{PaneAddress, PaneDimensions, Snapshot};
use crate::error::AttachError;
use crate::event::{ExitReason, PaneEvent};
use crate::pool::{ConnectOutcome, ConnectionPool};
use crate::snapshot::SnapshotService;

/// Whatever draws pane output. Events for one pane arrive in capture order.
pub trait DisplaySurface {
    fn write_output(&mut self, pane_id: &str, bytes: &[u8]);

    fn pane_exited(&mut self, pane_id: &str, code: Option<i32>, reason: ExitReason);

    fn input_failed(&mut self, _pane_id: &str, _reason: &str) {}

    fn on_event(&mut self, event: &PaneEvent) {
        match event {
            PaneEvent::Output { pane_id, payload } => {
                self.write_output(pane_id, &payload.to_bytes());
            }
            PaneEvent::InputFailed { pane_id, reason } => self.input_failed(pane_id, reason),
            PaneEvent::Exit {
                pane_id,
                code,
                reason,
            } => self.pane_exited(pane_id, *code, *reason),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UiCommand {
    Connect {
        logical_id: String,
        address: PaneAddress,
        dimensions: PaneDimensions,
    },
    Input {
        logical_id: String,
        bytes: Vec<u8>,
    },
    SpecialKey {
        logical_id: String,
        key: SpecialKey,
    },
    Resize {
        logical_id: String,
        cols: u16,
        rows: u16,
    },
    Focus {
        logical_id: String,
    },
    Disconnect {
        logical_id: String,
    },
    DisconnectAll,
    Snapshot {
        logical_id: String,
        address: PaneAddress,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CommandResult {
    Connect(Result<ConnectOutcome, AttachError>),
    Routed(bool),
    Snapshot(Option<Snapshot>),
    Done,
}

pub struct Dispatcher<S> {
    events: Receiver<PaneEvent>,
    surface: S,
}

impl<S: DisplaySurface> Dispatcher<S> {
    pub fn new(events: Receiver<PaneEvent>, surface: S) -> Self {
        Self { events, surface }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Forwards every pending event without blocking.
    pub fn pump(&mut self) -> usize {
        let mut forwarded = 0;
        while let Ok(event) = self.events.try_recv() {
            self.surface.on_event(&event);
            forwarded += 1;
        }
        forwarded
    }

    /// Waits up to `timeout` for the first event, then drains the rest.
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.events.recv_timeout(timeout) {
            Ok(event) => {
                self.surface.on_event(&event);
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }
}

/// Routes one UI command to the pool or the snapshot service.
pub fn apply_command(
    pool: &ConnectionPool,
    snapshots: &SnapshotService,
    command: UiCommand,
) -> CommandResult {
    match command {
        UiCommand::Connect {
            logical_id,
            address,
            dimensions,
        } => CommandResult::Connect(pool.connect(&logical_id, address, dimensions)),
        UiCommand::Input { logical_id, bytes } => {
            CommandResult::Routed(pool.send_input(&logical_id, &bytes))
        }
        UiCommand::SpecialKey { logical_id, key } => {
            CommandResult::Routed(pool.send_special_key(&logical_id, key))
        }
        UiCommand::Resize {
            logical_id,
            cols,
            rows,
        } => CommandResult::Routed(pool.resize(&logical_id, cols, rows)),
        UiCommand::Focus { logical_id } => {
            pool.focus(&logical_id);
            CommandResult::Done
        }
        UiCommand::Disconnect { logical_id } => {
            snapshots.discard(&logical_id);
            CommandResult::Routed(pool.disconnect(&logical_id))
        }
        UiCommand::DisconnectAll => {
            pool.disconnect_all();
            CommandResult::Done
        }
        UiCommand::Snapshot {
            logical_id,
            address,
        } => CommandResult::Snapshot(snapshots.capture(&logical_id, &address)),
    }
}
