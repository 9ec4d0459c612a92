use std::collections::HashMap;

use crate::dispatcher::{CommandResult, UiCommand};
use crate::domain::{PaneDimensions, Snapshot};
use crate::error::AttachError;
use crate::pool::{ConnectOutcome, PoolStatus};

use super::{AppModel, InputMode, LinkState, MIN_VIEWPORT, PaneTerminal, UiPane};

impl AppModel {
    pub fn new(panes: Vec<UiPane>) -> Self {
        let mut model = Self {
            panes,
            selected: 0,
            input_mode: InputMode::Command,
            terminals: HashMap::new(),
            snapshot: None,
            pool_status: None,
            viewport: PaneDimensions::new(80, 24),
            pending: Vec::new(),
            refresh_requested: false,
            status_message: None,
        };
        model.queue_selection_commands();
        model
    }

    pub fn panes(&self) -> &[UiPane] {
        &self.panes
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_pane(&self) -> Option<&UiPane> {
        self.panes.get(self.selected)
    }

    pub fn selected_logical_id(&self) -> Option<String> {
        self.selected_pane().map(UiPane::logical_id)
    }

    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    pub fn viewport(&self) -> PaneDimensions {
        self.viewport
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn pool_status(&self) -> Option<&PoolStatus> {
        self.pool_status.as_ref()
    }

    pub fn terminal(&self, logical_id: &str) -> Option<&PaneTerminal> {
        self.terminals.get(logical_id)
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    pub fn clear_status_message(&mut self) {
        self.status_message = None;
    }

    pub fn link_state(&self, logical_id: &str) -> LinkState {
        if let Some(status) = &self.pool_status {
            if status
                .connected
                .iter()
                .any(|entry| entry.logical_id == logical_id)
            {
                return LinkState::Connected;
            }
            if status.connecting.iter().any(|id| id == logical_id) {
                return LinkState::Connecting;
            }
        }
        match self.terminals.get(logical_id).and_then(PaneTerminal::exit) {
            Some((_, reason)) => LinkState::Ended(reason),
            None => LinkState::Idle,
        }
    }

    pub fn is_selected_live(&self) -> bool {
        self.selected_logical_id().is_some_and(|id| {
            matches!(
                self.link_state(&id),
                LinkState::Connected | LinkState::Connecting
            )
        })
    }

    pub fn set_pool_status(&mut self, status: PoolStatus) {
        self.pool_status = Some(status);
    }

    /// Replaces the pane list, keeping the selection on the same pane when
    /// it still exists.
    pub fn set_panes(&mut self, panes: Vec<UiPane>) {
        let previous = self.selected_logical_id();
        self.panes = panes;
        let index = previous.and_then(|id| {
            self.panes
                .iter()
                .position(|pane| pane.logical_id() == id)
        });
        match index {
            Some(index) => self.selected = index,
            None => {
                self.selected = self.selected.min(self.panes.len().saturating_sub(1));
                self.queue_selection_commands();
            }
        }
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.panes.len() {
            self.selected += 1;
            self.queue_selection_commands();
        }
    }

    pub fn select_previous(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.queue_selection_commands();
        }
    }

    /// Resizes every emulated screen and asks the pool to follow.
    pub fn set_viewport(&mut self, viewport: PaneDimensions) {
        let viewport = PaneDimensions::new(
            viewport.cols.max(MIN_VIEWPORT.cols),
            viewport.rows.max(MIN_VIEWPORT.rows),
        );
        if viewport == self.viewport {
            return;
        }
        self.viewport = viewport;
        for terminal in self.terminals.values_mut() {
            terminal.resize(viewport);
        }
        let connected = self
            .pool_status
            .as_ref()
            .map(|status| {
                status
                    .connected
                    .iter()
                    .map(|entry| entry.logical_id.clone())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        for logical_id in connected {
            self.pending.push(UiCommand::Resize {
                logical_id,
                cols: viewport.cols,
                rows: viewport.rows,
            });
        }
    }

    pub fn take_commands(&mut self) -> Vec<UiCommand> {
        std::mem::take(&mut self.pending)
    }

    pub fn request_refresh(&mut self) {
        self.refresh_requested = true;
    }

    pub fn take_refresh_request(&mut self) -> bool {
        std::mem::take(&mut self.refresh_requested)
    }

    pub(super) fn push_command(&mut self, command: UiCommand) {
        self.pending.push(command);
    }

    pub(super) fn connect_selected(&mut self) {
        let Some(pane) = self.selected_pane() else {
            self.set_status_message("no pane selected");
            return;
        };
        let logical_id = pane.logical_id();
        let address = pane.address.clone();
        if self.is_selected_live() {
            self.pending.push(UiCommand::Focus { logical_id });
            return;
        }
        self.pending.push(UiCommand::Connect {
            logical_id: logical_id.clone(),
            address,
            dimensions: self.viewport,
        });
        self.pending.push(UiCommand::Focus { logical_id });
    }

    pub(super) fn disconnect_selected(&mut self) {
        if let Some(logical_id) = self.selected_logical_id() {
            self.pending.push(UiCommand::Disconnect { logical_id });
        }
    }

    pub(super) fn refresh_snapshot(&mut self) {
        if let Some(pane) = self.selected_pane() {
            self.pending.push(UiCommand::Snapshot {
                logical_id: pane.logical_id(),
                address: pane.address.clone(),
            });
        }
    }

    fn queue_selection_commands(&mut self) {
        self.snapshot = None;
        let Some(logical_id) = self.selected_logical_id() else {
            return;
        };
        if self.is_selected_live() {
            self.pending.push(UiCommand::Focus { logical_id });
        } else {
            self.refresh_snapshot();
        }
    }

    /// Folds the outcome of an executed command back into the view.
    pub fn apply_result(&mut self, command: &UiCommand, result: CommandResult) {
        match (command, result) {
            (UiCommand::Connect { logical_id, .. }, CommandResult::Connect(outcome)) => {
                match outcome {
                    Ok(ConnectOutcome::Connecting { evicted }) => {
                        self.terminals
                            .insert(logical_id.clone(), PaneTerminal::new(self.viewport));
                        self.set_status_message(match evicted {
                            Some(victim) => format!("connecting {logical_id} (evicted {victim})"),
                            None => format!("connecting {logical_id}"),
                        });
                    }
                    Ok(ConnectOutcome::AlreadyActive) => {}
                    Ok(ConnectOutcome::Rejected) => {
                        let max = self
                            .pool_status
                            .as_ref()
                            .map(|status| status.max_connections)
                            .unwrap_or_default();
                        self.set_status_message(AttachError::CapacityExceeded { max }.to_string());
                    }
                    Err(err) => self.set_status_message(err.to_string()),
                }
            }
            (UiCommand::Snapshot { logical_id, .. }, CommandResult::Snapshot(snapshot)) => {
                if self.selected_logical_id().as_deref() == Some(logical_id.as_str()) {
                    self.snapshot = snapshot;
                }
            }
            (UiCommand::Input { logical_id, .. }, CommandResult::Routed(false))
            | (UiCommand::SpecialKey { logical_id, .. }, CommandResult::Routed(false)) => {
                self.set_status_message(format!("{logical_id} is not connected"));
            }
            (UiCommand::Disconnect { logical_id }, CommandResult::Routed(true)) => {
                self.set_status_message(format!("disconnected {logical_id}"));
            }
            _ => {}
        }
    }
}
