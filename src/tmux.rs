use std::collections::HashSet;

use crate::domain::{CaptureRange, CursorPosition, PaneAddress, PaneDimensions, PaneInfo};

mod control;
mod parser;
mod system;

pub use system::SystemTmuxAdapter;

const LIST_PANES_DELIM: &str = "__TETHER_FIELD__";

/// Resolves pane addresses against the live tmux server. Every tmux error is
/// treated as "not found"; nothing here retries.
pub trait PaneLocator: Send + Sync {
    fn session_exists(&self, session: &str) -> bool;

    fn list_panes(&self, session: &str) -> Result<HashSet<String>, String>;

    fn exists(&self, address: &PaneAddress) -> bool {
        self.session_exists(&address.session)
            && self
                .list_panes(&address.session)
                .map(|panes| panes.contains(&address.pane_id))
                .unwrap_or(false)
    }
}

/// The observational side of an attachment: buffer captures, cursor queries
/// and the read-only monitor process.
pub trait OutputSource: Send + Sync {
    fn capture_pane(&self, address: &PaneAddress, range: CaptureRange) -> Result<String, String>;

    fn cursor_position(&self, address: &PaneAddress) -> Result<CursorPosition, String>;

    fn spawn_monitor(
        &self,
        address: &PaneAddress,
        dimensions: PaneDimensions,
    ) -> Result<Box<dyn MonitorProcess>, String>;
}

/// The control side of an attachment. Keystrokes go straight to the pane,
/// never through the monitor process.
pub trait InputSink: Send + Sync {
    fn send_literal(&self, address: &PaneAddress, bytes: &[u8]) -> Result<(), String>;

    fn send_named_key(&self, address: &PaneAddress, key: &str) -> Result<(), String>;
}

pub trait TmuxBackend: PaneLocator + OutputSource + InputSink {}

impl<T: PaneLocator + OutputSource + InputSink> TmuxBackend for T {}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MonitorExit {
    pub code: Option<i32>,
}

pub trait MonitorProcess: Send {
    fn resize(&mut self, dimensions: PaneDimensions) -> Result<(), String>;

    /// Returns the exit status if the process already stopped on its own.
    fn try_exit(&mut self) -> Option<MonitorExit>;

    fn terminate(self: Box<Self>) -> MonitorExit;
}

pub fn parse_list_panes_output(output: &str) -> Result<Vec<PaneInfo>, String> {
    parser::parse_list_panes_output(output)
}
