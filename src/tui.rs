use std::collections::HashMap;

use crate::config::AppConfig;
use crate::domain::{PaneAddress, PaneDimensions, PaneInfo, Snapshot};
use crate::pool::PoolStatus;

pub use self::render_surface::render_to_string;
pub use self::terminal_surface::PaneTerminal;
pub use self::types::{AppEventResult, InputMode, LinkState, UiPane};

use crate::dispatcher::UiCommand;

mod key_handling;
mod model_core;
mod render_panes;
mod render_surface;
mod runtime_loop;
mod terminal_surface;
mod types;

const MIN_VIEWPORT: PaneDimensions = PaneDimensions { cols: 20, rows: 5 };

/// Dashboard state. Doubles as the display surface the dispatcher feeds.
pub struct AppModel {
    panes: Vec<UiPane>,
    selected: usize,
    input_mode: InputMode,
    terminals: HashMap<String, PaneTerminal>,
    snapshot: Option<Snapshot>,
    pool_status: Option<PoolStatus>,
    viewport: PaneDimensions,
    pending: Vec<UiCommand>,
    refresh_requested: bool,
    status_message: Option<String>,
}

pub fn run_tui(
    socket: Option<String>,
    config: AppConfig,
    sessions: Vec<String>,
) -> Result<(), String> {
    runtime_loop::run_tui(socket, config, sessions)
}

fn ui_pane_from_info(info: &PaneInfo) -> UiPane {
    UiPane {
        address: info.address(),
        window_index: info.window_index,
        window_name: info.window_name.clone(),
        pane_index: info.pane_index,
        current_command: info.current_command.clone(),
    }
}

/// Session filter for discovered panes; an empty filter keeps everything.
pub fn panes_for_sessions(discovered: &[PaneInfo], sessions: &[String]) -> Vec<UiPane> {
    let mut panes = discovered
        .iter()
        .filter(|info| sessions.is_empty() || sessions.contains(&info.session_name))
        .map(ui_pane_from_info)
        .collect::<Vec<_>>();
    panes.sort_by(|a, b| {
        a.address
            .session
            .cmp(&b.address.session)
            .then(a.window_index.cmp(&b.window_index))
            .then(a.pane_index.cmp(&b.pane_index))
            .then(a.address.pane_id.cmp(&b.address.pane_id))
    });
    panes
}

impl UiPane {
    pub fn new(session: &str, pane_id: &str, window_index: i64, window_name: &str) -> Self {
        Self {
            address: PaneAddress::new(session, pane_id),
            window_index,
            window_name: window_name.to_string(),
            pane_index: 0,
            current_command: "(none)".to_string(),
        }
    }

    pub fn logical_id(&self) -> String {
        self.address.to_string()
    }
}
