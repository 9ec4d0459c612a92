use std::io::{self, stdout};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::dispatcher::{Dispatcher, apply_command};
use crate::pool::ConnectionPool;
use crate::snapshot::SnapshotService;
use crate::tmux::SystemTmuxAdapter;

use super::render_surface::{content_viewport, render};
use super::{AppEventResult, AppModel, UiPane, panes_for_sessions};

const UI_TICK: Duration = Duration::from_millis(50);
const PANE_RESCAN_INTERVAL: Duration = Duration::from_secs(2);

pub(super) fn run_tui(
    socket: Option<String>,
    config: AppConfig,
    sessions: Vec<String>,
) -> Result<(), String> {
    let adapter = Arc::new(SystemTmuxAdapter::new(socket));
    let initial_panes = discover(&adapter, &sessions)?;

    enable_raw_mode().map_err(|err| format!("failed to enable raw mode: {err}"))?;
    let _guard = TerminalGuard;
    execute!(stdout(), EnterAlternateScreen)
        .map_err(|err| format!("failed to enter alternate screen: {err}"))?;
    let backend = CrosstermBackend::new(stdout());
    let mut terminal =
        Terminal::new(backend).map_err(|err| format!("failed to create terminal: {err}"))?;

    let (events_tx, events_rx) = mpsc::channel();
    let pool = ConnectionPool::new(adapter.clone(), config.pool_config(), events_tx);
    let snapshots = SnapshotService::new(adapter.clone(), config.snapshot_lines);
    let mut dispatcher = Dispatcher::new(events_rx, AppModel::new(initial_panes));
    info!(sessions = ?sessions, "dashboard started");

    let mut last_rescan = Instant::now();
    loop {
        let size = terminal
            .size()
            .map_err(|err| format!("failed to read terminal size: {err}"))?;
        let model = dispatcher.surface_mut();
        model.set_viewport(content_viewport(Rect::new(0, 0, size.width, size.height)));
        model.set_pool_status(pool.status());
        for command in model.take_commands() {
            let result = apply_command(&pool, &snapshots, command.clone());
            model.apply_result(&command, result);
        }
        model.set_pool_status(pool.status());

        dispatcher.pump();
        terminal
            .draw(|frame| render(frame, dispatcher.surface()))
            .map_err(|err| format!("failed to draw frame: {err}"))?;

        if event::poll(UI_TICK).map_err(|err| format!("event poll failed: {err}"))?
            && let Event::Key(key) =
                event::read().map_err(|err| format!("event read failed: {err}"))?
        {
            if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                continue;
            }
            if dispatcher.surface_mut().handle_key(key) == AppEventResult::Quit {
                break;
            }
        }

        let model = dispatcher.surface_mut();
        if model.take_refresh_request() || last_rescan.elapsed() >= PANE_RESCAN_INTERVAL {
            match discover(&adapter, &sessions) {
                Ok(panes) => model.set_panes(panes),
                Err(err) => {
                    warn!(error = %err, "pane rescan failed");
                    model.set_status_message(format!("rescan failed: {err}"));
                }
            }
            last_rescan = Instant::now();
        }
    }

    pool.disconnect_all();
    Ok(())
}

fn discover(adapter: &SystemTmuxAdapter, sessions: &[String]) -> Result<Vec<UiPane>, String> {
    let discovered = adapter.discover_panes()?;
    Ok(panes_for_sessions(&discovered, sessions))
}

struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}
