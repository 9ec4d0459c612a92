use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser, Subcommand};

use crate::config::{AppConfig, CONFIG_PATH_ENV, default_config_path, default_log_path};
use crate::dispatcher::{DisplaySurface, Dispatcher};
use crate::domain::{PaneAddress, PaneDimensions};
use crate::error::AttachError;
use crate::event::{ExitReason, PaneEvent};
use crate::logging::{LogTarget, init_logging};
use crate::pool::{ConnectOutcome, ConnectionPool};
use crate::snapshot::SnapshotService;
use crate::tmux::{PaneLocator, SystemTmuxAdapter};
use crate::tui::run_tui;

const WATCH_PUMP_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Parser)]
#[command(name = "tether", about = "Attach to tmux panes and stream their output")]
struct Cli {
    #[arg(long, global = true, env = "TETHER_TMUX_SOCKET")]
    tmux_socket: Option<String>,
    #[arg(long, global = true, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the panes of a session.
    Panes { session: String },
    /// Print the last lines of a pane.
    Snapshot {
        target: PaneAddress,
        #[arg(long)]
        lines: Option<usize>,
    },
    /// Stream pane events as JSON lines.
    Watch {
        target: PaneAddress,
        #[arg(long)]
        duration_ms: Option<u64>,
        #[arg(long)]
        cols: Option<u16>,
        #[arg(long)]
        rows: Option<u16>,
    },
    /// Interactive dashboard.
    Tui { sessions: Vec<String> },
}

pub fn run() -> i32 {
    match Cli::try_parse() {
        Ok(cli) => run_command(cli),
        Err(err) => {
            let code = err.exit_code();
            let _ = err.print();
            code
        }
    }
}

fn run_command(cli: Cli) -> i32 {
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = load_config_or_default(&config_path);
    let socket = cli.tmux_socket;
    match cli.command {
        Some(Commands::Panes { session }) => {
            init_logging(&config, LogTarget::Stderr);
            run_panes(socket, &session)
        }
        Some(Commands::Snapshot { target, lines }) => {
            init_logging(&config, LogTarget::Stderr);
            run_snapshot(socket, &config, &target, lines)
        }
        Some(Commands::Watch {
            target,
            duration_ms,
            cols,
            rows,
        }) => {
            init_logging(&config, LogTarget::Stderr);
            let dimensions = PaneDimensions::new(
                cols.unwrap_or(config.default_cols),
                rows.unwrap_or(config.default_rows),
            );
            run_watch(
                socket,
                &config,
                target,
                dimensions,
                duration_ms.map(Duration::from_millis),
            )
        }
        Some(Commands::Tui { sessions }) => {
            let log_path = default_log_path();
            init_logging(&config, LogTarget::File(&log_path));
            match run_tui(socket, config, sessions) {
                Ok(()) => 0,
                Err(err) => {
                    eprintln!("{err}");
                    1
                }
            }
        }
        None => {
            let mut command = Cli::command();
            let _ = command.print_help();
            println!();
            0
        }
    }
}

fn load_config_or_default(path: &std::path::Path) -> AppConfig {
    match AppConfig::load_from_path(path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("warning: {err}");
            AppConfig::default()
        }
    }
}

fn run_panes(socket: Option<String>, session: &str) -> i32 {
    let adapter = SystemTmuxAdapter::new(socket);
    if !adapter.session_exists(session) {
        eprintln!("session not found: {session}");
        return 1;
    }

    let mut panes = match adapter.discover_panes() {
        Ok(panes) => panes,
        Err(err) => {
            eprintln!("failed to list tmux panes: {err}");
            return 1;
        }
    };
    panes.retain(|pane| pane.session_name == session);
    panes.sort_by(|a, b| {
        a.window_index
            .cmp(&b.window_index)
            .then(a.pane_index.cmp(&b.pane_index))
            .then(a.pane_id.cmp(&b.pane_id))
    });

    println!("session {session}");
    let mut current_window: Option<i64> = None;
    for pane in panes {
        if current_window != Some(pane.window_index) {
            println!("  window {}:{}", pane.window_index, pane.window_name);
            current_window = Some(pane.window_index);
        }
        println!(
            "    pane {} {} run={}",
            pane.pane_index, pane.pane_id, pane.current_command
        );
    }
    0
}

fn run_snapshot(
    socket: Option<String>,
    config: &AppConfig,
    target: &PaneAddress,
    lines: Option<usize>,
) -> i32 {
    let adapter = Arc::new(SystemTmuxAdapter::new(socket));
    let service = SnapshotService::new(adapter, lines.unwrap_or(config.snapshot_lines));
    let Some(snapshot) = service.capture(&target.to_string(), target) else {
        eprintln!("no snapshot available for {target}");
        return 1;
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in &snapshot.lines {
        if writeln!(out, "{line}").is_err() {
            return 1;
        }
    }
    0
}

/// Prints every event as one JSON object per line.
struct JsonLinesSurface<W: Write> {
    out: W,
    exited: bool,
}

impl<W: Write> DisplaySurface for JsonLinesSurface<W> {
    fn write_output(&mut self, _pane_id: &str, _bytes: &[u8]) {}

    fn pane_exited(&mut self, _pane_id: &str, _code: Option<i32>, _reason: ExitReason) {
        self.exited = true;
    }

    fn on_event(&mut self, event: &PaneEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            let _ = writeln!(self.out, "{line}");
            let _ = self.out.flush();
        }
        if event.is_exit() {
            self.exited = true;
        }
    }
}

fn run_watch(
    socket: Option<String>,
    config: &AppConfig,
    target: PaneAddress,
    dimensions: PaneDimensions,
    duration: Option<Duration>,
) -> i32 {
    let adapter = Arc::new(SystemTmuxAdapter::new(socket));
    let (events_tx, events_rx) = mpsc::channel();
    let pool = ConnectionPool::new(adapter, config.pool_config(), events_tx);
    let logical_id = target.to_string();

    match pool.connect(&logical_id, target, dimensions) {
        Ok(ConnectOutcome::Connecting { .. }) | Ok(ConnectOutcome::AlreadyActive) => {}
        Ok(ConnectOutcome::Rejected) => {
            let err = AttachError::CapacityExceeded {
                max: pool.max_connections(),
            };
            eprintln!("failed to attach {logical_id}: {err}");
            return 1;
        }
        Err(err) => {
            eprintln!("failed to attach: {err}");
            return 1;
        }
    }
    pool.focus(&logical_id);

    let mut dispatcher = Dispatcher::new(
        events_rx,
        JsonLinesSurface {
            out: io::stdout(),
            exited: false,
        },
    );
    let deadline = duration.map(|duration| Instant::now() + duration);
    while !dispatcher.surface().exited {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            pool.disconnect(&logical_id);
            dispatcher.pump();
            break;
        }
        dispatcher.pump_timeout(WATCH_PUMP_INTERVAL);
    }
    0
}
