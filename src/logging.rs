use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::config::AppConfig;

pub const LOG_LEVEL_ENV: &str = "TETHER_LOG_LEVEL";

/// Where log records go.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogTarget<'a> {
    Stderr,
    /// Used while a full-screen UI owns the terminal.
    File(&'a Path),
}

/// `RUST_LOG` wins, then `TETHER_LOG_LEVEL`, then the configured level.
pub fn resolve_filter(config: &AppConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var(LOG_LEVEL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| config.log_level.clone());
        EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Installs the global subscriber. Returns false when one is already set
/// or the log file cannot be opened.
pub fn init_logging(config: &AppConfig, target: LogTarget<'_>) -> bool {
    let filter = resolve_filter(config);
    let (writer, ansi) = match target {
        LogTarget::Stderr => (BoxMakeWriter::new(io::stderr), true),
        LogTarget::File(path) => match open_log_file(path) {
            Ok(file) => (BoxMakeWriter::new(Mutex::new(file)), false),
            Err(err) => {
                eprintln!("log_file_error: {err}");
                return false;
            }
        },
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}

fn open_log_file(path: &Path) -> Result<fs::File, String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed creating log directory {:?}: {err}", parent))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| format!("failed opening log file {:?}: {err}", path))
}
