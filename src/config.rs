use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::attachment::StreamConfig;
use crate::domain::PaneDimensions;
use crate::pool::PoolConfig;

mod io;
mod merge;
mod paths;

pub use self::paths::{config_root_dir, default_config_path, default_log_path};

pub const CONFIG_PATH_ENV: &str = "TETHER_CONFIG";
pub const MIN_POLL_INTERVAL_MS: u64 = 50;
pub const MAX_POLL_INTERVAL_MS: u64 = 2000;
pub const MAX_CONNECTIONS_LIMIT: usize = 64;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct AppConfig {
    pub poll_interval_ms: u64,
    pub backlog_lines: usize,
    pub snapshot_lines: usize,
    pub max_connections: usize,
    pub default_cols: u16,
    pub default_rows: u16,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 150,
            backlog_lines: 1000,
            snapshot_lines: 50,
            max_connections: 6,
            default_cols: 120,
            default_rows: 40,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
struct PartialAppConfig {
    poll_interval_ms: Option<u64>,
    backlog_lines: Option<usize>,
    snapshot_lines: Option<usize>,
    max_connections: Option<usize>,
    default_cols: Option<u16>,
    default_rows: Option<u16>,
    log_level: Option<String>,
}

impl AppConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.poll_interval_ms
                .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS),
        )
    }

    pub fn default_dimensions(&self) -> PaneDimensions {
        PaneDimensions::new(self.default_cols, self.default_rows)
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            poll_interval: self.poll_interval(),
            backlog_lines: self.backlog_lines.max(1),
        }
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_connections: self.max_connections.clamp(1, MAX_CONNECTIONS_LIMIT),
            stream: self.stream_config(),
        }
    }
}
