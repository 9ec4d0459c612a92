use super::{
    AppConfig, DEFAULT_LOG_LEVEL, MAX_CONNECTIONS_LIMIT, MAX_POLL_INTERVAL_MS,
    MIN_POLL_INTERVAL_MS, PartialAppConfig,
};

impl AppConfig {
    pub(super) fn merged(mut self, partial: PartialAppConfig) -> Self {
        if let Some(value) = partial.poll_interval_ms {
            self.poll_interval_ms = value;
        }
        if let Some(value) = partial.backlog_lines {
            self.backlog_lines = value;
        }
        if let Some(value) = partial.snapshot_lines {
            self.snapshot_lines = value;
        }
        if let Some(value) = partial.max_connections {
            self.max_connections = value;
        }
        if let Some(value) = partial.default_cols {
            self.default_cols = value;
        }
        if let Some(value) = partial.default_rows {
            self.default_rows = value;
        }
        if let Some(value) = partial.log_level {
            self.log_level = value;
        }
        self.sanitized()
    }

    pub(super) fn sanitized(mut self) -> Self {
        self.poll_interval_ms = self
            .poll_interval_ms
            .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS);
        self.backlog_lines = self.backlog_lines.max(1);
        self.snapshot_lines = self.snapshot_lines.max(1);
        self.max_connections = self.max_connections.clamp(1, MAX_CONNECTIONS_LIMIT);
        self.default_cols = self.default_cols.max(1);
        self.default_rows = self.default_rows.max(1);
        let level = self.log_level.trim();
        self.log_level = if level.is_empty() {
            DEFAULT_LOG_LEVEL.to_string()
        } else {
            level.to_ascii_lowercase()
        };
        self
    }
}
