use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::debug;

use crate::attachment::lock_ignoring_poison;
use crate::domain::{CaptureRange, PaneAddress, Snapshot};
use crate::tmux::OutputSource;

pub const DEFAULT_SNAPSHOT_LINES: usize = 50;

/// Best-effort pane previews, independent of any attachment. Only the latest
/// snapshot per logical id is kept.
pub struct SnapshotService {
    source: Arc<dyn OutputSource>,
    max_lines: usize,
    latest: Mutex<HashMap<String, Snapshot>>,
}

impl SnapshotService {
    pub fn new(source: Arc<dyn OutputSource>, max_lines: usize) -> Self {
        Self {
            source,
            max_lines: max_lines.max(1),
            latest: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Captures the last `max_lines` lines. Any failure yields `None`; a
    /// pane with no output yields an empty snapshot.
    pub fn capture(&self, logical_id: &str, address: &PaneAddress) -> Option<Snapshot> {
        let content = match self
            .source
            .capture_pane(address, CaptureRange::Backlog(self.max_lines))
        {
            Ok(content) => content,
            Err(err) => {
                debug!(pane = %logical_id, address = %address, error = %err, "snapshot unavailable");
                return None;
            }
        };
        let snapshot = Snapshot {
            logical_id: logical_id.to_string(),
            address: address.clone(),
            captured_at: Utc::now(),
            lines: snapshot_lines(&content, self.max_lines),
            max_lines: self.max_lines,
        };
        lock_ignoring_poison(&self.latest).insert(logical_id.to_string(), snapshot.clone());
        Some(snapshot)
    }

    pub fn latest(&self, logical_id: &str) -> Option<Snapshot> {
        lock_ignoring_poison(&self.latest).get(logical_id).cloned()
    }

    pub fn discard(&self, logical_id: &str) {
        lock_ignoring_poison(&self.latest).remove(logical_id);
    }
}

/// Trailing blank rows are dropped, then only the newest `max_lines` remain.
fn snapshot_lines(content: &str, max_lines: usize) -> Vec<String> {
    let mut lines = content
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect::<Vec<_>>();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    let start = lines.len().saturating_sub(max_lines);
    lines.split_off(start)
}
