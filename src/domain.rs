use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A tmux pane inside a named session, written as `session:%N`.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct PaneAddress {
    pub session: String,
    pub pane_id: String,
}

impl PaneAddress {
    pub fn new(session: impl Into<String>, pane_id: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            pane_id: pane_id.into(),
        }
    }

    /// Target string accepted by `tmux -t`. Pane ids are server-unique, so
    /// the session is only used for existence checks.
    pub fn tmux_target(&self) -> &str {
        &self.pane_id
    }
}

impl fmt::Display for PaneAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.session, self.pane_id)
    }
}

impl FromStr for PaneAddress {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (session, pane_id) = trimmed
            .rsplit_once(':')
            .ok_or_else(|| format!("pane address '{trimmed}' must look like session:%N"))?;
        if session.is_empty() {
            return Err(format!("pane address '{trimmed}' has an empty session name"));
        }
        let pane_id_re =
            Regex::new(r"^%\d+$").map_err(|err| format!("invalid pane id regex: {err}"))?;
        if !pane_id_re.is_match(pane_id) {
            return Err(format!(
                "pane address '{trimmed}' has invalid pane id '{pane_id}' (expected %N)"
            ));
        }
        Ok(Self::new(session, pane_id))
    }
}

/// A pane row from `tmux list-panes`, used for discovery listings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PaneInfo {
    pub session_name: String,
    pub window_index: i64,
    pub window_name: String,
    pub pane_id: String,
    pub pane_index: i64,
    pub current_command: String,
    pub pane_dead: bool,
}

impl PaneInfo {
    pub fn address(&self) -> PaneAddress {
        PaneAddress::new(&self.session_name, &self.pane_id)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PaneDimensions {
    pub cols: u16,
    pub rows: u16,
}

impl PaneDimensions {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols: cols.max(1),
            rows: rows.max(1),
        }
    }
}

/// Zero-based cursor cell as reported by tmux.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: u16,
    pub y: u16,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CaptureRange {
    Visible,
    Backlog(usize),
}

/// One-shot preview of a pane's recent buffer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Snapshot {
    pub logical_id: String,
    pub address: PaneAddress,
    pub captured_at: DateTime<Utc>,
    pub lines: Vec<String>,
    pub max_lines: usize,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
