use serde::Serialize;

use crate::domain::CursorPosition;

const CLEAR_AND_HOME: &str = "\x1b[H\x1b[2J";

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum OutputPayload {
    /// Startup capture, written verbatim.
    Backlog(String),
    /// Whole visible screen; the display clears before drawing it.
    Redraw(String),
    Cursor(CursorPosition),
}

impl OutputPayload {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Backlog(text) => normalize_newlines(text).into_bytes(),
            Self::Redraw(text) => {
                let mut bytes = CLEAR_AND_HOME.as_bytes().to_vec();
                bytes.extend_from_slice(normalize_newlines(text).as_bytes());
                bytes
            }
            Self::Cursor(position) => {
                format!("\x1b[{};{}H", position.y + 1, position.x + 1).into_bytes()
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Disconnected,
    Evicted,
    PaneEnded,
    MonitorExited,
    Failed,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Evicted => "evicted",
            Self::PaneEnded => "pane_ended",
            Self::MonitorExited => "monitor_exited",
            Self::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaneEvent {
    Output {
        pane_id: String,
        payload: OutputPayload,
    },
    InputFailed {
        pane_id: String,
        reason: String,
    },
    Exit {
        pane_id: String,
        code: Option<i32>,
        reason: ExitReason,
    },
}

impl PaneEvent {
    pub fn pane_id(&self) -> &str {
        match self {
            Self::Output { pane_id, .. }
            | Self::InputFailed { pane_id, .. }
            | Self::Exit { pane_id, .. } => pane_id,
        }
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Exit { .. })
    }
}

// tmux captures use bare `\n`; a raw-mode display needs `\r\n`.
fn normalize_newlines(text: &str) -> String {
    let trimmed = text.strip_suffix('\n').unwrap_or(text);
    trimmed.replace("\r\n", "\n").replace('\n', "\r\n")
}
