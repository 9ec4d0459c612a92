use sha2::{Digest, Sha256};

use crate::domain::CursorPosition;

pub const WAITING_PLACEHOLDER: &str = "\x1b[2m[waiting for output...]\x1b[0m\r\n";

/// Cheap identity of a captured screen: line count plus a sha256 digest.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Fingerprint {
    lines: usize,
    digest: [u8; 32],
}

pub fn fingerprint(content: &str) -> Fingerprint {
    let digest = Sha256::digest(content.as_bytes());
    Fingerprint {
        lines: content.lines().count(),
        digest: digest.into(),
    }
}

pub fn is_blank(content: &str) -> bool {
    content.chars().all(char::is_whitespace)
}

/// True when the visible screen is the tail of a backlog capture.
pub fn backlog_shows_screen(backlog: &str, screen: &str) -> bool {
    backlog.trim_end().ends_with(screen.trim_end())
}

/// Per-attachment diff state. Only the attachment's own loop touches it.
#[derive(Clone, Debug, Default)]
pub struct ScreenTracker {
    fingerprint: Option<Fingerprint>,
    cursor: Option<CursorPosition>,
}

impl ScreenTracker {
    pub fn seed(&mut self, content: &str) {
        self.fingerprint = Some(fingerprint(content));
    }

    /// Returns true when the screen differs from the previous observation.
    /// A changed screen forgets the cursor, since redrawing moves it.
    pub fn observe_screen(&mut self, content: &str) -> bool {
        let next = fingerprint(content);
        if self.fingerprint == Some(next) {
            return false;
        }
        self.fingerprint = Some(next);
        self.cursor = None;
        true
    }

    pub fn observe_cursor(&mut self, position: CursorPosition) -> bool {
        if self.cursor == Some(position) {
            return false;
        }
        self.cursor = Some(position);
        true
    }
}
