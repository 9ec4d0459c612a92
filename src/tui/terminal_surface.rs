use tui_term::vt100::Parser as VtParser;

use crate::dispatcher::DisplaySurface;
use crate::domain::PaneDimensions;
use crate::error::AttachError;
use crate::event::ExitReason;

use super::AppModel;

const TERMINAL_SCROLLBACK: usize = 1000;

/// Emulated screen for one attached pane.
pub struct PaneTerminal {
    parser: VtParser,
    exit: Option<(Option<i32>, ExitReason)>,
}

impl PaneTerminal {
    pub fn new(dimensions: PaneDimensions) -> Self {
        Self {
            parser: VtParser::new(dimensions.rows, dimensions.cols, TERMINAL_SCROLLBACK),
            exit: None,
        }
    }

    pub fn process(&mut self, bytes: &[u8]) {
        self.parser.process(bytes);
    }

    pub fn resize(&mut self, dimensions: PaneDimensions) {
        let (rows, cols) = self.parser.screen().size();
        if (rows, cols) != (dimensions.rows, dimensions.cols) {
            self.parser.set_size(dimensions.rows, dimensions.cols);
        }
    }

    pub fn screen(&self) -> &tui_term::vt100::Screen {
        self.parser.screen()
    }

    pub fn contents(&self) -> String {
        self.parser.screen().contents()
    }

    pub fn exit(&self) -> Option<(Option<i32>, ExitReason)> {
        self.exit
    }
}

impl DisplaySurface for AppModel {
    fn write_output(&mut self, pane_id: &str, bytes: &[u8]) {
        let viewport = self.viewport;
        self.terminals
            .entry(pane_id.to_string())
            .or_insert_with(|| PaneTerminal::new(viewport))
            .process(bytes);
    }

    fn pane_exited(&mut self, pane_id: &str, code: Option<i32>, reason: ExitReason) {
        if let Some(terminal) = self.terminals.get_mut(pane_id) {
            terminal.exit = Some((code, reason));
        }
        match reason {
            ExitReason::Disconnected => {}
            ExitReason::PaneEnded => {
                let err = AttachError::StreamEnded {
                    pane_id: pane_id.to_string(),
                };
                self.set_status_message(err.to_string());
            }
            other => self.set_status_message(format!("{pane_id} ended: {}", other.as_str())),
        }
        if self.input_mode == super::InputMode::Input
            && self.selected_logical_id().as_deref() == Some(pane_id)
        {
            self.input_mode = super::InputMode::Command;
        }
    }

    fn input_failed(&mut self, pane_id: &str, reason: &str) {
        self.set_status_message(format!("input to {pane_id} failed: {reason}"));
    }
}

#[cfg(test)]
mod tests {
    use super::PaneTerminal;
    use crate::domain::PaneDimensions;

    #[test]
    fn resize_changes_the_emulated_screen() {
        let mut terminal = PaneTerminal::new(PaneDimensions::new(80, 24));
        terminal.process(b"hello");
        terminal.resize(PaneDimensions::new(100, 30));
        assert_eq!(terminal.screen().size(), (30, 100));
        assert!(terminal.contents().starts_with("hello"));
    }
}
