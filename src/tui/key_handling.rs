use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::attachment::SpecialKey;
use crate::dispatcher::UiCommand;

use super::{AppEventResult, AppModel, InputMode};

/// What a key press means for the attached pane in input mode.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PaneKey {
    Literal(Vec<u8>),
    Special(SpecialKey),
}

pub fn pane_key_from_event(key: KeyEvent) -> Option<PaneKey> {
    let special = match key.code {
        KeyCode::Enter => SpecialKey::Enter,
        KeyCode::Tab => SpecialKey::Tab,
        KeyCode::BackTab => SpecialKey::BackTab,
        KeyCode::Backspace => SpecialKey::Backspace,
        KeyCode::Up => SpecialKey::Up,
        KeyCode::Down => SpecialKey::Down,
        KeyCode::Left => SpecialKey::Left,
        KeyCode::Right => SpecialKey::Right,
        KeyCode::Home => SpecialKey::Home,
        KeyCode::End => SpecialKey::End,
        KeyCode::PageUp => SpecialKey::PageUp,
        KeyCode::PageDown => SpecialKey::PageDown,
        KeyCode::Insert => SpecialKey::Insert,
        KeyCode::Delete => SpecialKey::Delete,
        KeyCode::F(n) if (1..=12).contains(&n) => SpecialKey::F(n),
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            // Ctrl+letter maps onto the C0 control range.
            return c
                .is_ascii_alphabetic()
                .then(|| PaneKey::Literal(vec![(c.to_ascii_lowercase() as u8) & 0x1f]));
        }
        KeyCode::Char(c) => {
            let mut buf = [0u8; 4];
            let mut bytes = c.encode_utf8(&mut buf).as_bytes().to_vec();
            if key.modifiers.contains(KeyModifiers::ALT) {
                bytes.insert(0, 0x1b);
            }
            return Some(PaneKey::Literal(bytes));
        }
        _ => return None,
    };
    Some(PaneKey::Special(special))
}

impl AppModel {
    pub fn handle_key(&mut self, key: KeyEvent) -> AppEventResult {
        if self.input_mode == InputMode::Input {
            self.handle_input_key(key);
            return AppEventResult::Continue;
        }

        match key.code {
            KeyCode::Char('q') => return AppEventResult::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return AppEventResult::Quit;
            }
            KeyCode::Char('j') | KeyCode::Down => self.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.select_previous(),
            KeyCode::Enter => self.connect_selected(),
            KeyCode::Char('i') => {
                if self.is_selected_live() {
                    self.input_mode = InputMode::Input;
                    self.clear_status_message();
                } else {
                    self.set_status_message("connect the pane first (enter)");
                }
            }
            KeyCode::Char('d') => self.disconnect_selected(),
            KeyCode::Char('D') => self.push_command(UiCommand::DisconnectAll),
            KeyCode::Char('s') => self.refresh_snapshot(),
            KeyCode::Char('r') => self.request_refresh(),
            _ => {}
        }
        AppEventResult::Continue
    }

    fn handle_input_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc {
            self.input_mode = InputMode::Command;
            return;
        }
        let Some(logical_id) = self.selected_logical_id() else {
            self.input_mode = InputMode::Command;
            return;
        };
        match pane_key_from_event(key) {
            Some(PaneKey::Literal(bytes)) => {
                self.push_command(UiCommand::Input { logical_id, bytes });
            }
            Some(PaneKey::Special(key)) => {
                self.push_command(UiCommand::SpecialKey { logical_id, key });
            }
            None => {}
        }
    }
}
