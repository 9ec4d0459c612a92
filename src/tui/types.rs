use crate::domain::PaneAddress;
use crate::event::ExitReason;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UiPane {
    pub address: PaneAddress,
    pub window_index: i64,
    pub window_name: String,
    pub pane_index: i64,
    pub current_command: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InputMode {
    Command,
    /// Keys go straight to the selected pane.
    Input,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AppEventResult {
    Continue,
    Quit,
}

/// How the selected pane relates to the pool, as shown in the list.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkState {
    Idle,
    Connecting,
    Connected,
    Ended(ExitReason),
}

impl LinkState {
    pub fn marker(self) -> &'static str {
        match self {
            LinkState::Idle => " ",
            LinkState::Connecting => "~",
            LinkState::Connected => "*",
            LinkState::Ended(_) => "x",
        }
    }
}
