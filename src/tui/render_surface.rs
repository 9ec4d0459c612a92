use ratatui::backend::TestBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::widgets::Paragraph;
use ratatui::{Frame, Terminal};

use crate::domain::PaneDimensions;

use super::render_panes::{render_content_pane, render_pane_list};
use super::{AppModel, InputMode};

pub(super) struct ScreenAreas {
    pub(super) pane_list: Rect,
    pub(super) content: Rect,
    pub(super) status_bar: Rect,
}

pub(super) fn layout_areas(area: Rect) -> ScreenAreas {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(root[0]);
    ScreenAreas {
        pane_list: columns[0],
        content: columns[1],
        status_bar: root[1],
    }
}

/// Cells available to an attached pane inside the bordered content block.
pub(super) fn content_viewport(area: Rect) -> PaneDimensions {
    let content = layout_areas(area).content;
    PaneDimensions::new(
        content.width.saturating_sub(2),
        content.height.saturating_sub(2),
    )
}

pub fn render_to_string(model: &AppModel, width: u16, height: u16) -> String {
    let backend = TestBackend::new(width, height);
    let Ok(mut terminal) = Terminal::new(backend) else {
        return String::new();
    };
    if terminal.draw(|frame| render(frame, model)).is_err() {
        return String::new();
    }
    let buffer = terminal.backend().buffer();
    buffer
        .content
        .iter()
        .map(|cell| cell.symbol())
        .collect::<Vec<_>>()
        .join("")
}

pub(super) fn render(frame: &mut Frame<'_>, model: &AppModel) {
    let areas = layout_areas(frame.area());
    render_pane_list(frame, model, areas.pane_list);
    render_content_pane(frame, model, areas.content);
    render_status_bar(frame, model, areas.status_bar);
}

fn build_app_bar_text(model: &AppModel) -> String {
    let mode = match model.input_mode() {
        InputMode::Command => "command",
        InputMode::Input => "input",
    };
    let pool = model
        .pool_status()
        .map(|status| {
            let mut text = format!(
                "pool {}/{}",
                status.connected.len() + status.connecting.len(),
                status.max_connections
            );
            if let Some(focused) = &status.focused {
                text.push_str(&format!("  |  focused: {focused}"));
            }
            text
        })
        .unwrap_or_else(|| "pool -".to_string());
    format!(" tether  |  mode: {mode}  |  {pool} ")
}

fn render_status_bar(frame: &mut Frame<'_>, model: &AppModel, area: Rect) {
    let app_bar_text = build_app_bar_text(model);
    let status_text = match model.status_message() {
        Some(message) => format!("{app_bar_text}| {message}"),
        None => app_bar_text,
    };
    let shortcuts = if model.input_mode() == InputMode::Input {
        "[keys] sent to pane  [esc] command mode"
    } else {
        "[j/k] move  [enter] attach  [i] input  [d/D] detach/all  [s] snapshot  [r] rescan  [q] quit"
    };

    let shortcuts_width = shortcuts.len().min(u16::MAX as usize) as u16;
    let status_style = Style::default().fg(Color::Black).bg(Color::Green);

    if area.width > shortcuts_width + 1 {
        let bar_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(1), Constraint::Length(shortcuts_width)])
            .split(area);
        frame.render_widget(
            Paragraph::new(status_text).style(status_style),
            bar_chunks[0],
        );
        frame.render_widget(Paragraph::new(shortcuts).style(status_style), bar_chunks[1]);
    } else {
        frame.render_widget(Paragraph::new(status_text).style(status_style), area);
    }
}
