use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Text};
use ratatui::widgets::{Block, BorderType, Borders, List, ListItem, ListState, Paragraph};
use tui_term::widget::PseudoTerminal;

use super::{AppModel, InputMode, LinkState};

pub(super) fn render_pane_list(frame: &mut Frame<'_>, model: &AppModel, area: Rect) {
    let block = Block::default()
        .title(" Panes ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(border_style(model.input_mode() == InputMode::Command));

    let mut current_session: Option<&str> = None;
    let mut selected_row = None;
    let mut items = Vec::new();
    for (index, pane) in model.panes().iter().enumerate() {
        if current_session != Some(pane.address.session.as_str()) {
            items.push(ListItem::new(Line::from(pane.address.session.clone())).style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ));
            current_session = Some(pane.address.session.as_str());
        }
        if index == model.selected_index() {
            selected_row = Some(items.len());
        }
        let state = model.link_state(&pane.logical_id());
        items.push(
            ListItem::new(format!(
                "{} {} {}:{} {}",
                state.marker(),
                pane.address.pane_id,
                pane.window_index,
                pane.window_name,
                pane.current_command
            ))
            .style(link_style(state)),
        );
    }

    if items.is_empty() {
        frame.render_widget(
            Paragraph::new("No tmux panes discovered").block(block),
            area,
        );
        return;
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Rgb(35, 60, 35))
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    let mut list_state = ListState::default();
    list_state.select(selected_row);
    frame.render_stateful_widget(list, area, &mut list_state);
}

pub(super) fn render_content_pane(frame: &mut Frame<'_>, model: &AppModel, area: Rect) {
    let Some(pane) = model.selected_pane() else {
        let block = content_block(" Content ".to_string(), false);
        frame.render_widget(Paragraph::new("").block(block), area);
        return;
    };
    let logical_id = pane.logical_id();
    let state = model.link_state(&logical_id);
    let title = match state {
        LinkState::Idle => format!(" {logical_id} (snapshot) "),
        LinkState::Connecting => format!(" {logical_id} (connecting) "),
        LinkState::Connected => format!(" {logical_id} (live) "),
        LinkState::Ended(reason) => format!(" {logical_id} (ended: {}) ", reason.as_str()),
    };
    let block = content_block(title, model.input_mode() == InputMode::Input);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    match (state, model.terminal(&logical_id)) {
        (LinkState::Idle, _) | (_, None) => {
            let text = match model.snapshot() {
                Some(snapshot) if snapshot.logical_id == logical_id => {
                    if snapshot.is_empty() {
                        Text::from("(pane is empty)")
                    } else {
                        Text::from(
                            snapshot
                                .lines
                                .iter()
                                .map(|line| Line::from(line.clone()))
                                .collect::<Vec<_>>(),
                        )
                    }
                }
                _ => Text::from("no snapshot available"),
            };
            let skip = text.lines.len().saturating_sub(usize::from(inner.height));
            let visible = Text::from(text.lines.into_iter().skip(skip).collect::<Vec<_>>());
            frame.render_widget(Paragraph::new(visible), inner);
        }
        (_, Some(terminal)) => {
            frame.render_widget(PseudoTerminal::new(terminal.screen()), inner);
        }
    }
}

fn content_block(title: String, active: bool) -> Block<'static> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(border_style(active))
}

fn border_style(is_focused: bool) -> Style {
    if is_focused {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn link_style(state: LinkState) -> Style {
    match state {
        LinkState::Connected => Style::default().fg(Color::Green),
        LinkState::Connecting => Style::default().fg(Color::Yellow),
        LinkState::Ended(_) => Style::default().fg(Color::DarkGray),
        LinkState::Idle => Style::default(),
    }
}
