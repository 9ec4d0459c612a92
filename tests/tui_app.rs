use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tether::attachment::SpecialKey;
use tether::dispatcher::{CommandResult, DisplaySurface, UiCommand};
use tether::domain::{PaneAddress, PaneDimensions, Snapshot};
use tether::event::ExitReason;
use tether::pool::{ConnectOutcome, ConnectedSummary, PoolStatus};
use tether::tui::{AppEventResult, AppModel, InputMode, LinkState, UiPane, render_to_string};

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn panes() -> Vec<UiPane> {
    vec![
        UiPane::new("work", "%1", 0, "editor"),
        UiPane::new("work", "%2", 0, "editor"),
        UiPane::new("logs", "%3", 1, "tail"),
    ]
}

fn status_with_connected(ids: &[&str]) -> PoolStatus {
    PoolStatus {
        max_connections: 6,
        focused: ids.first().map(|id| id.to_string()),
        connected: ids
            .iter()
            .map(|id| ConnectedSummary {
                logical_id: id.to_string(),
                address: id.parse::<PaneAddress>().expect("test id should parse"),
                connected_at: Utc::now(),
                last_focused_at: Utc::now(),
                streaming: true,
            })
            .collect(),
        connecting: Vec::new(),
    }
}

#[test]
fn selection_requests_snapshots_for_unattached_panes() {
    let mut model = AppModel::new(panes());
    assert_eq!(
        model.take_commands(),
        vec![UiCommand::Snapshot {
            logical_id: "work:%1".to_string(),
            address: PaneAddress::new("work", "%1"),
        }]
    );

    model.handle_key(key(KeyCode::Char('j')));
    assert_eq!(model.selected_index(), 1);
    assert_eq!(
        model.take_commands(),
        vec![UiCommand::Snapshot {
            logical_id: "work:%2".to_string(),
            address: PaneAddress::new("work", "%2"),
        }]
    );

    model.handle_key(key(KeyCode::Down));
    model.handle_key(key(KeyCode::Down));
    assert_eq!(model.selected_index(), 2);
    model.handle_key(key(KeyCode::Char('k')));
    assert_eq!(model.selected_index(), 1);
}

#[test]
fn selecting_a_connected_pane_focuses_it() {
    let mut model = AppModel::new(panes());
    model.take_commands();
    model.set_pool_status(status_with_connected(&["work:%2"]));

    model.handle_key(key(KeyCode::Char('j')));
    assert_eq!(
        model.take_commands(),
        vec![UiCommand::Focus {
            logical_id: "work:%2".to_string()
        }]
    );
    assert_eq!(model.link_state("work:%2"), LinkState::Connected);
}

#[test]
fn enter_connects_with_the_viewport_size() {
    let mut model = AppModel::new(panes());
    model.take_commands();
    model.set_viewport(PaneDimensions::new(90, 30));

    model.handle_key(key(KeyCode::Enter));
    assert_eq!(
        model.take_commands(),
        vec![
            UiCommand::Connect {
                logical_id: "work:%1".to_string(),
                address: PaneAddress::new("work", "%1"),
                dimensions: PaneDimensions::new(90, 30),
            },
            UiCommand::Focus {
                logical_id: "work:%1".to_string()
            },
        ]
    );
}

#[test]
fn input_mode_forwards_keys_to_the_selected_pane() {
    let mut model = AppModel::new(panes());
    model.take_commands();

    model.handle_key(key(KeyCode::Char('i')));
    assert_eq!(model.input_mode(), InputMode::Command);
    assert!(model.status_message().is_some());

    model.set_pool_status(status_with_connected(&["work:%1"]));
    model.handle_key(key(KeyCode::Char('i')));
    assert_eq!(model.input_mode(), InputMode::Input);

    model.handle_key(key(KeyCode::Char('l')));
    model.handle_key(key(KeyCode::Enter));
    model.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
    assert_eq!(
        model.take_commands(),
        vec![
            UiCommand::Input {
                logical_id: "work:%1".to_string(),
                bytes: b"l".to_vec(),
            },
            UiCommand::SpecialKey {
                logical_id: "work:%1".to_string(),
                key: SpecialKey::Enter,
            },
            UiCommand::Input {
                logical_id: "work:%1".to_string(),
                bytes: vec![0x03],
            },
        ]
    );

    model.handle_key(key(KeyCode::Esc));
    assert_eq!(model.input_mode(), InputMode::Command);
    assert_eq!(model.handle_key(key(KeyCode::Char('q'))), AppEventResult::Quit);
}

#[test]
fn streamed_output_is_rendered_for_connected_panes() {
    let mut model = AppModel::new(panes());
    model.take_commands();
    let connect = UiCommand::Connect {
        logical_id: "work:%1".to_string(),
        address: PaneAddress::new("work", "%1"),
        dimensions: model.viewport(),
    };
    model.apply_result(
        &connect,
        CommandResult::Connect(Ok(ConnectOutcome::Connecting { evicted: None })),
    );
    model.set_pool_status(status_with_connected(&["work:%1"]));

    model.write_output("work:%1", b"\x1b[H\x1b[2Jhello from tether\r\n$ ");
    let rendered = render_to_string(&model, 200, 30);
    assert!(rendered.contains("hello from tether"));
    assert!(rendered.contains("work:%1 (live)"));
    assert!(rendered.contains("pool 1/6"));
}

#[test]
fn snapshot_preview_is_shown_for_idle_panes() {
    let mut model = AppModel::new(panes());
    let commands = model.take_commands();
    let snapshot = Snapshot {
        logical_id: "work:%1".to_string(),
        address: PaneAddress::new("work", "%1"),
        captured_at: Utc::now(),
        lines: vec!["previous build output".to_string()],
        max_lines: 50,
    };
    model.apply_result(&commands[0], CommandResult::Snapshot(Some(snapshot)));

    let rendered = render_to_string(&model, 120, 30);
    assert!(rendered.contains("previous build output"));
    assert!(rendered.contains("work:%1 (snapshot)"));
}

#[test]
fn ended_pane_is_marked_and_reported() {
    let mut model = AppModel::new(panes());
    model.take_commands();
    let connect = UiCommand::Connect {
        logical_id: "work:%1".to_string(),
        address: PaneAddress::new("work", "%1"),
        dimensions: model.viewport(),
    };
    model.apply_result(
        &connect,
        CommandResult::Connect(Ok(ConnectOutcome::Connecting { evicted: None })),
    );
    model.set_pool_status(status_with_connected(&[]));

    model.pane_exited("work:%1", None, ExitReason::PaneEnded);
    assert_eq!(
        model.link_state("work:%1"),
        LinkState::Ended(ExitReason::PaneEnded)
    );
    assert!(
        model
            .status_message()
            .is_some_and(|message| message.contains("stream ended"))
    );
}

#[test]
fn rejected_connect_reports_capacity() {
    let mut model = AppModel::new(panes());
    model.take_commands();
    model.set_pool_status(status_with_connected(&["work:%2"]));
    let connect = UiCommand::Connect {
        logical_id: "work:%1".to_string(),
        address: PaneAddress::new("work", "%1"),
        dimensions: model.viewport(),
    };
    model.apply_result(
        &connect,
        CommandResult::Connect(Ok(ConnectOutcome::Rejected)),
    );
    assert!(
        model
            .status_message()
            .is_some_and(|message| message.contains("capacity (6)"))
    );
}

#[test]
fn rescanned_pane_list_keeps_the_selection() {
    let mut model = AppModel::new(panes());
    model.handle_key(key(KeyCode::Char('j')));
    model.take_commands();

    let mut reordered = panes();
    reordered.insert(0, UiPane::new("alpha", "%9", 0, "shell"));
    model.set_panes(reordered);
    assert_eq!(model.selected_logical_id().as_deref(), Some("work:%2"));
    assert!(model.take_commands().is_empty());
}
