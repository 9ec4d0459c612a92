use std::process::Command;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tether::attachment::{SpecialKey, StreamConfig};
use tether::domain::{CaptureRange, PaneAddress, PaneDimensions};
use tether::event::{ExitReason, OutputPayload, PaneEvent};
use tether::pool::{ConnectOutcome, ConnectionPool, PoolConfig};
use tether::snapshot::SnapshotService;
use tether::tmux::{InputSink, OutputSource, SystemTmuxAdapter};

struct TmuxSocketGuard {
    socket: String,
}

impl Drop for TmuxSocketGuard {
    fn drop(&mut self) {
        let _ = Command::new("tmux")
            .args(["-L", &self.socket, "kill-server"])
            .status();
    }
}

#[test]
fn attachment_streams_input_echo_and_ends_with_the_session() {
    let socket = unique_socket("tether-attach");
    let _guard = TmuxSocketGuard {
        socket: socket.clone(),
    };
    let session = "tether_attach";
    start_tmux_session(&socket, session, "bash --noprofile --norc");
    let pane_id = first_pane_id(&socket, session);

    let adapter = Arc::new(SystemTmuxAdapter::new(Some(socket.clone())));
    let (events_tx, events) = mpsc::channel();
    let pool = ConnectionPool::new(
        adapter,
        PoolConfig {
            max_connections: 2,
            stream: StreamConfig {
                poll_interval: Duration::from_millis(50),
                backlog_lines: 200,
            },
        },
        events_tx,
    );
    let logical_id = format!("{session}:{pane_id}");
    let outcome = pool
        .connect(
            &logical_id,
            PaneAddress::new(session, pane_id.clone()),
            PaneDimensions::new(80, 24),
        )
        .expect("connect should succeed");
    assert_eq!(outcome, ConnectOutcome::Connecting { evicted: None });

    let first = events
        .recv_timeout(Duration::from_secs(5))
        .expect("backlog should arrive");
    assert!(matches!(
        first,
        PaneEvent::Output {
            payload: OutputPayload::Backlog(_),
            ..
        }
    ));
    assert!(wait_until(Duration::from_secs(5), || pool
        .is_connected(&logical_id)));
    assert_eq!(control_client_count(&socket), 1);

    assert!(pool.send_input(&logical_id, b"echo TETHER_ATTACH_MARKER"));
    assert!(pool.send_special_key(&logical_id, SpecialKey::Enter));
    let seen = wait_for_event(&events, Duration::from_secs(5), |event| {
        matches!(
            event,
            PaneEvent::Output {
                payload: OutputPayload::Redraw(screen),
                ..
            } if screen.lines().filter(|line| line.contains("TETHER_ATTACH_MARKER")).count() >= 2
        )
    });
    assert!(seen, "expected echoed command and its output in a redraw");

    let _ = Command::new("tmux")
        .args(["-L", &socket, "kill-session", "-t", session])
        .status();
    let ended = wait_for_event(&events, Duration::from_secs(5), |event| {
        matches!(
            event,
            PaneEvent::Exit {
                reason: ExitReason::PaneEnded | ExitReason::MonitorExited,
                ..
            }
        )
    });
    assert!(ended, "expected the attachment to end with its session");
    assert!(wait_until(Duration::from_secs(5), || !pool
        .is_connected(&logical_id)));
}

#[test]
fn disconnect_detaches_the_monitor_client() {
    let socket = unique_socket("tether-detach");
    let _guard = TmuxSocketGuard {
        socket: socket.clone(),
    };
    let session = "tether_detach";
    start_tmux_session(&socket, session, "bash --noprofile --norc");
    let pane_id = first_pane_id(&socket, session);

    let adapter = Arc::new(SystemTmuxAdapter::new(Some(socket.clone())));
    let (events_tx, events) = mpsc::channel();
    let pool = ConnectionPool::new(adapter, PoolConfig::default(), events_tx);
    let logical_id = format!("{session}:{pane_id}");
    pool.connect(
        &logical_id,
        PaneAddress::new(session, pane_id),
        PaneDimensions::new(100, 30),
    )
    .expect("connect should succeed");
    assert!(wait_until(Duration::from_secs(5), || pool
        .is_connected(&logical_id)));

    assert!(pool.disconnect(&logical_id));
    assert!(wait_for_event(&events, Duration::from_secs(2), |event| {
        matches!(
            event,
            PaneEvent::Exit {
                reason: ExitReason::Disconnected,
                ..
            }
        )
    }));
    assert!(wait_until(Duration::from_secs(3), || control_client_count(
        &socket
    ) == 0));
}

#[test]
fn snapshot_of_a_live_pane_contains_its_output() {
    let socket = unique_socket("tether-snapshot");
    let _guard = TmuxSocketGuard {
        socket: socket.clone(),
    };
    let session = "tether_snapshot";
    start_tmux_session(&socket, session, "bash --noprofile --norc");
    let pane_id = first_pane_id(&socket, session);
    let _ = Command::new("tmux")
        .args([
            "-L",
            &socket,
            "send-keys",
            "-t",
            &pane_id,
            "echo TETHER_SNAPSHOT_MARKER",
            "Enter",
        ])
        .status();

    let adapter = Arc::new(SystemTmuxAdapter::new(Some(socket.clone())));
    let service = SnapshotService::new(adapter, 50);
    let address = PaneAddress::new(session, pane_id);
    let deadline = Instant::now() + Duration::from_secs(3);
    let mut found = false;
    while Instant::now() < deadline && !found {
        found = service
            .capture(&address.to_string(), &address)
            .is_some_and(|snapshot| {
                snapshot
                    .lines
                    .iter()
                    .any(|line| line.contains("TETHER_SNAPSHOT_MARKER"))
            });
        thread::sleep(Duration::from_millis(50));
    }
    assert!(found, "snapshot should contain the echoed marker");
}

#[test]
fn literal_input_starting_with_a_dash_reaches_the_pane() {
    let socket = unique_socket("tether-literal");
    let _guard = TmuxSocketGuard {
        socket: socket.clone(),
    };
    let session = "tether_literal";
    start_tmux_session(&socket, session, "cat");
    let pane_id = first_pane_id(&socket, session);

    let adapter = SystemTmuxAdapter::new(Some(socket.clone()));
    let address = PaneAddress::new(session, pane_id);
    adapter
        .send_literal(&address, b"-x --tether-flag")
        .expect("dash-prefixed input should be sent literally");
    adapter
        .send_named_key(&address, "Enter")
        .expect("enter should be sent");

    assert!(wait_until(Duration::from_secs(3), || {
        adapter
            .capture_pane(&address, CaptureRange::Visible)
            .is_ok_and(|screen| screen.contains("-x --tether-flag"))
    }));
}

fn wait_for_event<F>(events: &Receiver<PaneEvent>, timeout: Duration, matches: F) -> bool
where
    F: Fn(&PaneEvent) -> bool,
{
    let deadline = Instant::now() + timeout;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match events.recv_timeout(remaining) {
            Ok(event) if matches(&event) => return true,
            Ok(_) => continue,
            Err(_) => return false,
        }
    }
    false
}

fn wait_until<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    condition()
}

fn start_tmux_session(socket: &str, session: &str, command: &str) {
    let status = Command::new("tmux")
        .args([
            "-L", socket, "-f", "/dev/null", "new-session", "-d", "-x", "80", "-y", "24", "-s",
            session, command,
        ])
        .status()
        .expect("tmux should launch");
    assert!(status.success(), "expected tmux session setup to succeed");
}

fn first_pane_id(socket: &str, session: &str) -> String {
    let output = Command::new("tmux")
        .args([
            "-L",
            socket,
            "list-panes",
            "-t",
            session,
            "-F",
            "#{pane_id}",
        ])
        .output()
        .expect("list-panes should run");
    assert!(output.status.success(), "list-panes should succeed");
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(ToString::to_string)
        .expect("session should have a pane")
}

fn control_client_count(socket: &str) -> usize {
    Command::new("tmux")
        .args(["-L", socket, "list-clients", "-F", "#{client_control_mode}"])
        .output()
        .map(|output| {
            String::from_utf8_lossy(&output.stdout)
                .lines()
                .filter(|line| line.trim() == "1")
                .count()
        })
        .unwrap_or(0)
}

fn unique_socket(prefix: &str) -> String {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be monotonic enough")
        .as_nanos();
    format!("{prefix}-{}-{suffix}", std::process::id())
}
