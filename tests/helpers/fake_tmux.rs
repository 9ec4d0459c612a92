#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tether::domain::{CaptureRange, CursorPosition, PaneAddress, PaneDimensions};
use tether::event::PaneEvent;
use tether::tmux::{InputSink, MonitorExit, MonitorProcess, OutputSource, PaneLocator};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Sent {
    Literal { pane_id: String, bytes: Vec<u8> },
    Key { pane_id: String, key: String },
}

#[derive(Default)]
struct FakeState {
    sessions: HashMap<String, Vec<String>>,
    backlog: HashMap<String, String>,
    screens: HashMap<String, VecDeque<String>>,
    current: HashMap<String, String>,
    cursor: HashMap<String, CursorPosition>,
    sent: Vec<Sent>,
    input_error: Option<String>,
    spawn_error: Option<String>,
    monitor_sizes: Vec<PaneDimensions>,
}

/// In-memory tmux server. Visible captures replay a per-pane script and
/// then repeat the last screen.
#[derive(Default)]
pub struct FakeTmux {
    state: Mutex<FakeState>,
    monitors_spawned: AtomicUsize,
    monitors_alive: Arc<AtomicUsize>,
    monitor_dead: Arc<AtomicBool>,
}

impl FakeTmux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pane(self, session: &str, pane_id: &str, screen: &str) -> Self {
        self.add_pane(session, pane_id, screen);
        self
    }

    pub fn add_pane(&self, session: &str, pane_id: &str, screen: &str) {
        let mut state = self.state.lock().expect("fake state lock");
        state
            .sessions
            .entry(session.to_string())
            .or_default()
            .push(pane_id.to_string());
        state
            .backlog
            .insert(pane_id.to_string(), screen.to_string());
        state
            .current
            .insert(pane_id.to_string(), screen.to_string());
    }

    pub fn script_screens(&self, pane_id: &str, screens: &[&str]) {
        let mut state = self.state.lock().expect("fake state lock");
        state.screens.insert(
            pane_id.to_string(),
            screens.iter().map(|screen| screen.to_string()).collect(),
        );
    }

    pub fn set_screen(&self, pane_id: &str, screen: &str) {
        let mut state = self.state.lock().expect("fake state lock");
        state
            .screens
            .entry(pane_id.to_string())
            .or_default()
            .push_back(screen.to_string());
    }

    pub fn set_cursor(&self, pane_id: &str, x: u16, y: u16) {
        let mut state = self.state.lock().expect("fake state lock");
        state
            .cursor
            .insert(pane_id.to_string(), CursorPosition { x, y });
    }

    pub fn remove_pane(&self, session: &str, pane_id: &str) {
        let mut state = self.state.lock().expect("fake state lock");
        if let Some(panes) = state.sessions.get_mut(session) {
            panes.retain(|pane| pane != pane_id);
        }
        state.current.remove(pane_id);
        state.screens.remove(pane_id);
    }

    pub fn kill_session(&self, session: &str) {
        let mut state = self.state.lock().expect("fake state lock");
        if let Some(panes) = state.sessions.remove(session) {
            for pane in panes {
                state.current.remove(&pane);
                state.screens.remove(&pane);
            }
        }
    }

    pub fn fail_input(&self, reason: &str) {
        self.state.lock().expect("fake state lock").input_error = Some(reason.to_string());
    }

    pub fn fail_spawn(&self, reason: &str) {
        self.state.lock().expect("fake state lock").spawn_error = Some(reason.to_string());
    }

    pub fn kill_monitors(&self) {
        self.monitor_dead.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.state.lock().expect("fake state lock").sent.clone()
    }

    pub fn monitor_sizes(&self) -> Vec<PaneDimensions> {
        self.state
            .lock()
            .expect("fake state lock")
            .monitor_sizes
            .clone()
    }

    pub fn monitors_spawned(&self) -> usize {
        self.monitors_spawned.load(Ordering::SeqCst)
    }

    pub fn monitors_alive(&self) -> usize {
        self.monitors_alive.load(Ordering::SeqCst)
    }
}

impl PaneLocator for FakeTmux {
    fn session_exists(&self, session: &str) -> bool {
        self.state
            .lock()
            .expect("fake state lock")
            .sessions
            .contains_key(session)
    }

    fn list_panes(&self, session: &str) -> Result<HashSet<String>, String> {
        let state = self.state.lock().expect("fake state lock");
        state
            .sessions
            .get(session)
            .map(|panes| panes.iter().cloned().collect())
            .ok_or_else(|| format!("can't find session: {session}"))
    }
}

impl OutputSource for FakeTmux {
    fn capture_pane(&self, address: &PaneAddress, range: CaptureRange) -> Result<String, String> {
        let mut state = self.state.lock().expect("fake state lock");
        if !state.current.contains_key(&address.pane_id) {
            return Err(format!("can't find pane: {}", address.pane_id));
        }
        match range {
            CaptureRange::Backlog(_) => Ok(state
                .backlog
                .get(&address.pane_id)
                .cloned()
                .unwrap_or_default()),
            CaptureRange::Visible => {
                let next = state
                    .screens
                    .get_mut(&address.pane_id)
                    .and_then(VecDeque::pop_front);
                if let Some(screen) = next {
                    state.current.insert(address.pane_id.clone(), screen);
                }
                Ok(state
                    .current
                    .get(&address.pane_id)
                    .cloned()
                    .unwrap_or_default())
            }
        }
    }

    fn cursor_position(&self, address: &PaneAddress) -> Result<CursorPosition, String> {
        let state = self.state.lock().expect("fake state lock");
        Ok(state
            .cursor
            .get(&address.pane_id)
            .copied()
            .unwrap_or(CursorPosition { x: 0, y: 0 }))
    }

    fn spawn_monitor(
        &self,
        _address: &PaneAddress,
        dimensions: PaneDimensions,
    ) -> Result<Box<dyn MonitorProcess>, String> {
        let mut state = self.state.lock().expect("fake state lock");
        if let Some(err) = &state.spawn_error {
            return Err(err.clone());
        }
        state.monitor_sizes.push(dimensions);
        self.monitors_spawned.fetch_add(1, Ordering::SeqCst);
        self.monitors_alive.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeMonitor {
            alive: self.monitors_alive.clone(),
            dead: self.monitor_dead.clone(),
        }))
    }
}

impl InputSink for FakeTmux {
    fn send_literal(&self, address: &PaneAddress, bytes: &[u8]) -> Result<(), String> {
        let mut state = self.state.lock().expect("fake state lock");
        if let Some(err) = &state.input_error {
            return Err(err.clone());
        }
        state.sent.push(Sent::Literal {
            pane_id: address.pane_id.clone(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    fn send_named_key(&self, address: &PaneAddress, key: &str) -> Result<(), String> {
        let mut state = self.state.lock().expect("fake state lock");
        if let Some(err) = &state.input_error {
            return Err(err.clone());
        }
        state.sent.push(Sent::Key {
            pane_id: address.pane_id.clone(),
            key: key.to_string(),
        });
        Ok(())
    }
}

struct FakeMonitor {
    alive: Arc<AtomicUsize>,
    dead: Arc<AtomicBool>,
}

impl MonitorProcess for FakeMonitor {
    fn resize(&mut self, _dimensions: PaneDimensions) -> Result<(), String> {
        Ok(())
    }

    fn try_exit(&mut self) -> Option<MonitorExit> {
        self.dead
            .load(Ordering::SeqCst)
            .then_some(MonitorExit { code: Some(1) })
    }

    fn terminate(self: Box<Self>) -> MonitorExit {
        self.alive.fetch_sub(1, Ordering::SeqCst);
        MonitorExit { code: None }
    }
}

/// Collects events until `done` returns true for one of them or the
/// timeout passes.
pub fn collect_until<F>(events: &Receiver<PaneEvent>, timeout: Duration, done: F) -> Vec<PaneEvent>
where
    F: Fn(&PaneEvent) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut collected = Vec::new();
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match events.recv_timeout(remaining) {
            Ok(event) => {
                let finished = done(&event);
                collected.push(event);
                if finished {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    collected
}

/// Drains whatever arrives within `window`.
pub fn drain_for(events: &Receiver<PaneEvent>, window: Duration) -> Vec<PaneEvent> {
    collect_until(events, window, |_| false)
}

pub fn wait_until<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
