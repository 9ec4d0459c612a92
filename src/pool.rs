use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::attachment::{
    AttachmentHandle, AttachmentRequest, LifecycleNotifier, LifecycleSignal, SpecialKey,
    StreamConfig, lock_ignoring_poison, spawn_attachment,
};
use crate::domain::{PaneAddress, PaneDimensions};
use crate::error::AttachError;
use crate::event::{ExitReason, PaneEvent};
use crate::tmux::TmuxBackend;

pub const DEFAULT_MAX_CONNECTIONS: usize = 6;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PoolConfig {
    pub max_connections: usize,
    pub stream: StreamConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            stream: StreamConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Admission {
    AlreadyActive,
    Admitted {
        evicted: Option<String>,
        ticket: u64,
    },
    Rejected,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConnectOutcome {
    AlreadyActive,
    Connecting { evicted: Option<String> },
    Rejected,
}

impl From<Admission> for ConnectOutcome {
    fn from(admission: Admission) -> Self {
        match admission {
            Admission::AlreadyActive => Self::AlreadyActive,
            Admission::Admitted { evicted, .. } => Self::Connecting { evicted },
            Admission::Rejected => Self::Rejected,
        }
    }
}

type EvictedPane = (String, Option<AttachmentHandle>);

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectedSummary {
    pub logical_id: String,
    pub address: PaneAddress,
    pub connected_at: DateTime<Utc>,
    pub last_focused_at: DateTime<Utc>,
    pub streaming: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PoolStatus {
    pub max_connections: usize,
    pub focused: Option<String>,
    pub connected: Vec<ConnectedSummary>,
    pub connecting: Vec<String>,
}

#[derive(Debug)]
struct ConnectingEntry {
    ticket: u64,
    attachment: Option<AttachmentHandle>,
}

#[derive(Debug)]
struct ConnectedEntry {
    address: PaneAddress,
    attachment: Option<AttachmentHandle>,
    connected_at: DateTime<Utc>,
    last_focused_at: DateTime<Utc>,
    focus_tick: u64,
}

#[derive(Debug)]
struct PoolState {
    connected: HashMap<String, ConnectedEntry>,
    connecting: HashMap<String, ConnectingEntry>,
    max_connections: usize,
    focused: Option<String>,
    focus_clock: u64,
    next_ticket: u64,
}

impl PoolState {
    fn contains(&self, logical_id: &str) -> bool {
        self.connected.contains_key(logical_id) || self.connecting.contains_key(logical_id)
    }

    fn occupied(&self) -> usize {
        self.connected.len() + self.connecting.len()
    }

    fn has_capacity(&self) -> bool {
        self.occupied() < self.max_connections
    }

    fn tick(&mut self) -> u64 {
        self.focus_clock += 1;
        self.focus_clock
    }

    fn allocate_ticket(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }

    fn refusal(&self, logical_id: &str) -> Option<Admission> {
        if self.contains(logical_id) {
            return Some(Admission::AlreadyActive);
        }
        if !self.has_capacity() && self.least_recently_used().is_none() {
            return Some(Admission::Rejected);
        }
        None
    }

    fn place(
        &mut self,
        logical_id: &str,
        entry: ConnectingEntry,
    ) -> Result<Option<EvictedPane>, (Admission, ConnectingEntry)> {
        if let Some(refusal) = self.refusal(logical_id) {
            return Err((refusal, entry));
        }
        let mut evicted = None;
        if !self.has_capacity()
            && let Some(victim) = self.least_recently_used()
        {
            let attachment = self.remove(&victim).flatten();
            evicted = Some((victim, attachment));
        }
        self.connecting.insert(logical_id.to_string(), entry);
        Ok(evicted)
    }

    fn least_recently_used(&self) -> Option<String> {
        self.connected
            .iter()
            .filter(|(logical_id, _)| self.focused.as_deref() != Some(logical_id.as_str()))
            .min_by_key(|(_, entry)| entry.focus_tick)
            .map(|(logical_id, _)| logical_id.clone())
    }

    fn promote(&mut self, logical_id: &str, address: PaneAddress) -> bool {
        let Some(entry) = self.connecting.remove(logical_id) else {
            return false;
        };
        let now = Utc::now();
        let focus_tick = self.tick();
        self.connected.insert(
            logical_id.to_string(),
            ConnectedEntry {
                address,
                attachment: entry.attachment,
                connected_at: now,
                last_focused_at: now,
                focus_tick,
            },
        );
        true
    }

    fn attachment(&self, logical_id: &str) -> Option<&AttachmentHandle> {
        if let Some(entry) = self.connected.get(logical_id) {
            return entry.attachment.as_ref();
        }
        self.connecting
            .get(logical_id)
            .and_then(|entry| entry.attachment.as_ref())
    }

    // Closes the event gate while the lock is still held.
    fn remove(&mut self, logical_id: &str) -> Option<Option<AttachmentHandle>> {
        let attachment = if let Some(entry) = self.connected.remove(logical_id) {
            entry.attachment
        } else {
            self.connecting.remove(logical_id)?.attachment
        };
        if let Some(attachment) = &attachment {
            attachment.cancel();
        }
        Some(attachment)
    }
}

struct PoolInner {
    state: Mutex<PoolState>,
    backend: Arc<dyn TmuxBackend>,
    events: Sender<PaneEvent>,
    stream: StreamConfig,
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        lock_ignoring_poison(&self.state)
    }

    fn handle_signal(&self, signal: LifecycleSignal) {
        match signal {
            LifecycleSignal::Confirmed { logical_id, serial } => {
                let mut state = self.lock();
                let Some(entry) = state.connecting.get(&logical_id) else {
                    return;
                };
                if entry.ticket != serial {
                    return;
                }
                let Some(address) = entry
                    .attachment
                    .as_ref()
                    .map(|attachment| attachment.address().clone())
                else {
                    return;
                };
                state.promote(&logical_id, address);
                info!(pane = %logical_id, connected = state.connected.len(), "pane connected");
            }
            LifecycleSignal::Ended { logical_id, serial } => {
                let removed = {
                    let mut state = self.lock();
                    let owned_by_serial = state
                        .attachment(&logical_id)
                        .is_some_and(|attachment| attachment.serial() == serial);
                    if owned_by_serial {
                        state.remove(&logical_id)
                    } else {
                        None
                    }
                };
                if removed.is_some() {
                    info!(pane = %logical_id, "pane attachment ended on its own");
                }
                // The loop is already finishing; dropping its handle detaches it.
                drop(removed);
            }
        }
    }

    fn finish_teardown(
        &self,
        logical_id: &str,
        attachment: Option<AttachmentHandle>,
        reason: ExitReason,
    ) {
        let Some(attachment) = attachment else {
            return;
        };
        let outcome = attachment.shutdown();
        if outcome.exit_emitted {
            return;
        }
        let reason = if outcome.reason == ExitReason::Disconnected {
            reason
        } else {
            outcome.reason
        };
        let _ = self.events.send(PaneEvent::Exit {
            pane_id: logical_id.to_string(),
            code: outcome.code,
            reason,
        });
    }
}

/// At most `max_connections` panes are connected or connecting.
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    pub fn new(
        backend: Arc<dyn TmuxBackend>,
        config: PoolConfig,
        events: Sender<PaneEvent>,
    ) -> Self {
        let max_connections = config.max_connections.max(1);
        info!(max_connections, "creating connection pool");
        Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState {
                    connected: HashMap::new(),
                    connecting: HashMap::new(),
                    max_connections,
                    focused: None,
                    focus_clock: 0,
                    next_ticket: 1,
                }),
                backend,
                events,
                stream: config.stream,
            }),
        }
    }

    pub fn admit(&self, logical_id: &str) -> Admission {
        let (ticket, evicted) = {
            let mut state = self.inner.lock();
            let ticket = state.allocate_ticket();
            let entry = ConnectingEntry {
                ticket,
                attachment: None,
            };
            match state.place(logical_id, entry) {
                Ok(evicted) => (ticket, evicted),
                Err((refusal, _)) => {
                    if refusal == Admission::Rejected {
                        debug!(pane = %logical_id, "pool full and nothing evictable");
                    }
                    return refusal;
                }
            }
        };
        let evicted = self.finish_eviction(logical_id, evicted);
        Admission::Admitted { evicted, ticket }
    }

    /// Validates the address and spawns the attachment before admitting it,
    /// so a failed connect never evicts anything. The pane becomes connected
    /// once its first capture succeeds.
    pub fn connect(
        &self,
        logical_id: &str,
        address: PaneAddress,
        dimensions: PaneDimensions,
    ) -> Result<ConnectOutcome, AttachError> {
        if let Some(refusal) = self.inner.lock().refusal(logical_id) {
            return Ok(refusal.into());
        }
        if !self.inner.backend.exists(&address) {
            return Err(AttachError::NotFound {
                target: address.to_string(),
            });
        }

        let ticket = self.inner.lock().allocate_ticket();
        let request = AttachmentRequest {
            logical_id: logical_id.to_string(),
            serial: ticket,
            address,
            dimensions,
            config: self.inner.stream,
        };
        let attachment = spawn_attachment(
            self.inner.backend.clone(),
            request,
            self.inner.events.clone(),
            self.notifier(),
        )
        .inspect_err(|err| warn!(pane = %logical_id, error = %err, "attachment spawn failed"))?;

        let placed = {
            let mut state = self.inner.lock();
            let entry = ConnectingEntry {
                ticket,
                attachment: Some(attachment),
            };
            match state.place(logical_id, entry) {
                Ok(evicted) => {
                    if let Some(attachment) = state.attachment(logical_id) {
                        attachment.start();
                    }
                    Ok(evicted)
                }
                Err((refusal, entry)) => Err((refusal, entry.attachment)),
            }
        };
        match placed {
            Ok(evicted) => {
                let evicted = self.finish_eviction(logical_id, evicted);
                Ok(ConnectOutcome::Connecting { evicted })
            }
            Err((refusal, attachment)) => {
                // Lost a race with another connect; the loop never started.
                if let Some(attachment) = attachment {
                    attachment.shutdown();
                }
                Ok(refusal.into())
            }
        }
    }

    pub fn confirm_connection(&self, logical_id: &str, address: PaneAddress) -> bool {
        let mut state = self.inner.lock();
        state.promote(logical_id, address)
    }

    pub fn report_connection_failed(&self, logical_id: &str) {
        let attachment = {
            let mut state = self.inner.lock();
            if state.connecting.contains_key(logical_id) {
                state.remove(logical_id).flatten()
            } else {
                None
            }
        };
        self.inner
            .finish_teardown(logical_id, attachment, ExitReason::Failed);
    }

    pub fn disconnect(&self, logical_id: &str) -> bool {
        let removed = self.inner.lock().remove(logical_id);
        let Some(attachment) = removed else {
            return false;
        };
        info!(pane = %logical_id, "disconnecting pane");
        self.inner
            .finish_teardown(logical_id, attachment, ExitReason::Disconnected);
        true
    }

    pub fn disconnect_all(&self) {
        let removed = {
            let mut state = self.inner.lock();
            let mut ids = state.connected.keys().cloned().collect::<Vec<_>>();
            ids.extend(state.connecting.keys().cloned());
            ids.into_iter()
                .filter_map(|logical_id| {
                    state
                        .remove(&logical_id)
                        .map(|attachment| (logical_id, attachment))
                })
                .collect::<Vec<_>>()
        };
        if !removed.is_empty() {
            info!(count = removed.len(), "disconnecting all panes");
        }
        for (logical_id, attachment) in removed {
            self.inner
                .finish_teardown(&logical_id, attachment, ExitReason::Disconnected);
        }
    }

    pub fn touch(&self, logical_id: &str) -> bool {
        let mut state = self.inner.lock();
        if !state.connected.contains_key(logical_id) {
            return false;
        }
        let focus_tick = state.tick();
        if let Some(entry) = state.connected.get_mut(logical_id) {
            entry.focus_tick = focus_tick;
            entry.last_focused_at = Utc::now();
        }
        true
    }

    pub fn set_focused(&self, logical_id: Option<&str>) {
        self.inner.lock().focused = logical_id.map(ToString::to_string);
    }

    pub fn focus(&self, logical_id: &str) {
        self.set_focused(Some(logical_id));
        self.touch(logical_id);
    }

    pub fn focused(&self) -> Option<String> {
        self.inner.lock().focused.clone()
    }

    pub fn can_connect(&self) -> bool {
        self.inner.lock().has_capacity()
    }

    pub fn least_recently_used(&self) -> Option<String> {
        self.inner.lock().least_recently_used()
    }

    pub fn is_connected(&self, logical_id: &str) -> bool {
        self.inner.lock().connected.contains_key(logical_id)
    }

    pub fn is_connecting(&self, logical_id: &str) -> bool {
        self.inner.lock().connecting.contains_key(logical_id)
    }

    pub fn max_connections(&self) -> usize {
        self.inner.lock().max_connections
    }

    pub fn connected_ids(&self) -> Vec<String> {
        let mut ids = self
            .inner
            .lock()
            .connected
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        ids.sort();
        ids
    }

    pub fn connecting_ids(&self) -> Vec<String> {
        let mut ids = self
            .inner
            .lock()
            .connecting
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        ids.sort();
        ids
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.inner.lock();
        let mut connected = state
            .connected
            .iter()
            .map(|(logical_id, entry)| ConnectedSummary {
                logical_id: logical_id.clone(),
                address: entry.address.clone(),
                connected_at: entry.connected_at,
                last_focused_at: entry.last_focused_at,
                streaming: entry.attachment.is_some(),
            })
            .collect::<Vec<_>>();
        connected.sort_by(|a, b| a.logical_id.cmp(&b.logical_id));
        let mut connecting = state.connecting.keys().cloned().collect::<Vec<_>>();
        connecting.sort();
        PoolStatus {
            max_connections: state.max_connections,
            focused: state.focused.clone(),
            connected,
            connecting,
        }
    }

    pub fn send_input(&self, logical_id: &str, bytes: &[u8]) -> bool {
        self.inner
            .lock()
            .attachment(logical_id)
            .is_some_and(|attachment| attachment.send_input(bytes))
    }

    pub fn send_special_key(&self, logical_id: &str, key: SpecialKey) -> bool {
        self.inner
            .lock()
            .attachment(logical_id)
            .is_some_and(|attachment| attachment.send_special_key(key))
    }

    pub fn resize(&self, logical_id: &str, cols: u16, rows: u16) -> bool {
        self.inner
            .lock()
            .attachment(logical_id)
            .is_some_and(|attachment| attachment.resize(PaneDimensions::new(cols, rows)))
    }

    fn finish_eviction(&self, admitted: &str, evicted: Option<EvictedPane>) -> Option<String> {
        let (victim, attachment) = evicted?;
        info!(pane = %victim, admitted = %admitted, "evicting least recently used pane");
        self.inner
            .finish_teardown(&victim, attachment, ExitReason::Evicted);
        Some(victim)
    }

    fn notifier(&self) -> LifecycleNotifier {
        let inner: Weak<PoolInner> = Arc::downgrade(&self.inner);
        Box::new(move |signal| {
            if let Some(inner) = inner.upgrade() {
                inner.handle_signal(signal);
            }
        })
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.disconnect_all();
    }
}
