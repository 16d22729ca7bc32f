//! Identity & Presence Registry
//!
//! Owns the live-connection table. A connection is opened unbound, becomes
//! bound to exactly one identity on `join`, and is removed on disconnect.
//! An identity is online while it has at least one bound connection.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::Identity;
use crate::protocol::ServerEvent;

pub type ConnectionId = u64;

/// Sender half of a connection's bounded outbound queue.
pub type ConnectionSink = mpsc::Sender<ServerEvent>;

/// Presence flip caused by a connect or disconnect
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceChange {
    CameOnline(Identity),
    WentOffline {
        identity: Identity,
        last_seen: DateTime<Utc>,
    },
}

impl PresenceChange {
    fn to_event(&self) -> ServerEvent {
        match self {
            PresenceChange::CameOnline(identity) => ServerEvent::PresenceChanged {
                identity: identity.clone(),
                is_online: true,
                last_seen: None,
            },
            PresenceChange::WentOffline {
                identity,
                last_seen,
            } => ServerEvent::PresenceChanged {
                identity: identity.clone(),
                is_online: false,
                last_seen: Some(*last_seen),
            },
        }
    }
}

struct ConnectionEntry {
    sink: ConnectionSink,
    identity: Option<Identity>,
}

impl ConnectionEntry {
    /// Queues `event` without waiting. A full queue drops it.
    fn push(&self, event: ServerEvent) -> bool {
        match self.sink.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(
                    "[Presence] outbound queue full for {:?}, dropped {}",
                    self.identity.as_ref().map(Identity::as_str),
                    event.name()
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    by_identity: HashMap<Identity, HashSet<ConnectionId>>,
    last_seen: HashMap<Identity, DateTime<Utc>>,
}

impl RegistryState {
    /// Unbinds `conn` from its identity, returning the offline flip if it was the last one.
    fn unbind(&mut self, conn: ConnectionId) -> Option<PresenceChange> {
        let identity = self.connections.get_mut(&conn)?.identity.take()?;
        let now_empty = match self.by_identity.get_mut(&identity) {
            Some(set) => {
                set.remove(&conn);
                set.is_empty()
            }
            None => false,
        };
        if !now_empty {
            return None;
        }
        self.by_identity.remove(&identity);
        let last_seen = Utc::now();
        self.last_seen.insert(identity.clone(), last_seen);
        Some(PresenceChange::WentOffline {
            identity,
            last_seen,
        })
    }

    fn broadcast(&self, event: &ServerEvent) -> usize {
        self.connections
            .values()
            .filter(|entry| entry.identity.is_some())
            .filter(|entry| entry.push(event.clone()))
            .count()
    }
}

/// Live connections and presence, scoped to one server instance
pub struct PresenceRegistry {
    state: Mutex<RegistryState>,
    next_id: AtomicU64,
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a fresh, unbound connection.
    pub fn open(&self, sink: ConnectionSink) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.state.lock().connections.insert(
            id,
            ConnectionEntry {
                sink,
                identity: None,
            },
        );
        debug!("[Presence] connection {} opened", id);
        id
    }

    /// Binds `conn` to `identity`.
    ///
    /// Re-binding to the same identity is a no-op. Binding to a different
    /// identity releases the previous binding first. Presence flips are
    /// broadcast to every bound connection before this returns.
    pub fn connect(&self, identity: &Identity, conn: ConnectionId) -> Result<Vec<PresenceChange>> {
        let mut state = self.state.lock();
        let current = state
            .connections
            .get(&conn)
            .ok_or_else(|| Error::NotFound(format!("connection {}", conn)))?
            .identity
            .clone();

        if current.as_ref() == Some(identity) {
            return Ok(Vec::new());
        }

        let mut changes = Vec::new();
        if current.is_some() {
            changes.extend(state.unbind(conn));
        }

        if let Some(entry) = state.connections.get_mut(&conn) {
            entry.identity = Some(identity.clone());
        }
        let set = state.by_identity.entry(identity.clone()).or_default();
        set.insert(conn);
        if set.len() == 1 {
            changes.push(PresenceChange::CameOnline(identity.clone()));
        }

        for change in &changes {
            state.broadcast(&change.to_event());
        }
        info!("[Presence] {} joined on connection {}", identity, conn);
        Ok(changes)
    }

    /// Removes `conn`. Unknown handles are ignored.
    pub fn disconnect(&self, conn: ConnectionId) -> Option<PresenceChange> {
        let mut state = self.state.lock();
        let change = state.unbind(conn);
        state.connections.remove(&conn);
        if let Some(change) = &change {
            state.broadcast(&change.to_event());
        }
        debug!("[Presence] connection {} closed", conn);
        change
    }

    pub fn is_online(&self, identity: &Identity) -> bool {
        self.state.lock().by_identity.contains_key(identity)
    }

    /// Time of the last disconnect seen by this instance
    pub fn last_seen(&self, identity: &Identity) -> Option<DateTime<Utc>> {
        self.state.lock().last_seen.get(identity).copied()
    }

    pub fn identity_of(&self, conn: ConnectionId) -> Option<Identity> {
        self.state
            .lock()
            .connections
            .get(&conn)
            .and_then(|entry| entry.identity.clone())
    }

    pub fn connection_count(&self, identity: &Identity) -> usize {
        self.state
            .lock()
            .by_identity
            .get(identity)
            .map(HashSet::len)
            .unwrap_or(0)
    }

    pub fn online_identities(&self) -> Vec<Identity> {
        let mut online: Vec<_> = self.state.lock().by_identity.keys().cloned().collect();
        online.sort();
        online
    }

    /// Pushes `event` to every connection of `identity`, returning how many accepted it.
    pub fn send_to(&self, identity: &Identity, event: &ServerEvent) -> usize {
        let state = self.state.lock();
        let Some(conns) = state.by_identity.get(identity) else {
            return 0;
        };
        conns
            .iter()
            .filter_map(|conn| state.connections.get(conn))
            .filter(|entry| entry.push(event.clone()))
            .count()
    }

    /// Pushes directly to one connection, bound or not.
    pub fn send_to_connection(&self, conn: ConnectionId, event: ServerEvent) -> bool {
        self.state
            .lock()
            .connections
            .get(&conn)
            .map(|entry| entry.push(event))
            .unwrap_or(false)
    }

    /// Pushes `event` to every bound connection.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        self.state.lock().broadcast(event)
    }
}
