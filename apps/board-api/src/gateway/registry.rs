//! Live-connection registry keyed by connection id.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedSender;

/// Outbound handle for one client socket. The connection task drains the
/// receiving end and writes each frame to the transport.
pub type OutboundSender = UnboundedSender<String>;

/// Registry record for one live connection.
///
/// Owned exclusively by the registry; the dispatcher only ever sees
/// [`ConnectionSnapshot`] copies taken under the lock. The display name is
/// cached at admission so broadcasts and logs never need a user lookup.
pub struct ConnectionEntry {
    pub connection_id: String,
    pub user_id: String,
    pub display_name: String,
    pub sender: OutboundSender,
}

/// Point-in-time copy of an entry, handed to the dispatcher for delivery.
#[derive(Clone)]
pub struct ConnectionSnapshot {
    pub connection_id: String,
    pub user_id: String,
    pub display_name: String,
    pub sender: OutboundSender,
}

/// Error returned when admitting a connection id that is already registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateConnection(pub String);

impl std::fmt::Display for DuplicateConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "connection {} is already registered", self.0)
    }
}

impl std::error::Error for DuplicateConnection {}

/// Shared registry of all live gateway connections.
///
/// One `RwLock<HashMap>` guards the map, so admissions and evictions are
/// serialized and `snapshot()` / `count_distinct_users()` observe a
/// consistent point-in-time view. Connection ids are `conn_`-prefixed ULIDs
/// and are never reused.
pub struct ConnectionRegistry {
    inner: RwLock<HashMap<String, ConnectionEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection. A connection id that is already present is
    /// rejected and the registry is left untouched.
    pub fn admit(&self, entry: ConnectionEntry) -> Result<(), DuplicateConnection> {
        let mut map = self.inner.write();
        if map.contains_key(&entry.connection_id) {
            return Err(DuplicateConnection(entry.connection_id.clone()));
        }
        map.insert(entry.connection_id.clone(), entry);
        Ok(())
    }

    /// Remove a connection. Returns whether an entry was actually removed.
    ///
    /// Evicting an unknown id is a benign no-op, not an error — disconnect
    /// notifications can race or double-fire and must be tolerated.
    pub fn evict(&self, connection_id: &str) -> bool {
        self.inner.write().remove(connection_id).is_some()
    }

    /// Point-in-time copy of all live connections for dispatch iteration.
    pub fn snapshot(&self) -> Vec<ConnectionSnapshot> {
        self.inner
            .read()
            .values()
            .map(|e| ConnectionSnapshot {
                connection_id: e.connection_id.clone(),
                user_id: e.user_id.clone(),
                display_name: e.display_name.clone(),
                sender: e.sender.clone(),
            })
            .collect()
    }

    /// Number of distinct users holding at least one live connection.
    ///
    /// Computed from a single locked read of the map — never accumulated
    /// incrementally, so it cannot drift from missed increments or
    /// decrements.
    pub fn count_distinct_users(&self) -> usize {
        let map = self.inner.read();
        map.values()
            .map(|e| e.user_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Number of live connections (not users).
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
