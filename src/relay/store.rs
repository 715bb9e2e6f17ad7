//! Relay connection store
//!
//! Thread-safe registry of live WebSocket connections, project broadcast
//! groups, user-to-connection presence, and per-project typing sets. All of
//! it is process-lifetime state; nothing here is persisted.
//!
//! Each connection owns an unbounded outbound channel; a writer task pumps
//! the channel into the socket sink, so fan-out never blocks on a slow peer.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// Opaque per-connection id
pub type ConnId = u64;

/// Outbound channel feeding a connection's writer task
pub type Outbound = mpsc::UnboundedSender<Message>;

struct ConnectionEntry {
    user_id: Option<String>,
    tx: Outbound,
}

/// Cleanup computed when a connection goes away
pub struct DisconnectCleanup {
    pub user_id: Option<String>,
    /// Projects whose typing set still listed the user
    pub typing_projects: Vec<String>,
}

pub struct RelayStore {
    connections: DashMap<ConnId, ConnectionEntry>,
    /// user id -> active connection
    users: DashMap<String, ConnId>,
    /// project id -> broadcast group membership
    groups: DashMap<String, HashSet<ConnId>>,
    /// project id -> user ids currently typing
    typing: DashMap<String, HashSet<String>>,
    next_id: AtomicU64,
    count: AtomicUsize,
    max_connections: usize,
}

impl RelayStore {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: DashMap::new(),
            users: DashMap::new(),
            groups: DashMap::new(),
            typing: DashMap::new(),
            next_id: AtomicU64::new(1),
            count: AtomicUsize::new(0),
            max_connections,
        }
    }

    pub fn is_at_capacity(&self) -> bool {
        self.count.load(Ordering::Relaxed) >= self.max_connections
    }

    pub fn connection_count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Register a new connection, or None when at capacity
    pub fn register(&self, tx: Outbound) -> Option<ConnId> {
        if self.is_at_capacity() {
            return None;
        }

        let conn = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections
            .insert(conn, ConnectionEntry { user_id: None, tx });
        self.count.fetch_add(1, Ordering::Relaxed);

        debug!(conn, count = self.connection_count(), "relay connection registered");
        Some(conn)
    }

    /// Bind a user id to a connection
    ///
    /// A reconnecting user replaces their previous mapping; the old
    /// connection stays open but is no longer addressable by user id.
    pub fn identify(&self, conn: ConnId, user_id: &str) {
        if let Some(mut entry) = self.connections.get_mut(&conn) {
            entry.user_id = Some(user_id.to_string());
        }
        self.users.insert(user_id.to_string(), conn);
    }

    pub fn user_id_of(&self, conn: ConnId) -> Option<String> {
        self.connections.get(&conn).and_then(|e| e.user_id.clone())
    }

    pub fn join_group(&self, project_id: &str, conn: ConnId) {
        self.groups
            .entry(project_id.to_string())
            .or_default()
            .insert(conn);
    }

    pub fn leave_group(&self, project_id: &str, conn: ConnId) {
        if let Some(mut members) = self.groups.get_mut(project_id) {
            members.remove(&conn);
        }
    }

    /// Send one frame to one connection
    pub fn send_to(&self, conn: ConnId, text: String) -> bool {
        match self.connections.get(&conn) {
            Some(entry) => entry.tx.send(Message::Text(text)).is_ok(),
            None => false,
        }
    }

    /// Fan a frame out to a project group, optionally skipping one member
    pub fn broadcast(&self, project_id: &str, text: &str, except: Option<ConnId>) {
        let Some(members) = self.groups.get(project_id) else {
            return;
        };
        for conn in members.iter() {
            if Some(*conn) == except {
                continue;
            }
            self.send_to(*conn, text.to_string());
        }
    }

    /// Mark a user as typing in a project
    pub fn set_typing(&self, project_id: &str, user_id: &str) {
        self.typing
            .entry(project_id.to_string())
            .or_default()
            .insert(user_id.to_string());
    }

    /// Clear a user's typing flag; true if it was set
    pub fn clear_typing(&self, project_id: &str, user_id: &str) -> bool {
        self.typing
            .get_mut(project_id)
            .map(|mut users| users.remove(user_id))
            .unwrap_or(false)
    }

    /// Drop a connection and reconcile presence state
    pub fn disconnect(&self, conn: ConnId) -> DisconnectCleanup {
        let user_id = match self.connections.remove(&conn) {
            Some((_, entry)) => {
                self.count.fetch_sub(1, Ordering::Relaxed);
                entry.user_id
            }
            None => None,
        };

        for mut members in self.groups.iter_mut() {
            members.remove(&conn);
        }

        let mut typing_projects = Vec::new();
        if let Some(user_id) = &user_id {
            // only unmap the user if this was still their live connection
            self.users
                .remove_if(user_id, |_, mapped| *mapped == conn);

            for mut entry in self.typing.iter_mut() {
                if entry.value_mut().remove(user_id) {
                    typing_projects.push(entry.key().clone());
                }
            }
        }

        debug!(conn, count = self.connection_count(), "relay connection removed");
        DisconnectCleanup {
            user_id,
            typing_projects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(store: &RelayStore) -> (ConnId, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = store.register(tx).unwrap();
        (conn, rx)
    }

    #[test]
    fn test_capacity_limit() {
        let store = RelayStore::new(2);
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(store.register(tx.clone()).is_some());
        assert!(store.register(tx.clone()).is_some());
        assert!(store.register(tx).is_none());
        assert_eq!(store.connection_count(), 2);
    }

    #[test]
    fn test_broadcast_skips_excluded_sender() {
        let store = RelayStore::new(8);
        let (a, mut rx_a) = connect(&store);
        let (b, mut rx_b) = connect(&store);
        store.join_group("p1", a);
        store.join_group("p1", b);

        store.broadcast("p1", "hello", Some(a));

        assert!(rx_a.try_recv().is_err());
        assert!(matches!(rx_b.try_recv(), Ok(Message::Text(t)) if t == "hello"));
    }

    #[test]
    fn test_disconnect_reports_typing_projects() {
        let store = RelayStore::new(8);
        let (a, _rx) = connect(&store);
        store.identify(a, "u1");
        store.join_group("p1", a);
        store.set_typing("p1", "u1");
        store.set_typing("p2", "u1");

        let cleanup = store.disconnect(a);

        assert_eq!(cleanup.user_id.as_deref(), Some("u1"));
        let mut projects = cleanup.typing_projects;
        projects.sort();
        assert_eq!(projects, vec!["p1", "p2"]);
        assert_eq!(store.connection_count(), 0);
        assert!(!store.clear_typing("p1", "u1"));
    }

    #[test]
    fn test_reconnect_keeps_latest_mapping() {
        let store = RelayStore::new(8);
        let (old, _rx_old) = connect(&store);
        let (new, _rx_new) = connect(&store);
        store.identify(old, "u1");
        store.identify(new, "u1");

        // disconnecting the stale connection must not unmap the new one
        store.disconnect(old);
        assert_eq!(*store.users.get("u1").unwrap(), new);
    }

    #[test]
    fn test_clear_typing_only_when_set() {
        let store = RelayStore::new(8);
        store.set_typing("p1", "u1");
        assert!(store.clear_typing("p1", "u1"));
        assert!(!store.clear_typing("p1", "u1"));
        assert!(!store.clear_typing("p2", "u1"));
    }
}
