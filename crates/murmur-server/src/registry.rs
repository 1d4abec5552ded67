//! Live connection tracking.
//!
//! Maintains an in-memory map from user identity to that user's single
//! active live-channel connection. Handshake completions, disconnect
//! signals, and delivery lookups all race on this map, so every operation
//! takes the one internal lock; none of them block beyond it.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use murmur_shared::protocol::ServerEvent;
use murmur_shared::types::{ConnectionId, UserId};

/// Capacity of each connection's outbound event queue.
pub const EVENT_QUEUE_CAPACITY: usize = 64;

/// Sending half of a live connection's event queue.
///
/// Cloned freely; the socket's writer task owns the receiving half. Emits
/// go through `try_send`, so a closed or saturated receiver drops the event
/// instead of blocking the caller.
pub type ConnectionHandle = mpsc::Sender<ServerEvent>;

struct Registration {
    conn_id: ConnectionId,
    handle: ConnectionHandle,
}

/// Tracks which users currently hold an open live channel.
///
/// Constructed once at process start and shared by the handshake, the
/// presence broadcaster, and the delivery bridge. At most one connection is
/// tracked per user: a later handshake for the same identity replaces the
/// earlier one (the superseded socket stays open but becomes unreachable
/// for presence and delivery).
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<UserId, Registration>>,
}

impl ConnectionRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Record a freshly authenticated connection, replacing any previous
    /// registration for the same user. Always succeeds.
    pub fn register(&self, user: UserId, conn_id: ConnectionId, handle: ConnectionHandle) {
        let replaced = self
            .connections
            .lock()
            .insert(user, Registration { conn_id, handle })
            .is_some();

        debug!(user = %user, conn = %conn_id, replaced, "registered live connection");
    }

    /// Remove the user's registration, but only if it still belongs to the
    /// given connection.
    ///
    /// A disconnect signal from a socket that has already been superseded by
    /// a newer handshake must not tear down the newer registration, so the
    /// caller passes the `ConnectionId` it registered with. Returns whether
    /// an entry was actually removed.
    pub fn unregister(&self, user: UserId, conn_id: ConnectionId) -> bool {
        let mut connections = self.connections.lock();

        match connections.get(&user) {
            Some(current) if current.conn_id == conn_id => {
                connections.remove(&user);
                debug!(user = %user, conn = %conn_id, "unregistered live connection");
                true
            }
            Some(_) => {
                debug!(user = %user, conn = %conn_id, "ignoring stale disconnect");
                false
            }
            None => false,
        }
    }

    /// Look up the user's current connection, if any. Non-blocking.
    pub fn lookup(&self, user: UserId) -> Option<ConnectionHandle> {
        self.connections.lock().get(&user).map(|r| r.handle.clone())
    }

    /// The set of users currently online.
    pub fn snapshot(&self) -> Vec<UserId> {
        self.connections.lock().keys().copied().collect()
    }

    /// A consistent (handles, snapshot) pair taken under one lock, for
    /// broadcast fan-out. The lock is released before any handle is used.
    pub fn fanout_targets(&self) -> (Vec<ConnectionHandle>, Vec<UserId>) {
        let connections = self.connections.lock();
        let handles = connections.values().map(|r| r.handle.clone()).collect();
        let snapshot = connections.keys().copied().collect();
        (handles, snapshot)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_handle() -> (ConnectionHandle, mpsc::Receiver<ServerEvent>) {
        mpsc::channel(EVENT_QUEUE_CAPACITY)
    }

    #[test]
    fn register_and_lookup() {
        let registry = ConnectionRegistry::new();
        let user = UserId::new();
        let (tx, _rx) = test_handle();

        assert!(registry.lookup(user).is_none());

        registry.register(user, ConnectionId::new(), tx);
        assert!(registry.lookup(user).is_some());
        assert_eq!(registry.snapshot(), vec![user]);
    }

    #[test]
    fn re_registration_keeps_one_entry_per_user() {
        let registry = ConnectionRegistry::new();
        let user = UserId::new();
        let (tx1, _rx1) = test_handle();
        let (tx2, mut rx2) = test_handle();

        registry.register(user, ConnectionId::new(), tx1);
        registry.register(user, ConnectionId::new(), tx2);

        assert_eq!(registry.snapshot(), vec![user]);

        // The surviving handle is the later one.
        let handle = registry.lookup(user).unwrap();
        handle
            .try_send(ServerEvent::GetOnlineUsers(vec![user]))
            .unwrap();
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn stale_disconnect_does_not_remove_newer_registration() {
        let registry = ConnectionRegistry::new();
        let user = UserId::new();
        let old_conn = ConnectionId::new();
        let new_conn = ConnectionId::new();
        let (tx1, _rx1) = test_handle();
        let (tx2, _rx2) = test_handle();

        registry.register(user, old_conn, tx1);
        registry.register(user, new_conn, tx2);

        // The old socket's teardown fires after the reconnect.
        assert!(!registry.unregister(user, old_conn));
        assert_eq!(registry.snapshot(), vec![user]);
        assert!(registry.lookup(user).is_some());

        // The current socket's teardown still works.
        assert!(registry.unregister(user, new_conn));
        assert!(registry.lookup(user).is_none());
    }

    #[test]
    fn snapshot_matches_registered_users_exactly() {
        let registry = ConnectionRegistry::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let (tx1, _rx1) = test_handle();
        let (tx2, _rx2) = test_handle();
        let (tx3, _rx3) = test_handle();

        registry.register(alice, ConnectionId::new(), tx1);
        registry.register(bob, ConnectionId::new(), tx2);
        // Replacing alice must not duplicate her in the snapshot.
        registry.register(alice, ConnectionId::new(), tx3);

        let mut snapshot = registry.snapshot();
        snapshot.sort();
        let mut expected = vec![alice, bob];
        expected.sort();
        assert_eq!(snapshot, expected);

        let bob_conn = ConnectionId::new();
        let (tx4, _rx4) = test_handle();
        registry.register(bob, bob_conn, tx4);
        registry.unregister(bob, bob_conn);
        assert_eq!(registry.snapshot(), vec![alice]);
    }

    #[test]
    fn fanout_targets_are_consistent() {
        let registry = ConnectionRegistry::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let (tx1, _rx1) = test_handle();
        let (tx2, _rx2) = test_handle();

        registry.register(alice, ConnectionId::new(), tx1);
        registry.register(bob, ConnectionId::new(), tx2);

        let (handles, snapshot) = registry.fanout_targets();
        assert_eq!(handles.len(), 2);
        assert_eq!(snapshot.len(), 2);
    }
}
