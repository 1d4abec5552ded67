//! Presence broadcasting.
//!
//! Whenever the connection registry changes, the current online set is
//! announced to every registered connection as a full snapshot rather than a
//! diff: clients replace their state wholesale, so a missed intermediate
//! broadcast heals itself on the next one.

use std::sync::Arc;

use tracing::debug;

use murmur_shared::protocol::ServerEvent;

use crate::registry::ConnectionRegistry;

/// Announces registry changes to all connected clients.
pub struct PresenceBroadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl PresenceBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Emit the current online set to every registered connection.
    ///
    /// The snapshot and the fan-out targets are read under one registry
    /// lock, then emitted lock-free. A connection that closes mid-iteration
    /// is skipped; it never fails the broadcast.
    pub fn announce(&self) {
        let (handles, snapshot) = self.registry.fanout_targets();

        debug!(online = snapshot.len(), "broadcasting presence snapshot");

        for handle in handles {
            if handle
                .try_send(ServerEvent::GetOnlineUsers(snapshot.clone()))
                .is_err()
            {
                debug!("skipping unreachable connection during presence broadcast");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    use murmur_shared::types::{ConnectionId, UserId};

    use crate::registry::EVENT_QUEUE_CAPACITY;

    #[test]
    fn announce_reaches_every_registered_connection() {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = PresenceBroadcaster::new(registry.clone());

        let alice = UserId::new();
        let bob = UserId::new();
        let (tx_a, mut rx_a) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (tx_b, mut rx_b) = mpsc::channel(EVENT_QUEUE_CAPACITY);

        registry.register(alice, ConnectionId::new(), tx_a);
        registry.register(bob, ConnectionId::new(), tx_b);

        broadcaster.announce();

        for rx in [&mut rx_a, &mut rx_b] {
            match rx.try_recv().unwrap() {
                ServerEvent::GetOnlineUsers(mut online) => {
                    online.sort();
                    let mut expected = vec![alice, bob];
                    expected.sort();
                    assert_eq!(online, expected);
                }
                other => panic!("expected presence event, got {other:?}"),
            }
        }
    }

    #[test]
    fn closed_connection_is_skipped_not_fatal() {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = PresenceBroadcaster::new(registry.clone());

        let alice = UserId::new();
        let bob = UserId::new();
        let (tx_a, rx_a) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (tx_b, mut rx_b) = mpsc::channel(EVENT_QUEUE_CAPACITY);

        registry.register(alice, ConnectionId::new(), tx_a);
        registry.register(bob, ConnectionId::new(), tx_b);

        // Alice's socket dies without unregistering first.
        drop(rx_a);

        broadcaster.announce();

        // Bob still receives the snapshot; alice is still listed because the
        // registry has not observed her disconnect yet.
        match rx_b.try_recv().unwrap() {
            ServerEvent::GetOnlineUsers(online) => assert_eq!(online.len(), 2),
            other => panic!("expected presence event, got {other:?}"),
        }
    }

    #[test]
    fn departure_is_reflected_in_next_snapshot() {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = PresenceBroadcaster::new(registry.clone());

        let alice = UserId::new();
        let bob = UserId::new();
        let alice_conn = ConnectionId::new();
        let (tx_a, _rx_a) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (tx_b, mut rx_b) = mpsc::channel(EVENT_QUEUE_CAPACITY);

        registry.register(alice, alice_conn, tx_a);
        registry.register(bob, ConnectionId::new(), tx_b);

        registry.unregister(alice, alice_conn);
        broadcaster.announce();

        match rx_b.try_recv().unwrap() {
            ServerEvent::GetOnlineUsers(online) => assert_eq!(online, vec![bob]),
            other => panic!("expected presence event, got {other:?}"),
        }
    }
}
