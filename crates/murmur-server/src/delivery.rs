//! Live delivery of freshly persisted messages.
//!
//! The bridge runs synchronously inside the send handler, after the store
//! append succeeds and before the HTTP response is produced. It is a pure
//! lookup-and-emit: an offline recipient means the message simply waits in
//! the store for the next history fetch.

use std::sync::Arc;

use tracing::debug;

use murmur_shared::protocol::ServerEvent;
use murmur_shared::types::Message;

use crate::registry::ConnectionRegistry;

/// Pushes stored messages to online recipients.
pub struct DeliveryBridge {
    registry: Arc<ConnectionRegistry>,
}

impl DeliveryBridge {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Push the record to the recipient's live connection, if any.
    ///
    /// Never fails: an absent recipient is a silent no-op, and a recipient
    /// that disconnects between lookup and emit is a dropped write. The
    /// record itself is only read.
    pub fn deliver(&self, message: &Message) {
        match self.registry.lookup(message.recipient_id) {
            Some(handle) => {
                if handle
                    .try_send(ServerEvent::NewMessage(message.clone()))
                    .is_err()
                {
                    debug!(
                        recipient = %message.recipient_id,
                        msg_id = %message.id,
                        "recipient went away before push; message stays stored"
                    );
                }
            }
            None => {
                debug!(
                    recipient = %message.recipient_id,
                    msg_id = %message.id,
                    "recipient offline; no push"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use murmur_shared::types::{ConnectionId, UserId};

    use crate::registry::EVENT_QUEUE_CAPACITY;

    fn test_message(sender: UserId, recipient: UserId) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id: sender,
            recipient_id: recipient,
            text: Some("hello".to_string()),
            media_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn delivers_to_online_recipient() {
        let registry = Arc::new(ConnectionRegistry::new());
        let bridge = DeliveryBridge::new(registry.clone());

        let recipient = UserId::new();
        let (tx, mut rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        registry.register(recipient, ConnectionId::new(), tx);

        let message = test_message(UserId::new(), recipient);
        bridge.deliver(&message);

        match rx.try_recv().unwrap() {
            ServerEvent::NewMessage(pushed) => assert_eq!(pushed, message),
            other => panic!("expected message event, got {other:?}"),
        }
    }

    #[test]
    fn offline_recipient_is_a_silent_no_op() {
        let registry = Arc::new(ConnectionRegistry::new());
        let bridge = DeliveryBridge::new(registry);

        let message = test_message(UserId::new(), UserId::new());
        let before = message.clone();

        bridge.deliver(&message);

        // No panic, no error, record untouched.
        assert_eq!(message, before);
    }

    #[test]
    fn recipient_closing_between_lookup_and_emit_is_dropped() {
        let registry = Arc::new(ConnectionRegistry::new());
        let bridge = DeliveryBridge::new(registry.clone());

        let recipient = UserId::new();
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        registry.register(recipient, ConnectionId::new(), tx);
        drop(rx);

        bridge.deliver(&test_message(UserId::new(), recipient));
    }

    #[test]
    fn delivery_goes_to_recipient_not_sender() {
        let registry = Arc::new(ConnectionRegistry::new());
        let bridge = DeliveryBridge::new(registry.clone());

        let sender = UserId::new();
        let recipient = UserId::new();
        let (tx_s, mut rx_s) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (tx_r, mut rx_r) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        registry.register(sender, ConnectionId::new(), tx_s);
        registry.register(recipient, ConnectionId::new(), tx_r);

        bridge.deliver(&test_message(sender, recipient));

        assert!(rx_r.try_recv().is_ok());
        assert!(rx_s.try_recv().is_err());
    }
}
