//! The presence/delivery consumer: glue between the API client, the live
//! channel, and [`ChatState`].
//!
//! Message pushes are gated by an explicit subscription handle. The design
//! allows exactly one active subscription: subscribing again first drops
//! the old one, and unsubscribing with a stale token is a no-op, so
//! duplicate-handler accumulation cannot happen.

use tracing::warn;

use murmur_shared::protocol::ServerEvent;
use murmur_shared::types::UserId;

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::socket::LiveChannel;
use crate::state::ChatState;

/// Handle identifying one message subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionToken(u64);

/// High-level chat client driving [`ChatState`].
pub struct ChatClient {
    api: ApiClient,
    state: ChatState,
    subscription: Option<SubscriptionToken>,
    next_subscription: u64,
}

impl ChatClient {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: ChatState::new(),
            subscription: None,
            next_subscription: 0,
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ChatState {
        &mut self.state
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn api_mut(&mut self) -> &mut ApiClient {
        &mut self.api
    }

    // -- fetches -----------------------------------------------------------

    /// Refresh the roster, falling back to an empty one on failure.
    pub async fn refresh_users(&mut self) {
        self.state.begin_roster_fetch();
        match self.api.list_users().await {
            Ok(users) => self.state.set_roster(users),
            Err(e) => {
                warn!(error = %e, "failed to fetch users");
                self.state.roster_fetch_failed("Failed to load users");
            }
        }
    }

    /// Open a conversation: select the peer, subscribe to its pushes, and
    /// load history (falling back to empty on failure).
    pub async fn open_conversation(&mut self, peer: UserId) -> SubscriptionToken {
        self.state.select_peer(Some(peer));
        let token = self.subscribe();

        match self.api.get_messages(peer).await {
            Ok(messages) => self.state.set_history(messages),
            Err(e) => {
                warn!(error = %e, peer = %peer, "failed to fetch history");
                self.state.history_fetch_failed("Failed to load messages");
            }
        }

        token
    }

    /// Close the open conversation and stop consuming its pushes.
    pub fn close_conversation(&mut self) {
        if let Some(token) = self.subscription {
            self.unsubscribe(token);
        }
        self.state.select_peer(None);
    }

    /// Send to the selected peer. Only the server-confirmed record is
    /// appended; a failed send changes nothing besides a notice.
    pub async fn send(
        &mut self,
        text: Option<&str>,
        media_url: Option<&str>,
    ) -> Result<(), ClientError> {
        let peer = self.state.selected_peer.ok_or(ClientError::NoPeerSelected)?;

        match self.api.send_message(peer, text, media_url).await {
            Ok(record) => {
                self.state.append_confirmed(record);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to send message");
                self.state.push_notice("Failed to send message");
                Err(e)
            }
        }
    }

    // -- subscription ------------------------------------------------------

    /// Start consuming message pushes. Any previous subscription is dropped
    /// first, so at most one is ever active.
    pub fn subscribe(&mut self) -> SubscriptionToken {
        self.next_subscription += 1;
        let token = SubscriptionToken(self.next_subscription);
        self.subscription = Some(token);
        token
    }

    /// Stop consuming message pushes. Idempotent; a token from a
    /// subscription that was already replaced does nothing.
    pub fn unsubscribe(&mut self, token: SubscriptionToken) {
        if self.subscription == Some(token) {
            self.subscription = None;
        }
    }

    // -- events ------------------------------------------------------------

    /// Apply one live-channel event. Presence always lands in state;
    /// message pushes only while a subscription is active.
    pub fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::GetOnlineUsers(_) => self.state.apply_event(event),
            ServerEvent::NewMessage(_) => {
                if self.subscription.is_some() {
                    self.state.apply_event(event);
                }
            }
        }
    }

    /// Drain the live channel until it closes, applying every event.
    pub async fn run(&mut self, channel: &mut LiveChannel) {
        while let Some(event) = channel.next_event().await {
            self.handle_event(event);
        }
    }
}
