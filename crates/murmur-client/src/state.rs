//! Client-side conversation and presence state.
//!
//! [`ChatState`] is a plain reducer: the async layers (API calls, the live
//! channel) feed results and events into it, and a UI reads it. Fetch
//! failures follow a fail-safe-empty policy -- the affected collection is
//! cleared and one notice is queued for the user, rather than leaving stale
//! data on screen.

use std::collections::HashSet;

use tracing::debug;

use murmur_shared::protocol::ServerEvent;
use murmur_shared::types::{Message, UserId, UserProfile};

/// State backing one chat view: the roster, who is online, and the
/// currently open conversation.
#[derive(Debug, Default)]
pub struct ChatState {
    /// Known users, excluding ourselves.
    pub roster: Vec<UserProfile>,
    /// Users currently holding a live channel, per the latest snapshot.
    pub online: HashSet<UserId>,
    /// The peer whose conversation is open, if any.
    pub selected_peer: Option<UserId>,
    /// Messages of the open conversation, in arrival order.
    pub messages: Vec<Message>,
    pub is_users_loading: bool,
    pub is_messages_loading: bool,
    notices: Vec<String>,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    // -- roster ------------------------------------------------------------

    pub fn begin_roster_fetch(&mut self) {
        self.is_users_loading = true;
    }

    pub fn set_roster(&mut self, users: Vec<UserProfile>) {
        self.roster = users;
        self.is_users_loading = false;
    }

    /// Fail-safe-empty: clear the roster and surface exactly one notice.
    pub fn roster_fetch_failed(&mut self, notice: impl Into<String>) {
        self.roster.clear();
        self.is_users_loading = false;
        self.notices.push(notice.into());
    }

    // -- conversation ------------------------------------------------------

    /// Open (or close, with `None`) a conversation. The previous
    /// conversation's messages never carry over.
    pub fn select_peer(&mut self, peer: Option<UserId>) {
        self.selected_peer = peer;
        self.messages.clear();
        self.is_messages_loading = peer.is_some();
    }

    pub fn set_history(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.is_messages_loading = false;
    }

    /// Fail-safe-empty, same policy as the roster.
    pub fn history_fetch_failed(&mut self, notice: impl Into<String>) {
        self.messages.clear();
        self.is_messages_loading = false;
        self.notices.push(notice.into());
    }

    /// Append a server-confirmed record of our own send. There is no
    /// optimistic echo: only what the server stored lands here.
    pub fn append_confirmed(&mut self, message: Message) {
        self.messages.push(message);
    }

    // -- live events -------------------------------------------------------

    /// Apply one live-channel event.
    ///
    /// Presence snapshots replace the online set wholesale. Pushed messages
    /// are appended only when their sender is the selected peer; pushes from
    /// anyone else are dropped, since there is no unread tracking to hand
    /// them to.
    pub fn apply_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::GetOnlineUsers(ids) => {
                self.online = ids.into_iter().collect();
            }
            ServerEvent::NewMessage(message) => {
                if self.selected_peer == Some(message.sender_id) {
                    self.messages.push(message);
                } else {
                    debug!(
                        sender = %message.sender_id,
                        "dropping pushed message from non-selected peer"
                    );
                }
            }
        }
    }

    pub fn is_online(&self, user: UserId) -> bool {
        self.online.contains(&user)
    }

    // -- notices -----------------------------------------------------------

    /// Queue a user-facing notice without touching any collection.
    pub fn push_notice(&mut self, notice: impl Into<String>) {
        self.notices.push(notice.into());
    }

    /// Drain queued user-facing notices (oldest first).
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    pub fn notices(&self) -> &[String] {
        &self.notices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn profile(username: &str) -> UserProfile {
        UserProfile {
            id: UserId::new(),
            username: username.to_string(),
            display_name: None,
            created_at: Utc::now(),
        }
    }

    fn message_from(sender: UserId, text: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id: sender,
            recipient_id: UserId::new(),
            text: Some(text.to_string()),
            media_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn roster_fetch_failure_empties_and_notices_once() {
        let mut state = ChatState::new();
        state.set_roster(vec![profile("alice"), profile("bob")]);

        state.begin_roster_fetch();
        state.roster_fetch_failed("Failed to load users");

        assert!(state.roster.is_empty());
        assert!(!state.is_users_loading);
        assert_eq!(state.take_notices(), vec!["Failed to load users"]);
        // Drained: a second read sees nothing.
        assert!(state.take_notices().is_empty());
    }

    #[test]
    fn history_fetch_failure_empties_and_notices_once() {
        let mut state = ChatState::new();
        let peer = UserId::new();
        state.select_peer(Some(peer));
        state.set_history(vec![message_from(peer, "old")]);

        state.history_fetch_failed("Failed to load messages");

        assert!(state.messages.is_empty());
        assert!(!state.is_messages_loading);
        assert_eq!(state.notices().len(), 1);
    }

    #[test]
    fn selecting_a_peer_clears_the_previous_conversation() {
        let mut state = ChatState::new();
        let alice = UserId::new();
        state.select_peer(Some(alice));
        state.set_history(vec![message_from(alice, "hi")]);

        let bob = UserId::new();
        state.select_peer(Some(bob));

        assert!(state.messages.is_empty());
        assert!(state.is_messages_loading);
        assert_eq!(state.selected_peer, Some(bob));
    }

    #[test]
    fn pushed_message_from_selected_peer_is_appended() {
        let mut state = ChatState::new();
        let alice = UserId::new();
        state.select_peer(Some(alice));
        state.set_history(Vec::new());

        state.apply_event(ServerEvent::NewMessage(message_from(alice, "hello")));

        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn pushed_message_from_other_peer_is_dropped() {
        let mut state = ChatState::new();
        let alice = UserId::new();
        let mallory = UserId::new();
        state.select_peer(Some(alice));
        state.set_history(Vec::new());

        state.apply_event(ServerEvent::NewMessage(message_from(mallory, "psst")));

        assert!(state.messages.is_empty());
    }

    #[test]
    fn presence_snapshot_replaces_the_online_set() {
        let mut state = ChatState::new();
        let alice = UserId::new();
        let bob = UserId::new();

        state.apply_event(ServerEvent::GetOnlineUsers(vec![alice, bob]));
        assert!(state.is_online(alice));
        assert!(state.is_online(bob));

        state.apply_event(ServerEvent::GetOnlineUsers(vec![bob]));
        assert!(!state.is_online(alice));
        assert!(state.is_online(bob));
    }

    #[test]
    fn confirmed_send_is_appended() {
        let mut state = ChatState::new();
        let peer = UserId::new();
        state.select_peer(Some(peer));
        state.set_history(Vec::new());

        let me = UserId::new();
        state.append_confirmed(message_from(me, "sent"));

        assert_eq!(state.messages.len(), 1);
    }
}
