//! Live-channel event protocol.
//!
//! Every push from the server to a connected client is one of these events,
//! serialized as a JSON text frame of the form
//! `{"event": "<name>", "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::types::{Message, UserId};

/// An event pushed over a live channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Full presence snapshot: every user currently holding an open live
    /// channel. Sent to all registered connections on each registry change;
    /// clients replace their online set wholesale.
    GetOnlineUsers(Vec<UserId>),
    /// A freshly persisted message addressed to this connection's user.
    NewMessage(Message),
}

impl ServerEvent {
    /// Encode the event as a wire frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a wire frame back into an event.
    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }
}
