use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// User identity, issued once at signup and never reused.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier minted for a single live-channel attempt.
///
/// Distinct from [`UserId`]: a user who reconnects gets a fresh
/// `ConnectionId`, which is what lets a late disconnect signal from the old
/// socket be told apart from the current registration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user as shown to other users. Never carries credential material.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Optional human-readable display name.
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single persisted chat message between two users.
///
/// The storage layer assigns `id` and `created_at`; once stored, a record is
/// never mutated -- the delivery path only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    /// Text body. At least one of `text` / `media_url` is present.
    pub text: Option<String>,
    /// Reference to an already-uploaded media object.
    pub media_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// True when the message carries neither text nor media.
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().map_or(true, str::is_empty) && self.media_url.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_round_trips_through_string() {
        let id = UserId::new();
        let parsed = UserId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn message_wire_shape_is_camel_case() {
        let msg = Message {
            id: Uuid::new_v4(),
            sender_id: UserId::new(),
            recipient_id: UserId::new(),
            text: Some("hello".to_string()),
            media_url: None,
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("senderId").is_some());
        assert!(value.get("recipientId").is_some());
        assert!(value.get("mediaUrl").is_some());
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn empty_message_detection() {
        let mut msg = Message {
            id: Uuid::new_v4(),
            sender_id: UserId::new(),
            recipient_id: UserId::new(),
            text: None,
            media_url: None,
            created_at: Utc::now(),
        };
        assert!(msg.is_empty());

        msg.text = Some(String::new());
        assert!(msg.is_empty());

        msg.media_url = Some("https://example.com/cat.png".to_string());
        assert!(!msg.is_empty());
    }
}
