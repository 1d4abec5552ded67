//! Domain model structs persisted in the SQLite database.
//!
//! The message record is shared wire-for-wire with the server and client, so
//! it lives in `murmur-shared`; only the account struct (which carries the
//! password hash) is store-private.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use murmur_shared::types::{UserId, UserProfile};

/// A registered user account as stored, including credential material.
///
/// Never hand this to other users; convert to [`UserProfile`] first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAccount {
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Optional human-readable display name.
    pub display_name: Option<String>,
    /// Argon2 hash in PHC string format.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    /// The public view of this account.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            created_at: self.created_at,
        }
    }
}
