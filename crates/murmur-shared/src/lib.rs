//! # murmur-shared
//!
//! Types shared by the Murmur server, store, and client: user and message
//! records as they appear on the wire, plus the live-channel event protocol.

pub mod protocol;
pub mod types;

pub use protocol::ServerEvent;
pub use types::{ConnectionId, Message, UserId, UserProfile};
