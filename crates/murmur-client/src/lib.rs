//! # murmur-client
//!
//! Client library for the Murmur chat backend: a reqwest-based API client,
//! the conversation/presence state machine, and a WebSocket reader for the
//! live channel.
//!
//! The intended wiring: authenticate with [`ApiClient`], open a
//! [`LiveChannel`] with the session token, and feed its events into a
//! [`ChatClient`], which keeps [`ChatState`] consistent with fetches,
//! sends, and pushes.

pub mod api;
pub mod consumer;
pub mod socket;
pub mod state;

mod error;

pub use api::ApiClient;
pub use consumer::{ChatClient, SubscriptionToken};
pub use error::ClientError;
pub use socket::LiveChannel;
pub use state::ChatState;
