//! # murmur-store
//!
//! Durable storage for the Murmur chat backend, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for user accounts
//! and messages. Migrations run on open, guarded by `PRAGMA user_version`.

pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::UserAccount;
