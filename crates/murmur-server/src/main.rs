//! # murmur-server
//!
//! Backend for the Murmur one-to-one chat application.
//!
//! This binary provides:
//! - **REST API** (axum) for signup/login, user discovery, and persisted
//!   message exchange
//! - **Live channel** (WebSocket) pushing presence snapshots and freshly
//!   stored messages to connected clients
//! - **SQLite storage** for user accounts and message history

mod api;
mod auth;
mod config;
mod delivery;
mod error;
mod presence;
mod registry;
mod ws;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use murmur_store::Database;

use crate::api::AppState;
use crate::auth::SessionStore;
use crate::config::ServerConfig;
use crate::delivery::DeliveryBridge;
use crate::presence::PresenceBroadcaster;
use crate::registry::ConnectionRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,murmur_server=debug")),
        )
        .init();

    info!("Starting Murmur chat server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Durable store (creates the database file if missing)
    let db = Database::open_at(&config.database_path)?;

    // Session store for issued credentials
    let sessions = Arc::new(SessionStore::new(config.session_ttl_secs));

    // The live-connection registry and the two components built on it.
    // Constructed once here and handed around by reference so tests can run
    // isolated instances side by side.
    let registry = Arc::new(ConnectionRegistry::new());
    let broadcaster = Arc::new(PresenceBroadcaster::new(registry.clone()));
    let delivery = Arc::new(DeliveryBridge::new(registry.clone()));

    let http_addr = config.http_addr;
    let state = AppState {
        db: Arc::new(tokio::sync::Mutex::new(db)),
        sessions: sessions.clone(),
        registry,
        broadcaster,
        delivery,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic session cleanup (every 10 minutes)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(600));
        loop {
            interval.tick().await;
            sessions.purge_expired();
            tracing::debug!(live = sessions.session_count(), "purged expired sessions");
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP + live-channel server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
