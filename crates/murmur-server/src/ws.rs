//! Live channel: WebSocket handshake and connection lifecycle.
//!
//! A client opens `GET /ws?token=<session-token>`. The token is resolved
//! against the session store before the upgrade; a valid one binds the
//! socket to a registry entry for its user. A missing or invalid token
//! still gets an upgraded socket -- it is simply never registered, so it
//! sees no presence and receives no deliveries.
//!
//! Teardown runs on disconnect or socket error, removes the registration
//! (guarded by the connection id, so a reconnect that already replaced this
//! entry is left alone), and re-announces presence.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header, HeaderMap},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use murmur_shared::protocol::ServerEvent;
use murmur_shared::types::{ConnectionId, UserId};

use crate::api::AppState;
use crate::auth::SessionStore;
use crate::error::ServerError;
use crate::registry::EVENT_QUEUE_CAPACITY;

#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// Resolve the handshake token to an identity, if possible.
///
/// `None` covers both an absent token and one the session store rejects;
/// only the latter is worth a log line.
fn resolve_identity(token: Option<&str>, sessions: &SessionStore) -> Option<UserId> {
    let token = token?;
    let identity = sessions.resolve(token);
    if identity.is_none() {
        debug!("live channel token rejected; serving unauthenticated");
    }
    identity
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<LiveQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Response, ServerError> {
    // The live channel shares the HTTP origin allow-list, but CORS layers
    // do not cover WebSocket upgrades, so the check happens here.
    if let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) {
        if !state.config.origin_allowed(origin) {
            warn!(origin = %origin, "rejecting live channel from disallowed origin");
            return Err(ServerError::Forbidden("Origin not allowed".into()));
        }
    }

    let identity = resolve_identity(query.token.as_deref(), &state.sessions);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, identity)))
}

/// Service one upgraded socket until it closes.
async fn handle_socket(socket: WebSocket, state: AppState, identity: Option<UserId>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let conn_id = ConnectionId::new();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(EVENT_QUEUE_CAPACITY);

    // Writer task: drains the connection's event queue onto the socket.
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let frame = match event.to_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "failed to encode live event, dropping it");
                    continue;
                }
            };
            if ws_tx.send(WsMessage::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    if let Some(user) = identity {
        state.registry.register(user, conn_id, tx);
        state.broadcaster.announce();
        info!(user = %user, conn = %conn_id, "live channel registered");
    } else {
        // Unauthenticated sockets stay open but never join the registry.
        drop(tx);
        debug!(conn = %conn_id, "unauthenticated live channel; not registering");
    }

    // Clients do not speak on this channel; we only watch for the end of
    // the stream. Pings are answered by the protocol layer.
    while let Some(Ok(frame)) = ws_rx.next().await {
        if let WsMessage::Close(_) = frame {
            break;
        }
    }

    if let Some(user) = identity {
        if state.registry.unregister(user, conn_id) {
            state.broadcaster.announce();
        }
        info!(user = %user, conn = %conn_id, "live channel closed");
    }

    writer.abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_resolves_to_no_identity() {
        let sessions = SessionStore::new(3600);
        assert!(resolve_identity(None, &sessions).is_none());
    }

    #[test]
    fn invalid_token_resolves_to_no_identity() {
        let sessions = SessionStore::new(3600);
        assert!(resolve_identity(Some("bogus"), &sessions).is_none());
    }

    #[test]
    fn valid_token_resolves_to_its_user() {
        let sessions = SessionStore::new(3600);
        let user = UserId::new();
        let token = sessions.issue(user);

        assert_eq!(resolve_identity(Some(&token), &sessions), Some(user));
    }
}
