use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use murmur_shared::types::{Message, UserId, UserProfile};
use murmur_store::{Database, StoreError, UserAccount};

use crate::auth::{self, SessionStore};
use crate::config::ServerConfig;
use crate::delivery::DeliveryBridge;
use crate::error::ServerError;
use crate::presence::PresenceBroadcaster;
use crate::registry::ConnectionRegistry;
use crate::ws;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<tokio::sync::Mutex<Database>>,
    pub sessions: Arc<SessionStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: Arc<PresenceBroadcaster>,
    pub delivery: Arc<DeliveryBridge>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring unparseable allowed origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/check", get(auth_check))
        .route("/messages/users", get(list_users))
        .route("/messages/send/:recipient_id", post(send_message))
        .route("/messages/:user_id", get(get_history))
        .route("/ws", get(ws::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    online: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        online: state.registry.snapshot().len(),
    })
}

async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<AuthResponse>, ServerError> {
    let username = req.username.trim().to_string();
    if username.is_empty() {
        return Err(ServerError::BadRequest("Username is required".into()));
    }
    if req.password.len() < 6 {
        return Err(ServerError::BadRequest(
            "Password must be at least 6 characters".into(),
        ));
    }

    let password_hash = auth::hash_password(&req.password)
        .map_err(|e| ServerError::Internal(format!("Password hashing failed: {e}")))?;

    let account = UserAccount {
        id: UserId::new(),
        username,
        display_name: req.display_name,
        password_hash,
        created_at: chrono::Utc::now(),
    };

    {
        let db = state.db.lock().await;
        db.insert_user(&account).map_err(|e| match e {
            StoreError::UsernameTaken => ServerError::UsernameTaken,
            other => ServerError::Store(other),
        })?;
    }

    let token = state.sessions.issue(account.id);
    info!(user = %account.id, username = %account.username, "user signed up");

    Ok(Json(AuthResponse {
        user: account.profile(),
        token,
    }))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ServerError> {
    let account = {
        let db = state.db.lock().await;
        db.get_user_by_username(req.username.trim())
            .map_err(|e| match e {
                StoreError::NotFound => ServerError::Unauthorized("Invalid credentials".into()),
                other => ServerError::Store(other),
            })?
    };

    if !auth::verify_password(&req.password, &account.password_hash) {
        return Err(ServerError::Unauthorized("Invalid credentials".into()));
    }

    let token = state.sessions.issue(account.id);
    info!(user = %account.id, "user logged in");

    Ok(Json(AuthResponse {
        user: account.profile(),
        token,
    }))
}

async fn logout(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Json<serde_json::Value> {
    if let Some(token) = auth::bearer_token(&headers) {
        state.sessions.revoke(token);
    }
    Json(serde_json::json!({ "loggedOut": true }))
}

async fn auth_check(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, ServerError> {
    let caller = auth::require_session(&headers, &state.sessions)?;

    let db = state.db.lock().await;
    let account = db.get_user_by_id(caller).map_err(|e| match e {
        StoreError::NotFound => ServerError::Unauthorized("Unknown user".into()),
        other => ServerError::Store(other),
    })?;

    Ok(Json(account.profile()))
}

/// All known users except the caller: the roster shown in the sidebar.
async fn list_users(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserProfile>>, ServerError> {
    let caller = auth::require_session(&headers, &state.sessions)?;

    let db = state.db.lock().await;
    let users = db.list_users_except(caller)?;

    Ok(Json(users))
}

/// Full message history between the caller and the given peer.
async fn get_history(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, ServerError> {
    let caller = auth::require_session(&headers, &state.sessions)?;
    let peer = UserId(user_id);

    let db = state.db.lock().await;
    db.get_user_by_id(peer).map_err(|e| match e {
        StoreError::NotFound => ServerError::NotFound("User not found".into()),
        other => ServerError::Store(other),
    })?;

    let messages = db.get_conversation(caller, peer)?;

    Ok(Json(messages))
}

/// Persist a message, push it to the recipient's live channel if they are
/// connected, then return the stored record to the sender.
async fn send_message(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(recipient_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<Message>, ServerError> {
    let caller = auth::require_session(&headers, &state.sessions)?;
    let recipient = UserId(recipient_id);

    let message = Message {
        id: Uuid::new_v4(),
        sender_id: caller,
        recipient_id: recipient,
        text: req.text,
        media_url: req.media_url,
        created_at: chrono::Utc::now(),
    };

    if message.is_empty() {
        return Err(ServerError::BadRequest(
            "Message needs text or a media URL".into(),
        ));
    }

    {
        let db = state.db.lock().await;
        db.get_user_by_id(recipient).map_err(|e| match e {
            StoreError::NotFound => ServerError::NotFound("Recipient not found".into()),
            other => ServerError::Store(other),
        })?;

        db.insert_message(&message)?;
    }

    // Push before responding, so the durable write and the live push are
    // settled by the time the sender sees its 200.
    state.delivery.deliver(&message);

    info!(
        msg_id = %message.id,
        from = %caller,
        to = %recipient,
        "message sent"
    );

    Ok(Json(message))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
