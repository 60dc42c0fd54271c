//! HTTP API.
//!
//! Request/response fallback for clients without a live realtime
//! connection. Every route goes through the same store and coordinator
//! paths as the WebSocket gateway, so both produce identical persisted
//! state.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use agora_realtime::{
    CallRelay, ConnectionRegistry, DeliveryCoordinator, PresenceRegistry, TypingTracker,
};
use agora_shared::constants::DEFAULT_PAGE_SIZE;
use agora_shared::protocol::{CallSignal, ServerEvent};
use agora_shared::types::{ConversationId, MessageId, UserId};
use agora_store::{Conversation, Database, Message};

use crate::auth::{principal_from_headers, PrincipalResolver};
use crate::config::ServerConfig;
use crate::directory::{DirectoryEntry, UserDirectory};
use crate::error::ApiError;
use crate::ws;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<Database>>,
    pub coordinator: DeliveryCoordinator,
    pub presence: PresenceRegistry,
    pub typing: TypingTracker,
    pub connections: ConnectionRegistry,
    pub calls: CallRelay,
    pub resolver: Arc<dyn PrincipalResolver>,
    pub directory: Arc<dyn UserDirectory>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    fn principal(&self, headers: &HeaderMap) -> Result<UserId, ApiError> {
        principal_from_headers(self.resolver.as_ref(), headers)
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/ws", get(ws::ws_handler))
        .route("/conversations", get(list_conversations))
        .route("/conversations", post(start_conversation))
        .route("/conversations/:id", get(get_conversation))
        .route("/conversations/:id", delete(delete_conversation))
        .route("/conversations/:id/hide", post(hide_conversation))
        .route("/conversations/:id/messages", get(page_messages))
        .route("/conversations/:id/messages", post(send_message))
        .route("/conversations/:id/read", post(mark_all_read))
        .route("/conversations/:id/typing", post(set_typing))
        .route("/messages/delivered", post(mark_all_delivered))
        .route("/messages/:id/read", post(mark_read))
        .route("/messages/:id", patch(edit_message))
        .route("/messages/:id", delete(delete_message))
        .route("/unread", get(unread_counts))
        .route("/calls/signal", post(relay_call_signal))
        .route("/users/search", get(search_users))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    online_users: usize,
}

/// A conversation as seen by one participant.
#[derive(Serialize)]
struct ConversationDto {
    id: ConversationId,
    other_user_id: UserId,
    other_display_name: Option<String>,
    created_at: String,
    last_message_at: String,
    unread: u64,
}

impl ConversationDto {
    fn build(
        conversation: &Conversation,
        requester: UserId,
        unread: u64,
        directory: &dyn UserDirectory,
    ) -> Result<Self, ApiError> {
        let other = conversation
            .other_participant(requester)
            .ok_or(ApiError::Forbidden)?;
        Ok(Self {
            id: conversation.id,
            other_user_id: other,
            other_display_name: directory.display_name(other),
            created_at: conversation.created_at.to_rfc3339(),
            last_message_at: conversation.last_message_at.to_rfc3339(),
            unread,
        })
    }
}

#[derive(Serialize)]
struct MessageDto {
    id: MessageId,
    conversation_id: ConversationId,
    sender_id: UserId,
    body: String,
    state: String,
    created_at: String,
    delivered_at: Option<String>,
    read_at: Option<String>,
    edited: bool,
    edited_at: Option<String>,
}

impl From<&Message> for MessageDto {
    fn from(m: &Message) -> Self {
        Self {
            id: m.id,
            conversation_id: m.conversation_id,
            sender_id: m.sender_id,
            body: m.body.clone(),
            state: m.state.to_string(),
            created_at: m.created_at.to_rfc3339(),
            delivered_at: m.delivered_at.map(|t| t.to_rfc3339()),
            read_at: m.read_at.map(|t| t.to_rfc3339()),
            edited: m.edited,
            edited_at: m.edited_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Deserialize)]
struct StartConversationRequest {
    other_user_id: UserId,
    /// Optional first message, delivered through the normal send path.
    initial_message: Option<String>,
}

#[derive(Deserialize)]
struct SendMessageRequest {
    body: String,
}

#[derive(Deserialize)]
struct EditMessageRequest {
    body: String,
}

#[derive(Deserialize)]
struct TypingRequest {
    is_typing: bool,
}

#[derive(Deserialize)]
struct PageParams {
    #[serde(default)]
    page: u32,
    page_size: Option<u32>,
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    #[serde(default)]
    followed_only: bool,
}

#[derive(Serialize)]
struct MarkedResponse {
    marked: usize,
}

#[derive(Serialize)]
struct UnreadEntry {
    conversation_id: ConversationId,
    unread: u64,
}

#[derive(Serialize)]
struct UnreadResponse {
    total: u64,
    conversations: Vec<UnreadEntry>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        online_users: state.presence.online_count().await,
    })
}

async fn list_conversations(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<ConversationDto>>, ApiError> {
    let user = state.principal(&headers)?;

    let (conversations, unread) = {
        let store = state.store.lock().await;
        (
            store.list_conversations(user)?,
            store.unread_by_conversation(user)?,
        )
    };

    let unread: HashMap<ConversationId, u64> = unread.into_iter().collect();
    let mut dtos = Vec::with_capacity(conversations.len());
    for conversation in &conversations {
        dtos.push(ConversationDto::build(
            conversation,
            user,
            unread.get(&conversation.id).copied().unwrap_or(0),
            state.directory.as_ref(),
        )?);
    }
    Ok(Json(dtos))
}

async fn start_conversation(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<StartConversationRequest>,
) -> Result<Json<ConversationDto>, ApiError> {
    let user = state.principal(&headers)?;

    let conversation = state
        .store
        .lock()
        .await
        .start_or_get(user, req.other_user_id)?;

    if let Some(body) = req.initial_message.as_deref() {
        state.coordinator.send(conversation.id, user, body).await?;
    }

    info!(
        conversation = %conversation.id,
        user = %user.short(),
        "conversation started"
    );

    let (conversation, unread) = {
        let store = state.store.lock().await;
        let conversation = store.get_conversation(conversation.id, user)?;
        let unread = store.unread_count(conversation.id, user)?;
        (conversation, unread)
    };
    Ok(Json(ConversationDto::build(
        &conversation,
        user,
        unread,
        state.directory.as_ref(),
    )?))
}

async fn get_conversation(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
) -> Result<Json<ConversationDto>, ApiError> {
    let user = state.principal(&headers)?;

    let (conversation, unread) = {
        let store = state.store.lock().await;
        let conversation = store.get_conversation(id, user)?;
        let unread = store.unread_count(id, user)?;
        (conversation, unread)
    };
    Ok(Json(ConversationDto::build(
        &conversation,
        user,
        unread,
        state.directory.as_ref(),
    )?))
}

async fn hide_conversation(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state.principal(&headers)?;
    state.store.lock().await.hide_conversation(id, user)?;
    Ok(Json(serde_json::json!({ "hidden": true })))
}

async fn delete_conversation(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state.principal(&headers)?;
    state.store.lock().await.soft_delete_conversation(id, user)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn page_messages(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let user = state.principal(&headers)?;

    let messages = state.store.lock().await.page_messages(
        id,
        user,
        params.page,
        params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    )?;
    Ok(Json(messages.iter().map(MessageDto::from).collect()))
}

async fn send_message(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<MessageDto>, ApiError> {
    let user = state.principal(&headers)?;
    let message = state.coordinator.send(id, user, &req.body).await?;
    Ok(Json(MessageDto::from(&message)))
}

async fn mark_all_read(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
) -> Result<Json<MarkedResponse>, ApiError> {
    let user = state.principal(&headers)?;
    let marked = state.coordinator.mark_all_read(id, user).await?;
    Ok(Json(MarkedResponse { marked }))
}

async fn mark_read(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<MessageId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state.principal(&headers)?;
    let advanced = state.coordinator.mark_read(id, user).await?;
    Ok(Json(serde_json::json!({ "read": advanced })))
}

/// Fallback for clients that fetched their backlog over HTTP instead of a
/// live connection: confirm everything pending as delivered.
async fn mark_all_delivered(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<MarkedResponse>, ApiError> {
    let user = state.principal(&headers)?;
    let delivered = state
        .store
        .lock()
        .await
        .mark_all_undelivered_delivered(user)?;
    Ok(Json(MarkedResponse {
        marked: delivered.len(),
    }))
}

async fn edit_message(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<MessageId>,
    Json(req): Json<EditMessageRequest>,
) -> Result<Json<MessageDto>, ApiError> {
    let user = state.principal(&headers)?;
    let message = state.store.lock().await.edit_message(id, user, &req.body)?;
    Ok(Json(MessageDto::from(&message)))
}

async fn delete_message(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<MessageId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state.principal(&headers)?;
    state.store.lock().await.soft_delete_message(id, user)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn unread_counts(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<UnreadResponse>, ApiError> {
    let user = state.principal(&headers)?;

    let (total, per_conversation) = {
        let store = state.store.lock().await;
        (store.unread_total(user)?, store.unread_by_conversation(user)?)
    };

    Ok(Json(UnreadResponse {
        total,
        conversations: per_conversation
            .into_iter()
            .map(|(conversation_id, unread)| UnreadEntry {
                conversation_id,
                unread,
            })
            .collect(),
    }))
}

async fn set_typing(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
    Json(req): Json<TypingRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state.principal(&headers)?;

    // Participant check before touching ephemeral state.
    let conversation = state.store.lock().await.get_conversation(id, user)?;

    state.typing.set_typing(id, user, req.is_typing).await;

    if let Some(other) = conversation.other_participant(user) {
        state
            .connections
            .send(
                other,
                ServerEvent::TypingStatus {
                    conversation_id: id,
                    user_id: user,
                    is_typing: req.is_typing,
                },
            )
            .await;
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Unauthorized or undeliverable call signals are logged and dropped; the
/// submitter always gets 200.
async fn relay_call_signal(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(signal): Json<CallSignal>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state.principal(&headers)?;
    state.calls.relay(signal, user).await;
    Ok(Json(serde_json::json!({ "accepted": true })))
}

async fn search_users(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<DirectoryEntry>>, ApiError> {
    let user = state.principal(&headers)?;
    Ok(Json(state.directory.search(
        &params.q,
        user,
        params.followed_only,
    )))
}

// ---------------------------------------------------------------------------
// Serve
// ---------------------------------------------------------------------------

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
