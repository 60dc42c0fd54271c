//! Realtime transport gateway.
//!
//! Accepts WebSocket connections, maps each to an authenticated user, and
//! multiplexes inbound commands to the store, delivery coordinator, typing
//! tracker, and call relay, while routing outbound events back to the right
//! live session.
//!
//! Connect sequence: register the session (last session wins), record
//! presence online, flush the undelivered backlog, then broadcast
//! presence-changed to conversation partners. Presence broadcasts are
//! targeted at partners rather than global; partners are looked up from the
//! conversation store at transition time.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use agora_shared::protocol::{ClientCommand, ServerEvent};
use agora_shared::types::UserId;

use crate::api::AppState;
use crate::auth::principal_from_headers;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct WsAuthParams {
    /// Auth token as a query parameter, for clients that cannot set an
    /// Authorization header on the upgrade request.
    token: Option<String>,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<WsAuthParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let user = match params.token.as_deref() {
        Some(token) => state.resolver.resolve(token).ok_or(ApiError::Unauthorized),
        None => principal_from_headers(state.resolver.as_ref(), &headers),
    };

    match user {
        Ok(user) => ws.on_upgrade(move |socket| handle_socket(state, user, socket)),
        Err(e) => e.into_response(),
    }
}

async fn handle_socket(state: AppState, user: UserId, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let connection_id = state.connections.register(user, tx.clone()).await;
    info!(user = %user.short(), "realtime session opened");

    if state.presence.set_online(user).await {
        broadcast_presence(&state, user, true).await;
    }

    if let Err(e) = state.coordinator.flush_on_connect(user).await {
        warn!(user = %user.short(), error = %e, "backlog flush failed");
    }

    // Forward outbound events onto the socket.
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_tx.send(WsMessage::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "failed to serialize server event"),
            }
        }
    });

    // Inbound command loop.
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(command) => dispatch_command(&state, user, command, &tx).await,
                Err(e) => {
                    let _ = tx.send(ServerEvent::Error {
                        message: format!("Invalid command format: {e}"),
                    });
                }
            },
            Ok(WsMessage::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    // Tear down, but only if this session still owns the mapping; a newer
    // session that replaced us stays online.
    send_task.abort();
    if state.connections.unregister(user, connection_id).await {
        if state.presence.set_offline(user).await {
            broadcast_presence(&state, user, false).await;
        }
    }
    info!(user = %user.short(), "realtime session closed");
}

async fn dispatch_command(
    state: &AppState,
    user: UserId,
    command: ClientCommand,
    tx: &mpsc::UnboundedSender<ServerEvent>,
) {
    match command {
        ClientCommand::Send {
            conversation_id,
            body,
        } => match state.coordinator.send(conversation_id, user, &body).await {
            Ok(message) => {
                let _ = tx.send(ServerEvent::MessageAccepted {
                    message: (&message).into(),
                });
            }
            Err(e) => {
                let _ = tx.send(ServerEvent::Error {
                    message: e.to_string(),
                });
            }
        },

        ClientCommand::Typing {
            conversation_id,
            is_typing,
        } => {
            // Participant check before touching ephemeral state.
            let conversation = {
                let store = state.store.lock().await;
                store.get_conversation(conversation_id, user)
            };
            match conversation {
                Ok(conversation) => {
                    state.typing.set_typing(conversation_id, user, is_typing).await;
                    if let Some(other) = conversation.other_participant(user) {
                        state
                            .connections
                            .send(
                                other,
                                ServerEvent::TypingStatus {
                                    conversation_id,
                                    user_id: user,
                                    is_typing,
                                },
                            )
                            .await;
                    }
                }
                Err(e) => {
                    let _ = tx.send(ServerEvent::Error {
                        message: e.to_string(),
                    });
                }
            }
        }

        ClientCommand::MarkRead { message_id } => {
            if let Err(e) = state.coordinator.mark_read(message_id, user).await {
                let _ = tx.send(ServerEvent::Error {
                    message: e.to_string(),
                });
            }
        }

        ClientCommand::MarkAllRead { conversation_id } => {
            if let Err(e) = state.coordinator.mark_all_read(conversation_id, user).await {
                let _ = tx.send(ServerEvent::Error {
                    message: e.to_string(),
                });
            }
        }

        // No reply: failures are logged inside the relay and the signal
        // dropped.
        ClientCommand::CallSignal { signal } => {
            state.calls.relay(signal, user).await;
        }
    }
}

/// Push a presence-changed event to everyone sharing a conversation with
/// `user`. Offline partners are skipped by the registry.
async fn broadcast_presence(state: &AppState, user: UserId, online: bool) {
    let partners = match state.store.lock().await.partners_of(user) {
        Ok(partners) => partners,
        Err(e) => {
            warn!(user = %user.short(), error = %e, "partner lookup failed");
            return;
        }
    };

    let last_seen = state.presence.last_seen(user).await.unwrap_or_else(Utc::now);
    for partner in partners {
        let delivered = state
            .connections
            .send(
                partner,
                ServerEvent::PresenceChanged {
                    user_id: user,
                    online,
                    last_seen,
                },
            )
            .await;
        if delivered {
            debug!(
                user = %user.short(),
                partner = %partner.short(),
                online,
                "presence change broadcast"
            );
        }
    }
}
