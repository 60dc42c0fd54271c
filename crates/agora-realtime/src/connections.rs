//! Live connection registry.
//!
//! Maps each user to their active realtime session's outbound event channel.
//! Sessions are single-per-user: a newer connection replaces the older one
//! (last session wins). Pushing to a user is best-effort and reports a
//! tagged success/failure instead of raising, so delivery retry logic on
//! reconnect stays simple.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use agora_shared::protocol::ServerEvent;
use agora_shared::types::UserId;

/// Handle to one live client session.
struct ClientHandle {
    connection_id: Uuid,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

/// Injectable user -> live-session map.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    clients: Arc<RwLock<HashMap<UserId, ClientHandle>>>,
}

impl ConnectionRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user's live session, replacing any previous one (last
    /// session wins). Returns the connection id the session must present to
    /// unregister itself.
    pub async fn register(&self, user: UserId, tx: mpsc::UnboundedSender<ServerEvent>) -> Uuid {
        let connection_id = Uuid::new_v4();
        let previous = self.clients.write().await.insert(
            user,
            ClientHandle { connection_id, tx },
        );

        if previous.is_some() {
            debug!(user = %user.short(), "replaced existing session");
        }
        connection_id
    }

    /// Remove the user's session, but only if it is still the one identified
    /// by `connection_id`. A session that was already replaced by a newer
    /// one leaves the newer mapping untouched. Returns whether a removal
    /// happened.
    pub async fn unregister(&self, user: UserId, connection_id: Uuid) -> bool {
        let mut clients = self.clients.write().await;
        match clients.get(&user) {
            Some(handle) if handle.connection_id == connection_id => {
                clients.remove(&user);
                true
            }
            _ => false,
        }
    }

    /// Best-effort push. Returns `false` when the user has no live session
    /// or the session's channel already closed; a dead channel is evicted.
    pub async fn send(&self, user: UserId, event: ServerEvent) -> bool {
        let stale = {
            let clients = self.clients.read().await;
            match clients.get(&user) {
                Some(handle) => {
                    if handle.tx.send(event).is_ok() {
                        return true;
                    }
                    Some(handle.connection_id)
                }
                None => None,
            }
        };

        if let Some(connection_id) = stale {
            // Channel closed under us; drop the dead mapping.
            self.unregister(user, connection_id).await;
            debug!(user = %user.short(), "evicted dead session");
        }
        false
    }

    pub async fn is_connected(&self, user: UserId) -> bool {
        self.clients.read().await.contains_key(&user)
    }

    pub async fn connected_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId(Uuid::new_v4())
    }

    fn event() -> ServerEvent {
        ServerEvent::Error {
            message: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_send_unregister() {
        let registry = ConnectionRegistry::new();
        let u = user();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let connection_id = registry.register(u, tx).await;
        assert!(registry.is_connected(u).await);
        assert!(registry.send(u, event()).await);
        assert!(rx.recv().await.is_some());

        assert!(registry.unregister(u, connection_id).await);
        assert!(!registry.is_connected(u).await);
        assert!(!registry.send(u, event()).await);
    }

    #[tokio::test]
    async fn test_last_session_wins() {
        let registry = ConnectionRegistry::new();
        let u = user();

        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();

        let first = registry.register(u, tx1).await;
        let _second = registry.register(u, tx2).await;

        // The replaced session cannot tear down the newer one.
        assert!(!registry.unregister(u, first).await);
        assert!(registry.is_connected(u).await);

        assert!(registry.send(u, event()).await);
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_dead_channel_is_evicted() {
        let registry = ConnectionRegistry::new();
        let u = user();

        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(u, tx).await;
        drop(rx);

        assert!(!registry.send(u, event()).await);
        assert!(!registry.is_connected(u).await);
    }
}
