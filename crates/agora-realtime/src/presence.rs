//! Presence tracking.
//!
//! Maintains an in-memory map of which users currently hold a live
//! connection. Presence is deliberately not tied to message durability:
//! a restart drops it and clients re-announce on reconnect.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use agora_shared::types::UserId;

/// Online flag plus the last moment the user was seen transitioning.
#[derive(Debug, Clone)]
pub struct PresenceRecord {
    pub online: bool,
    pub last_seen: DateTime<Utc>,
}

/// Tracks which users are currently reachable.
#[derive(Clone, Default)]
pub struct PresenceRegistry {
    records: Arc<RwLock<HashMap<UserId, PresenceRecord>>>,
}

impl PresenceRegistry {
    /// Create a new, empty presence registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user coming online. Idempotent; returns `true` only when
    /// this call actually flipped the state, so the caller knows whether to
    /// broadcast a presence-changed event.
    pub async fn set_online(&self, user: UserId) -> bool {
        let mut records = self.records.write().await;
        let record = records.entry(user).or_insert(PresenceRecord {
            online: false,
            last_seen: Utc::now(),
        });

        let changed = !record.online;
        record.online = true;
        record.last_seen = Utc::now();

        if changed {
            debug!(user = %user.short(), "user online");
        }
        changed
    }

    /// Record a user going offline. Idempotent; returns `true` only on an
    /// actual transition.
    pub async fn set_offline(&self, user: UserId) -> bool {
        let mut records = self.records.write().await;
        match records.get_mut(&user) {
            Some(record) if record.online => {
                record.online = false;
                record.last_seen = Utc::now();
                debug!(user = %user.short(), "user offline");
                true
            }
            _ => false,
        }
    }

    pub async fn is_online(&self, user: UserId) -> bool {
        self.records
            .read()
            .await
            .get(&user)
            .map(|record| record.online)
            .unwrap_or(false)
    }

    /// Last transition timestamp, if the user was ever seen.
    pub async fn last_seen(&self, user: UserId) -> Option<DateTime<Utc>> {
        self.records
            .read()
            .await
            .get(&user)
            .map(|record| record.last_seen)
    }

    pub async fn online_count(&self) -> usize {
        self.records
            .read()
            .await
            .values()
            .filter(|record| record.online)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user() -> UserId {
        UserId(Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_online_offline_transitions() {
        let registry = PresenceRegistry::new();
        let u = user();

        assert!(!registry.is_online(u).await);

        assert!(registry.set_online(u).await);
        assert!(!registry.set_online(u).await); // idempotent
        assert!(registry.is_online(u).await);
        assert_eq!(registry.online_count().await, 1);

        assert!(registry.set_offline(u).await);
        assert!(!registry.set_offline(u).await); // idempotent
        assert!(!registry.is_online(u).await);
        assert!(registry.last_seen(u).await.is_some());
    }

    #[tokio::test]
    async fn test_offline_for_unknown_user_is_noop() {
        let registry = PresenceRegistry::new();
        assert!(!registry.set_offline(user()).await);
    }
}
