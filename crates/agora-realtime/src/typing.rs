//! Ephemeral "who is typing" state.
//!
//! Entries expire after a short TTL even without an explicit stop signal so
//! a crashed client never leaves a permanent typing ghost. Expiry is checked
//! lazily on every read and a periodic sweep evicts stale entries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use agora_shared::constants::TYPING_TTL_SECS;
use agora_shared::types::{ConversationId, UserId};

/// Per-conversation typing indicators with automatic expiry.
#[derive(Clone)]
pub struct TypingTracker {
    entries: Arc<Mutex<HashMap<(ConversationId, UserId), Instant>>>,
    ttl: Duration,
}

impl TypingTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Record that a user started or stopped typing in a conversation.
    pub async fn set_typing(&self, conversation: ConversationId, user: UserId, is_typing: bool) {
        let mut entries = self.entries.lock().await;
        if is_typing {
            entries.insert((conversation, user), Instant::now() + self.ttl);
        } else {
            entries.remove(&(conversation, user));
        }
    }

    /// Whether the user is currently typing. Expired entries are evicted on
    /// the way out. Transient UI state only, never correctness-critical.
    pub async fn is_typing(&self, conversation: ConversationId, user: UserId) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get(&(conversation, user)) {
            Some(expiry) if *expiry > Instant::now() => true,
            Some(_) => {
                entries.remove(&(conversation, user));
                false
            }
            None => false,
        }
    }

    /// Users currently typing in a conversation.
    pub async fn typing_in(&self, conversation: ConversationId) -> Vec<UserId> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, expiry| *expiry > now);
        entries
            .keys()
            .filter(|(c, _)| *c == conversation)
            .map(|(_, user)| *user)
            .collect()
    }

    /// Evict every expired entry; returns how many were removed. Driven by
    /// a background interval task in the server.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, expiry| *expiry > now);
        before - entries.len()
    }
}

impl Default for TypingTracker {
    fn default() -> Self {
        Self::new(Duration::from_secs(TYPING_TTL_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ids() -> (ConversationId, UserId) {
        (ConversationId::new(), UserId(Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_set_and_clear_typing() {
        let tracker = TypingTracker::default();
        let (conversation, user) = ids();

        assert!(!tracker.is_typing(conversation, user).await);

        tracker.set_typing(conversation, user, true).await;
        assert!(tracker.is_typing(conversation, user).await);
        assert_eq!(tracker.typing_in(conversation).await, vec![user]);

        tracker.set_typing(conversation, user, false).await;
        assert!(!tracker.is_typing(conversation, user).await);
    }

    #[tokio::test]
    async fn test_entries_expire_without_stop_signal() {
        // Zero TTL: entries are born expired.
        let tracker = TypingTracker::new(Duration::ZERO);
        let (conversation, user) = ids();

        tracker.set_typing(conversation, user, true).await;
        assert!(!tracker.is_typing(conversation, user).await);
        assert!(tracker.typing_in(conversation).await.is_empty());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let tracker = TypingTracker::new(Duration::ZERO);
        let (conversation, user) = ids();

        tracker.set_typing(conversation, user, true).await;
        assert_eq!(tracker.purge_expired().await, 1);
        assert_eq!(tracker.purge_expired().await, 0);
    }
}
