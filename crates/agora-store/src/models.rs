//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be mapped
//! straight into API responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agora_shared::protocol::MessagePayload;
use agora_shared::types::{ConversationId, DeliveryState, MessageId, UserId};

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// A two-party message thread. The participant pair is stored normalized
/// (`user_lo < user_hi`) so the schema can enforce pair uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    /// Unique conversation identifier.
    pub id: ConversationId,
    /// Lexically smaller participant.
    pub user_lo: UserId,
    /// Lexically larger participant.
    pub user_hi: UserId,
    /// When the conversation was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the latest message, used to order conversation lists.
    pub last_message_at: DateTime<Utc>,
    /// Soft "remove from UI" flag for `user_lo`.
    pub hidden_lo: bool,
    /// Soft "remove from UI" flag for `user_hi`.
    pub hidden_hi: bool,
    /// Soft-delete flag for `user_lo`; never affects `user_hi`'s view.
    pub deleted_lo: bool,
    /// Soft-delete flag for `user_hi`; never affects `user_lo`'s view.
    pub deleted_hi: bool,
}

impl Conversation {
    pub fn participants(&self) -> (UserId, UserId) {
        (self.user_lo, self.user_hi)
    }

    pub fn is_participant(&self, user: UserId) -> bool {
        user == self.user_lo || user == self.user_hi
    }

    /// The other participant, or `None` if `user` is not in the pair.
    pub fn other_participant(&self, user: UserId) -> Option<UserId> {
        if user == self.user_lo {
            Some(self.user_hi)
        } else if user == self.user_hi {
            Some(self.user_lo)
        } else {
            None
        }
    }

    pub fn hidden_for(&self, user: UserId) -> bool {
        (user == self.user_lo && self.hidden_lo) || (user == self.user_hi && self.hidden_hi)
    }

    pub fn deleted_for(&self, user: UserId) -> bool {
        (user == self.user_lo && self.deleted_lo) || (user == self.user_hi && self.deleted_hi)
    }
}

/// Normalize an unordered user pair into its stored `(lo, hi)` form.
pub fn normalize_pair(a: UserId, b: UserId) -> (UserId, UserId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single direct message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Monotonic ordering key assigned by the store on insert.
    pub seq: i64,
    /// Unique message identifier.
    pub id: MessageId,
    /// The conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// Sender; always one of the two conversation participants.
    pub sender_id: UserId,
    /// Plain text body.
    pub body: String,
    /// Delivery lifecycle level; advances monotonically.
    pub state: DeliveryState,
    /// When the message was persisted.
    pub created_at: DateTime<Utc>,
    /// When the recipient's client received it, once reached.
    pub delivered_at: Option<DateTime<Utc>>,
    /// When the recipient viewed it, once reached.
    pub read_at: Option<DateTime<Utc>>,
    /// Whether the body has been edited after sending.
    pub edited: bool,
    /// When the last edit happened.
    pub edited_at: Option<DateTime<Utc>>,
    /// Soft-delete flag; deleted messages are excluded from pagination and
    /// unread counts.
    pub deleted: bool,
}

impl From<&Message> for MessagePayload {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            body: message.body.clone(),
            state: message.state,
            created_at: message.created_at,
            edited: message.edited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_normalize_pair_is_order_independent() {
        let a = UserId(Uuid::new_v4());
        let b = UserId(Uuid::new_v4());
        assert_eq!(normalize_pair(a, b), normalize_pair(b, a));
        let (lo, hi) = normalize_pair(a, b);
        assert!(lo <= hi);
    }
}
