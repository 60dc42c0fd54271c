//! Operations on [`Conversation`] records.
//!
//! The unordered participant pair is the identity of a conversation: the
//! schema's unique index on `(user_lo, user_hi)` guarantees at most one row
//! per pair even when both participants race to start one, and
//! [`Database::start_or_get`] retries on that conflict instead of
//! check-then-insert.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use agora_shared::types::{ConversationId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{normalize_pair, Conversation};

const CONVERSATION_COLUMNS: &str = "id, user_lo, user_hi, created_at, last_message_at, \
     hidden_lo, hidden_hi, deleted_lo, deleted_hi";

impl Database {
    // ------------------------------------------------------------------
    // Start-or-get
    // ------------------------------------------------------------------

    /// Return the conversation between `requester` and `other`, creating it
    /// if the pair has none yet.
    ///
    /// Idempotent: repeated calls return the same row. A conversation the
    /// requester had hidden or soft-deleted is revived by the new intent.
    /// Safe under concurrent calls from both participants: the loser of the
    /// insert race falls back to the winner's row.
    pub fn start_or_get(&mut self, requester: UserId, other: UserId) -> Result<Conversation> {
        if requester == other {
            return Err(StoreError::InvalidArgument(
                "cannot start a conversation with yourself".to_string(),
            ));
        }

        let (lo, hi) = normalize_pair(requester, other);

        // Two attempts: if our insert loses the uniqueness race, the second
        // lookup must find the winner's row.
        for _ in 0..2 {
            if let Some(existing) = self.find_by_pair(lo, hi)? {
                return self.revive_for(existing, requester);
            }

            let now = Utc::now();
            let conversation = Conversation {
                id: ConversationId::new(),
                user_lo: lo,
                user_hi: hi,
                created_at: now,
                last_message_at: now,
                hidden_lo: false,
                hidden_hi: false,
                deleted_lo: false,
                deleted_hi: false,
            };

            let inserted = self.conn().execute(
                "INSERT INTO conversations
                     (id, user_lo, user_hi, created_at, last_message_at,
                      hidden_lo, hidden_hi, deleted_lo, deleted_hi)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, 0, 0)",
                params![
                    conversation.id.to_string(),
                    conversation.user_lo.to_string(),
                    conversation.user_hi.to_string(),
                    conversation.created_at.to_rfc3339(),
                    conversation.last_message_at.to_rfc3339(),
                ],
            );

            match inserted {
                Ok(_) => {
                    tracing::debug!(
                        conversation = %conversation.id,
                        user_lo = %lo.short(),
                        user_hi = %hi.short(),
                        "created conversation"
                    );
                    return Ok(conversation);
                }
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    // Lost the race against the other participant; retry the
                    // lookup.
                    continue;
                }
                Err(err) => return Err(StoreError::Sqlite(err)),
            }
        }

        // Unreachable in practice: a constraint violation implies the row
        // exists on re-lookup.
        Err(StoreError::NotFound)
    }

    /// Clear the requester's hidden/deleted flags on an existing row.
    fn revive_for(&self, conversation: Conversation, requester: UserId) -> Result<Conversation> {
        if !conversation.hidden_for(requester) && !conversation.deleted_for(requester) {
            return Ok(conversation);
        }

        let (hidden_col, deleted_col) = if requester == conversation.user_lo {
            ("hidden_lo", "deleted_lo")
        } else {
            ("hidden_hi", "deleted_hi")
        };

        self.conn().execute(
            &format!("UPDATE conversations SET {hidden_col} = 0, {deleted_col} = 0 WHERE id = ?1"),
            params![conversation.id.to_string()],
        )?;

        self.get_conversation_raw(conversation.id)
    }

    fn find_by_pair(&self, lo: UserId, hi: UserId) -> Result<Option<Conversation>> {
        let result = self.conn().query_row(
            &format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE user_lo = ?1 AND user_hi = ?2"
            ),
            params![lo.to_string(), hi.to_string()],
            row_to_conversation,
        );

        match result {
            Ok(conversation) => Ok(Some(conversation)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(other) => Err(StoreError::Sqlite(other)),
        }
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a conversation row with no authorization or visibility checks.
    ///
    /// Internal plumbing for the delivery path; API-facing callers go
    /// through [`Database::get_conversation`].
    pub fn get_conversation_raw(&self, id: ConversationId) -> Result<Conversation> {
        self.conn()
            .query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
                params![id.to_string()],
                row_to_conversation,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Fetch a conversation on behalf of a participant.
    ///
    /// Fails with `NotAuthorized` if the requester is not a participant and
    /// `NotFound` if the requester has soft-deleted it.
    pub fn get_conversation(
        &self,
        id: ConversationId,
        requester: UserId,
    ) -> Result<Conversation> {
        let conversation = self.get_conversation_raw(id)?;

        if !conversation.is_participant(requester) {
            return Err(StoreError::NotAuthorized);
        }
        if conversation.deleted_for(requester) {
            return Err(StoreError::NotFound);
        }

        Ok(conversation)
    }

    /// List the requester's visible conversations, most recent activity
    /// first. Hidden and soft-deleted conversations are excluded; hidden
    /// ones reappear automatically once new activity clears the flag.
    pub fn list_conversations(&self, user: UserId) -> Result<Vec<Conversation>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE (user_lo = ?1 AND deleted_lo = 0 AND hidden_lo = 0)
                OR (user_hi = ?1 AND deleted_hi = 0 AND hidden_hi = 0)
             ORDER BY last_message_at DESC"
        ))?;

        let rows = stmt.query_map(params![user.to_string()], row_to_conversation)?;

        let mut conversations = Vec::new();
        for row in rows {
            conversations.push(row?);
        }
        Ok(conversations)
    }

    /// All users sharing a conversation with `user`, used to target
    /// presence-changed broadcasts.
    pub fn partners_of(&self, user: UserId) -> Result<Vec<UserId>> {
        let mut stmt = self.conn().prepare(
            "SELECT user_lo, user_hi FROM conversations
             WHERE user_lo = ?1 OR user_hi = ?1",
        )?;

        let user_str = user.to_string();
        let rows = stmt.query_map(params![user_str], |row| {
            let lo: String = row.get(0)?;
            let hi: String = row.get(1)?;
            Ok((lo, hi))
        })?;

        let mut partners = Vec::new();
        for row in rows {
            let (lo, hi) = row?;
            let partner = if lo == user_str { hi } else { lo };
            partners.push(UserId(Uuid::parse_str(&partner).map_err(|e| {
                StoreError::InvalidArgument(format!("corrupt user id in store: {e}"))
            })?));
        }
        Ok(partners)
    }

    // ------------------------------------------------------------------
    // Per-participant flags
    // ------------------------------------------------------------------

    /// Hide the conversation from the requester's list without touching
    /// history. New activity makes it visible again.
    pub fn hide_conversation(&self, id: ConversationId, requester: UserId) -> Result<()> {
        let conversation = self.get_conversation(id, requester)?;
        self.set_flag(&conversation, requester, "hidden", true)
    }

    /// Soft-delete the conversation for the requester only. The other
    /// participant keeps their full view of the history.
    pub fn soft_delete_conversation(&self, id: ConversationId, requester: UserId) -> Result<()> {
        let conversation = self.get_conversation(id, requester)?;
        self.set_flag(&conversation, requester, "deleted", true)
    }

    fn set_flag(
        &self,
        conversation: &Conversation,
        user: UserId,
        flag: &str,
        value: bool,
    ) -> Result<()> {
        let side = if user == conversation.user_lo {
            "lo"
        } else {
            "hi"
        };

        self.conn().execute(
            &format!("UPDATE conversations SET {flag}_{side} = ?1 WHERE id = ?2"),
            params![value as i64, conversation.id.to_string()],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Conversation`].
fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let id_str: String = row.get(0)?;
    let lo_str: String = row.get(1)?;
    let hi_str: String = row.get(2)?;
    let created_str: String = row.get(3)?;
    let last_str: String = row.get(4)?;
    let hidden_lo: bool = row.get(5)?;
    let hidden_hi: bool = row.get(6)?;
    let deleted_lo: bool = row.get(7)?;
    let deleted_hi: bool = row.get(8)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let user_lo = Uuid::parse_str(&lo_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let user_hi = Uuid::parse_str(&hi_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
    let last_message_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&last_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Conversation {
        id: ConversationId(id),
        user_lo: UserId(user_lo),
        user_hi: UserId(user_hi),
        created_at,
        last_message_at,
        hidden_lo,
        hidden_hi,
        deleted_lo,
        deleted_hi,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn user() -> UserId {
        UserId(Uuid::new_v4())
    }

    #[test]
    fn test_start_or_get_rejects_self() {
        let (_dir, mut db) = open_test_db();
        let a = user();

        let err = db.start_or_get(a, a).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_start_or_get_idempotent_both_orders() {
        let (_dir, mut db) = open_test_db();
        let (a, b) = (user(), user());

        let first = db.start_or_get(a, b).unwrap();
        let second = db.start_or_get(a, b).unwrap();
        let reversed = db.start_or_get(b, a).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.id, reversed.id);
    }

    #[test]
    fn test_get_requires_participant() {
        let (_dir, mut db) = open_test_db();
        let (a, b, stranger) = (user(), user(), user());

        let conversation = db.start_or_get(a, b).unwrap();

        assert!(matches!(
            db.get_conversation(conversation.id, stranger),
            Err(StoreError::NotAuthorized)
        ));
        assert!(db.get_conversation(conversation.id, a).is_ok());
        assert!(db.get_conversation(conversation.id, b).is_ok());
    }

    #[test]
    fn test_hide_excludes_from_list_until_revived() {
        let (_dir, mut db) = open_test_db();
        let (a, b) = (user(), user());

        let conversation = db.start_or_get(a, b).unwrap();
        db.hide_conversation(conversation.id, a).unwrap();

        assert!(db.list_conversations(a).unwrap().is_empty());
        // The other participant's list is unaffected.
        assert_eq!(db.list_conversations(b).unwrap().len(), 1);

        // A new start intent from the hider revives it.
        db.start_or_get(a, b).unwrap();
        assert_eq!(db.list_conversations(a).unwrap().len(), 1);
    }

    #[test]
    fn test_soft_delete_is_per_participant() {
        let (_dir, mut db) = open_test_db();
        let (a, b) = (user(), user());

        let conversation = db.start_or_get(a, b).unwrap();
        db.soft_delete_conversation(conversation.id, a).unwrap();

        assert!(matches!(
            db.get_conversation(conversation.id, a),
            Err(StoreError::NotFound)
        ));
        assert!(db.get_conversation(conversation.id, b).is_ok());
        assert!(db.list_conversations(a).unwrap().is_empty());
        assert_eq!(db.list_conversations(b).unwrap().len(), 1);
    }

    #[test]
    fn test_insert_race_falls_back_to_existing_row() {
        let (_dir, mut db) = open_test_db();
        let (a, b) = (user(), user());
        let (lo, hi) = normalize_pair(a, b);

        // Simulate the other participant winning the insert race by seeding
        // the pair row directly.
        db.conn()
            .execute(
                "INSERT INTO conversations
                     (id, user_lo, user_hi, created_at, last_message_at,
                      hidden_lo, hidden_hi, deleted_lo, deleted_hi)
                 VALUES (?1, ?2, ?3, ?4, ?4, 0, 0, 0, 0)",
                params![
                    ConversationId::new().to_string(),
                    lo.to_string(),
                    hi.to_string(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .unwrap();

        let found = db.start_or_get(a, b).unwrap();
        assert_eq!((found.user_lo, found.user_hi), (lo, hi));

        // Still exactly one row for the pair.
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_partners_of() {
        let (_dir, mut db) = open_test_db();
        let (a, b, c) = (user(), user(), user());

        db.start_or_get(a, b).unwrap();
        db.start_or_get(a, c).unwrap();

        let partners = db.partners_of(a).unwrap();
        assert_eq!(partners.len(), 2);
        assert!(partners.contains(&b));
        assert!(partners.contains(&c));
    }
}
