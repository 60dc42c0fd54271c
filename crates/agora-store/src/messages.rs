//! Operations on [`Message`] records and their delivery-state machine.
//!
//! Pagination is **newest-first** (descending `seq`); page 0 holds the most
//! recent messages. Delivery-state transitions are conditional updates that
//! only ever advance `sent -> delivered -> read`, so concurrent markers can
//! race freely without regressing state.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use agora_shared::constants::{MAX_MESSAGE_CHARS, MAX_PAGE_SIZE};
use agora_shared::types::{ConversationId, DeliveryState, MessageId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Message;

const MESSAGE_COLUMNS: &str = "seq, id, conversation_id, sender_id, body, state, \
     created_at, delivered_at, read_at, edited, edited_at, deleted";

impl Database {
    // ------------------------------------------------------------------
    // Send
    // ------------------------------------------------------------------

    /// Persist a new message at state `sent`.
    ///
    /// This is the durability boundary: once this returns the message
    /// survives a crash of the delivery path. The same transaction bumps
    /// the conversation's activity timestamp and clears both participants'
    /// hidden/deleted flags so the thread resurfaces.
    pub fn send_message(
        &mut self,
        conversation_id: ConversationId,
        sender: UserId,
        body: &str,
    ) -> Result<Message> {
        validate_body(body)?;

        let conversation = self.get_conversation_raw(conversation_id)?;
        if !conversation.is_participant(sender) {
            return Err(StoreError::NotAuthorized);
        }

        let id = MessageId::new();
        let now = Utc::now();

        let tx = self.conn_mut().transaction()?;

        tx.execute(
            "INSERT INTO messages (id, conversation_id, sender_id, body, state, created_at)
             VALUES (?1, ?2, ?3, ?4, 'sent', ?5)",
            params![
                id.to_string(),
                conversation_id.to_string(),
                sender.to_string(),
                body,
                now.to_rfc3339(),
            ],
        )?;
        let seq = tx.last_insert_rowid();

        tx.execute(
            "UPDATE conversations
             SET last_message_at = ?1,
                 hidden_lo = 0, hidden_hi = 0,
                 deleted_lo = 0, deleted_hi = 0
             WHERE id = ?2",
            params![now.to_rfc3339(), conversation_id.to_string()],
        )?;

        tx.commit()?;

        tracing::debug!(
            message = %id,
            conversation = %conversation_id,
            sender = %sender.short(),
            seq,
            "message persisted"
        );

        Ok(Message {
            seq,
            id,
            conversation_id,
            sender_id: sender,
            body: body.to_string(),
            state: DeliveryState::Sent,
            created_at: now,
            delivered_at: None,
            read_at: None,
            edited: false,
            edited_at: None,
            deleted: false,
        })
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single message by id, soft-deleted rows included; callers
    /// apply their own visibility rules.
    pub fn get_message(&self, id: MessageId) -> Result<Message> {
        self.conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id.to_string()],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Page through a conversation's non-deleted messages, newest first.
    pub fn page_messages(
        &self,
        conversation_id: ConversationId,
        requester: UserId,
        page_index: u32,
        page_size: u32,
    ) -> Result<Vec<Message>> {
        if page_size == 0 {
            return Err(StoreError::InvalidArgument(
                "page size must be positive".to_string(),
            ));
        }
        let page_size = page_size.min(MAX_PAGE_SIZE);

        self.get_conversation(conversation_id, requester)?;

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_id = ?1 AND deleted = 0
             ORDER BY seq DESC
             LIMIT ?2 OFFSET ?3"
        ))?;

        let offset = i64::from(page_index) * i64::from(page_size);
        let rows = stmt.query_map(
            params![conversation_id.to_string(), page_size, offset],
            row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    // ------------------------------------------------------------------
    // Delivery-state machine
    // ------------------------------------------------------------------

    /// Advance `sent -> delivered`. Returns whether the transition fired;
    /// re-marking a delivered or read message is a no-op.
    pub fn mark_delivered(&self, message_id: MessageId) -> Result<bool> {
        let now = Utc::now();
        let affected = self.conn().execute(
            "UPDATE messages SET state = 'delivered', delivered_at = ?2
             WHERE id = ?1 AND state = 'sent' AND deleted = 0",
            params![message_id.to_string(), now.to_rfc3339()],
        )?;

        if affected > 0 {
            Ok(true)
        } else {
            // Distinguish idempotent no-op from a bad id.
            self.get_message(message_id)?;
            Ok(false)
        }
    }

    /// Advance a message to `read` on behalf of its recipient.
    ///
    /// Only the recipient advances this level: the sender calling it is a
    /// no-op, a non-participant gets `NotAuthorized`. A skipped `delivered`
    /// timestamp is backfilled so `read` always implies `delivered`.
    pub fn mark_read(&self, message_id: MessageId, reader: UserId) -> Result<bool> {
        let message = self.get_message(message_id)?;
        let conversation = self.get_conversation_raw(message.conversation_id)?;

        if !conversation.is_participant(reader) {
            return Err(StoreError::NotAuthorized);
        }
        if reader == message.sender_id {
            return Ok(false);
        }

        let now = Utc::now();
        let affected = self.conn().execute(
            "UPDATE messages
             SET state = 'read', read_at = ?2,
                 delivered_at = COALESCE(delivered_at, ?2)
             WHERE id = ?1 AND state <> 'read' AND deleted = 0",
            params![message_id.to_string(), now.to_rfc3339()],
        )?;

        Ok(affected > 0)
    }

    /// Mark every not-yet-read message addressed to `reader` in the
    /// conversation. Returns the affected message ids, oldest first, for
    /// read-receipt fan-out.
    pub fn mark_all_read(
        &mut self,
        conversation_id: ConversationId,
        reader: UserId,
    ) -> Result<Vec<MessageId>> {
        self.get_conversation(conversation_id, reader)?;

        let now = Utc::now();
        let tx = self.conn_mut().transaction()?;

        let ids = {
            let mut stmt = tx.prepare(
                "SELECT id FROM messages
                 WHERE conversation_id = ?1 AND sender_id <> ?2
                   AND state <> 'read' AND deleted = 0
                 ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map(
                params![conversation_id.to_string(), reader.to_string()],
                |row| row.get::<_, String>(0),
            )?;

            let mut ids = Vec::new();
            for row in rows {
                ids.push(MessageId(Uuid::parse_str(&row?).map_err(|e| {
                    StoreError::InvalidArgument(format!("corrupt message id in store: {e}"))
                })?));
            }
            ids
        };

        tx.execute(
            "UPDATE messages
             SET state = 'read', read_at = ?3,
                 delivered_at = COALESCE(delivered_at, ?3)
             WHERE conversation_id = ?1 AND sender_id <> ?2
               AND state <> 'read' AND deleted = 0",
            params![
                conversation_id.to_string(),
                reader.to_string(),
                now.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(ids)
    }

    /// Batch-advance every `sent` message addressed to `user` across all
    /// their conversations. Used by the delivery coordinator on (re)connect;
    /// returns the affected messages, oldest first, already at `delivered`.
    pub fn mark_all_undelivered_delivered(&mut self, user: UserId) -> Result<Vec<Message>> {
        let now = Utc::now();
        let tx = self.conn_mut().transaction()?;

        let mut pending = {
            let mut stmt = tx.prepare(
                "SELECT m.seq, m.id, m.conversation_id, m.sender_id, m.body, m.state,
                        m.created_at, m.delivered_at, m.read_at, m.edited, m.edited_at, m.deleted
                 FROM messages m
                 JOIN conversations c ON m.conversation_id = c.id
                 WHERE m.state = 'sent' AND m.deleted = 0 AND m.sender_id <> ?1
                   AND (c.user_lo = ?1 OR c.user_hi = ?1)
                 ORDER BY m.seq ASC",
            )?;
            let rows = stmt.query_map(params![user.to_string()], row_to_message)?;

            let mut pending = Vec::new();
            for row in rows {
                pending.push(row?);
            }
            pending
        };

        tx.execute(
            "UPDATE messages SET state = 'delivered', delivered_at = ?2
             WHERE state = 'sent' AND deleted = 0 AND sender_id <> ?1
               AND conversation_id IN
                   (SELECT id FROM conversations WHERE user_lo = ?1 OR user_hi = ?1)",
            params![user.to_string(), now.to_rfc3339()],
        )?;

        tx.commit()?;

        for message in &mut pending {
            message.state = DeliveryState::Delivered;
            message.delivered_at = Some(now);
        }
        Ok(pending)
    }

    // ------------------------------------------------------------------
    // Edit / delete
    // ------------------------------------------------------------------

    /// Replace the body of the requester's own message and flag it edited.
    pub fn edit_message(
        &self,
        message_id: MessageId,
        requester: UserId,
        new_body: &str,
    ) -> Result<Message> {
        validate_body(new_body)?;

        let mut message = self.get_message(message_id)?;
        if message.deleted {
            return Err(StoreError::NotFound);
        }
        if message.sender_id != requester {
            return Err(StoreError::NotAuthorized);
        }

        let now = Utc::now();
        self.conn().execute(
            "UPDATE messages SET body = ?2, edited = 1, edited_at = ?3 WHERE id = ?1",
            params![message_id.to_string(), new_body, now.to_rfc3339()],
        )?;

        message.body = new_body.to_string();
        message.edited = true;
        message.edited_at = Some(now);
        Ok(message)
    }

    /// Soft-delete the requester's own message. Idempotent; the row stays
    /// for the schema but leaves pagination and unread counts.
    pub fn soft_delete_message(&self, message_id: MessageId, requester: UserId) -> Result<()> {
        let message = self.get_message(message_id)?;
        if message.sender_id != requester {
            return Err(StoreError::NotAuthorized);
        }

        self.conn().execute(
            "UPDATE messages SET deleted = 1 WHERE id = ?1",
            params![message_id.to_string()],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Unread counts
    // ------------------------------------------------------------------

    /// Unread (not yet `read`) messages addressed to `user` in one
    /// conversation.
    pub fn unread_count(&self, conversation_id: ConversationId, user: UserId) -> Result<u64> {
        let conversation = self.get_conversation_raw(conversation_id)?;
        if !conversation.is_participant(user) {
            return Err(StoreError::NotAuthorized);
        }

        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages
             WHERE conversation_id = ?1 AND sender_id <> ?2
               AND state <> 'read' AND deleted = 0",
            params![conversation_id.to_string(), user.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Total unread messages addressed to `user` across all conversations
    /// they have not soft-deleted.
    pub fn unread_total(&self, user: UserId) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages m
             JOIN conversations c ON m.conversation_id = c.id
             WHERE m.sender_id <> ?1 AND m.state <> 'read' AND m.deleted = 0
               AND ((c.user_lo = ?1 AND c.deleted_lo = 0)
                 OR (c.user_hi = ?1 AND c.deleted_hi = 0))",
            params![user.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Per-conversation unread counts for `user`, skipping conversations
    /// with nothing unread.
    pub fn unread_by_conversation(&self, user: UserId) -> Result<Vec<(ConversationId, u64)>> {
        let mut stmt = self.conn().prepare(
            "SELECT m.conversation_id, COUNT(*) FROM messages m
             JOIN conversations c ON m.conversation_id = c.id
             WHERE m.sender_id <> ?1 AND m.state <> 'read' AND m.deleted = 0
               AND ((c.user_lo = ?1 AND c.deleted_lo = 0)
                 OR (c.user_hi = ?1 AND c.deleted_hi = 0))
             GROUP BY m.conversation_id",
        )?;

        let rows = stmt.query_map(params![user.to_string()], |row| {
            let id: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((id, count))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (id, count) = row?;
            let id = ConversationId(Uuid::parse_str(&id).map_err(|e| {
                StoreError::InvalidArgument(format!("corrupt conversation id in store: {e}"))
            })?);
            counts.push((id, count as u64));
        }
        Ok(counts)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_body(body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Err(StoreError::InvalidArgument(
            "message body is blank".to_string(),
        ));
    }
    let chars = body.chars().count();
    if chars > MAX_MESSAGE_CHARS {
        return Err(StoreError::InvalidArgument(format!(
            "message body too long: {chars} chars (max {MAX_MESSAGE_CHARS})"
        )));
    }
    Ok(())
}

/// Map a `rusqlite::Row` to a [`Message`].
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let seq: i64 = row.get(0)?;
    let id_str: String = row.get(1)?;
    let conversation_str: String = row.get(2)?;
    let sender_str: String = row.get(3)?;
    let body: String = row.get(4)?;
    let state_str: String = row.get(5)?;
    let created_str: String = row.get(6)?;
    let delivered_str: Option<String> = row.get(7)?;
    let read_str: Option<String> = row.get(8)?;
    let edited: bool = row.get(9)?;
    let edited_str: Option<String> = row.get(10)?;
    let deleted: bool = row.get(11)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let conversation_id = Uuid::parse_str(&conversation_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let sender_id = Uuid::parse_str(&sender_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let state = DeliveryState::from_str(&state_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown delivery state: {state_str}").into(),
        )
    })?;

    let created_at = parse_ts(6, &created_str)?;
    let delivered_at = delivered_str.as_deref().map(|s| parse_ts(7, s)).transpose()?;
    let read_at = read_str.as_deref().map(|s| parse_ts(8, s)).transpose()?;
    let edited_at = edited_str.as_deref().map(|s| parse_ts(10, s)).transpose()?;

    Ok(Message {
        seq,
        id: MessageId(id),
        conversation_id: ConversationId(conversation_id),
        sender_id: UserId(sender_id),
        body,
        state,
        created_at,
        delivered_at,
        read_at,
        edited,
        edited_at,
        deleted,
    })
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Conversation;

    fn open_test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn user() -> UserId {
        UserId(Uuid::new_v4())
    }

    fn conversation(db: &mut Database) -> (Conversation, UserId, UserId) {
        let (a, b) = (user(), user());
        let conversation = db.start_or_get(a, b).unwrap();
        (conversation, a, b)
    }

    #[test]
    fn test_send_validates_body() {
        let (_dir, mut db) = open_test_db();
        let (conv, a, _b) = conversation(&mut db);

        assert!(matches!(
            db.send_message(conv.id, a, "   "),
            Err(StoreError::InvalidArgument(_))
        ));

        let long = "x".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(matches!(
            db.send_message(conv.id, a, &long),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_send_requires_participant() {
        let (_dir, mut db) = open_test_db();
        let (conv, _a, _b) = conversation(&mut db);

        assert!(matches!(
            db.send_message(conv.id, user(), "hi"),
            Err(StoreError::NotAuthorized)
        ));
    }

    #[test]
    fn test_send_assigns_increasing_seq() {
        let (_dir, mut db) = open_test_db();
        let (conv, a, b) = conversation(&mut db);

        let m1 = db.send_message(conv.id, a, "one").unwrap();
        let m2 = db.send_message(conv.id, b, "two").unwrap();
        let m3 = db.send_message(conv.id, a, "three").unwrap();

        assert!(m1.seq < m2.seq);
        assert!(m2.seq < m3.seq);
    }

    #[test]
    fn test_page_newest_first() {
        let (_dir, mut db) = open_test_db();
        let (conv, a, b) = conversation(&mut db);

        for i in 0..5 {
            db.send_message(conv.id, a, &format!("msg {i}")).unwrap();
        }

        let page0 = db.page_messages(conv.id, b, 0, 2).unwrap();
        assert_eq!(page0.len(), 2);
        assert_eq!(page0[0].body, "msg 4");
        assert_eq!(page0[1].body, "msg 3");

        let page2 = db.page_messages(conv.id, b, 2, 2).unwrap();
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].body, "msg 0");

        assert!(matches!(
            db.page_messages(conv.id, user(), 0, 10),
            Err(StoreError::NotAuthorized)
        ));
    }

    #[test]
    fn test_delivery_state_never_regresses() {
        let (_dir, mut db) = open_test_db();
        let (conv, a, b) = conversation(&mut db);

        let message = db.send_message(conv.id, a, "hi").unwrap();

        assert!(db.mark_delivered(message.id).unwrap());
        assert!(!db.mark_delivered(message.id).unwrap()); // idempotent

        assert!(db.mark_read(message.id, b).unwrap());
        assert!(!db.mark_read(message.id, b).unwrap()); // idempotent

        // A late mark_delivered must not regress read.
        assert!(!db.mark_delivered(message.id).unwrap());
        let stored = db.get_message(message.id).unwrap();
        assert_eq!(stored.state, DeliveryState::Read);
        assert!(stored.delivered_at.is_some());
        assert!(stored.read_at.is_some());
    }

    #[test]
    fn test_mark_read_skipping_delivered_backfills() {
        let (_dir, mut db) = open_test_db();
        let (conv, a, b) = conversation(&mut db);

        let message = db.send_message(conv.id, a, "hi").unwrap();

        // Read straight from sent: delivered_at is backfilled.
        assert!(db.mark_read(message.id, b).unwrap());
        let stored = db.get_message(message.id).unwrap();
        assert_eq!(stored.state, DeliveryState::Read);
        assert!(stored.delivered_at.is_some());
    }

    #[test]
    fn test_mark_read_authorization() {
        let (_dir, mut db) = open_test_db();
        let (conv, a, _b) = conversation(&mut db);

        let message = db.send_message(conv.id, a, "hi").unwrap();

        // Sender marking their own message is a no-op, not an error.
        assert!(!db.mark_read(message.id, a).unwrap());
        assert_eq!(
            db.get_message(message.id).unwrap().state,
            DeliveryState::Sent
        );

        assert!(matches!(
            db.mark_read(message.id, user()),
            Err(StoreError::NotAuthorized)
        ));
    }

    #[test]
    fn test_mark_all_read_and_unread_counts() {
        let (_dir, mut db) = open_test_db();
        let (conv, a, b) = conversation(&mut db);

        for i in 0..3 {
            db.send_message(conv.id, a, &format!("msg {i}")).unwrap();
        }
        db.send_message(conv.id, b, "reply").unwrap();

        assert_eq!(db.unread_count(conv.id, b).unwrap(), 3);
        assert_eq!(db.unread_count(conv.id, a).unwrap(), 1);

        let marked = db.mark_all_read(conv.id, b).unwrap();
        assert_eq!(marked.len(), 3);

        assert_eq!(db.unread_count(conv.id, b).unwrap(), 0);
        // A's unread count is unaffected by B's bulk read.
        assert_eq!(db.unread_count(conv.id, a).unwrap(), 1);
        assert_eq!(db.unread_total(b).unwrap(), 0);
        assert_eq!(db.unread_total(a).unwrap(), 1);

        // Second bulk call is a no-op.
        assert!(db.mark_all_read(conv.id, b).unwrap().is_empty());
    }

    #[test]
    fn test_unread_by_conversation() {
        let (_dir, mut db) = open_test_db();
        let (a, b, c) = (user(), user(), user());
        let conv_ab = db.start_or_get(a, b).unwrap();
        let conv_ac = db.start_or_get(a, c).unwrap();

        db.send_message(conv_ab.id, b, "from b").unwrap();
        db.send_message(conv_ac.id, c, "from c").unwrap();
        db.send_message(conv_ac.id, c, "again").unwrap();

        let mut counts = db.unread_by_conversation(a).unwrap();
        counts.sort_by_key(|(_, n)| *n);
        assert_eq!(counts, vec![(conv_ab.id, 1), (conv_ac.id, 2)]);
        assert_eq!(db.unread_total(a).unwrap(), 3);
    }

    #[test]
    fn test_mark_all_undelivered_delivered() {
        let (_dir, mut db) = open_test_db();
        let (a, b, c) = (user(), user(), user());
        let conv_ab = db.start_or_get(a, b).unwrap();
        let conv_cb = db.start_or_get(c, b).unwrap();

        db.send_message(conv_ab.id, a, "one").unwrap();
        db.send_message(conv_cb.id, c, "two").unwrap();
        let own = db.send_message(conv_ab.id, b, "mine").unwrap();

        let flushed = db.mark_all_undelivered_delivered(b).unwrap();
        assert_eq!(flushed.len(), 2);
        assert!(flushed.iter().all(|m| m.state == DeliveryState::Delivered));
        assert!(flushed.iter().all(|m| m.id != own.id));

        // Nothing left on a second flush.
        assert!(db.mark_all_undelivered_delivered(b).unwrap().is_empty());

        // B's own outbound message stays at sent.
        assert_eq!(db.get_message(own.id).unwrap().state, DeliveryState::Sent);
    }

    #[test]
    fn test_edit_and_soft_delete_scenario() {
        let (_dir, mut db) = open_test_db();
        let (conv, a, b) = conversation(&mut db);

        let message = db.send_message(conv.id, a, "origial").unwrap();

        // Only the sender may edit.
        assert!(matches!(
            db.edit_message(message.id, b, "hijacked"),
            Err(StoreError::NotAuthorized)
        ));

        let edited = db.edit_message(message.id, a, "original").unwrap();
        assert!(edited.edited);
        assert_eq!(edited.body, "original");
        assert!(matches!(
            db.edit_message(message.id, a, ""),
            Err(StoreError::InvalidArgument(_))
        ));

        // Only the sender may delete.
        assert!(matches!(
            db.soft_delete_message(message.id, b),
            Err(StoreError::NotAuthorized)
        ));
        db.soft_delete_message(message.id, a).unwrap();

        // Gone from B's pagination and counts.
        assert!(db.page_messages(conv.id, b, 0, 10).unwrap().is_empty());
        assert_eq!(db.unread_count(conv.id, b).unwrap(), 0);

        // Editing a deleted message reports NotFound.
        assert!(matches!(
            db.edit_message(message.id, a, "again"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_soft_deleted_conversation_still_pages_for_other() {
        let (_dir, mut db) = open_test_db();
        let (conv, a, b) = conversation(&mut db);

        db.send_message(conv.id, a, "hello").unwrap();
        db.soft_delete_conversation(conv.id, a).unwrap();

        // B can still page the full history.
        let messages = db.page_messages(conv.id, b, 0, 10).unwrap();
        assert_eq!(messages.len(), 1);

        // A cannot until the thread is revived.
        assert!(matches!(
            db.page_messages(conv.id, a, 0, 10),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_new_message_revives_hidden_and_deleted() {
        let (_dir, mut db) = open_test_db();
        let (conv, a, b) = conversation(&mut db);

        db.hide_conversation(conv.id, a).unwrap();
        db.soft_delete_conversation(conv.id, b).unwrap();

        db.send_message(conv.id, a, "ping").unwrap();

        let stored = db.get_conversation_raw(conv.id).unwrap();
        assert!(!stored.hidden_for(a));
        assert!(!stored.deleted_for(b));
        assert_eq!(db.list_conversations(b).unwrap().len(), 1);
    }
}
