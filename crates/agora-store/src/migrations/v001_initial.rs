//! v001 -- Initial schema creation.
//!
//! Creates the two core tables: `conversations` and `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Conversations
-- ----------------------------------------------------------------
-- The participant pair is stored normalized (user_lo < user_hi) so the
-- unique index below enforces at most one conversation per unordered pair.
CREATE TABLE IF NOT EXISTS conversations (
    id              TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    user_lo         TEXT NOT NULL,               -- lexically smaller participant UUID
    user_hi         TEXT NOT NULL,               -- lexically larger participant UUID
    created_at      TEXT NOT NULL,               -- ISO-8601 / RFC-3339
    last_message_at TEXT NOT NULL,
    hidden_lo       INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1, per participant
    hidden_hi       INTEGER NOT NULL DEFAULT 0,
    deleted_lo      INTEGER NOT NULL DEFAULT 0,
    deleted_hi      INTEGER NOT NULL DEFAULT 0
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_conversations_pair
    ON conversations(user_lo, user_hi);

CREATE INDEX IF NOT EXISTS idx_conversations_last_message
    ON conversations(last_message_at DESC);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
-- seq is the monotonic ordering key; wall-clock timestamps can collide.
CREATE TABLE IF NOT EXISTS messages (
    seq             INTEGER PRIMARY KEY AUTOINCREMENT,
    id              TEXT NOT NULL UNIQUE,        -- UUID v4
    conversation_id TEXT NOT NULL,               -- FK -> conversations(id)
    sender_id       TEXT NOT NULL,
    body            TEXT NOT NULL,
    state           TEXT NOT NULL DEFAULT 'sent',  -- sent | delivered | read
    created_at      TEXT NOT NULL,
    delivered_at    TEXT,
    read_at         TEXT,
    edited          INTEGER NOT NULL DEFAULT 0,
    edited_at       TEXT,
    deleted         INTEGER NOT NULL DEFAULT 0,

    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_seq
    ON messages(conversation_id, seq DESC);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_state
    ON messages(conversation_id, state);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
