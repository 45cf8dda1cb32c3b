//! v001 -- Initial schema creation.
//!
//! Creates the five tables: `users`, `conversations`, `messages`,
//! `typing_indicators` and `read_receipts`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    identity_key TEXT NOT NULL UNIQUE,        -- external identity provider key
    name         TEXT NOT NULL,
    email        TEXT NOT NULL,
    avatar_url   TEXT NOT NULL,
    is_online    INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    created_at   INTEGER NOT NULL             -- unix micros
);

-- ----------------------------------------------------------------
-- Conversations (exactly two participants)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversations (
    id                TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    participant_a     TEXT NOT NULL,              -- FK -> users(id)
    participant_b     TEXT NOT NULL,              -- FK -> users(id)
    pair_key          TEXT NOT NULL,              -- "min:max" of the two ids
    last_message_time INTEGER NOT NULL,           -- unix micros
    last_message_text TEXT,
    created_at        INTEGER NOT NULL,

    CHECK (participant_a <> participant_b),
    FOREIGN KEY (participant_a) REFERENCES users(id),
    FOREIGN KEY (participant_b) REFERENCES users(id)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_conversations_pair
    ON conversations(pair_key);
CREATE INDEX IF NOT EXISTS idx_conversations_participant_a
    ON conversations(participant_a);
CREATE INDEX IF NOT EXISTS idx_conversations_participant_b
    ON conversations(participant_b);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    seq             INTEGER PRIMARY KEY AUTOINCREMENT,  -- insertion order
    id              TEXT NOT NULL UNIQUE,               -- UUID v4
    conversation_id TEXT NOT NULL,                      -- FK -> conversations(id)
    sender_id       TEXT NOT NULL,                      -- FK -> users(id)
    text            TEXT NOT NULL,
    is_deleted      INTEGER NOT NULL DEFAULT 0,         -- boolean 0/1, one-way
    created_at      INTEGER NOT NULL,                   -- unix micros

    FOREIGN KEY (conversation_id) REFERENCES conversations(id),
    FOREIGN KEY (sender_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation
    ON messages(conversation_id, seq);

-- ----------------------------------------------------------------
-- Typing indicators (one row per conversation/user)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS typing_indicators (
    conversation_id TEXT NOT NULL,
    user_id         TEXT NOT NULL,
    last_typed      INTEGER NOT NULL,             -- unix micros

    PRIMARY KEY (conversation_id, user_id),
    FOREIGN KEY (conversation_id) REFERENCES conversations(id),
    FOREIGN KEY (user_id) REFERENCES users(id)
);

-- ----------------------------------------------------------------
-- Read receipts (one watermark per conversation/user)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS read_receipts (
    conversation_id TEXT NOT NULL,
    user_id         TEXT NOT NULL,
    last_read_time  INTEGER NOT NULL,             -- unix micros

    PRIMARY KEY (conversation_id, user_id),
    FOREIGN KEY (conversation_id) REFERENCES conversations(id),
    FOREIGN KEY (user_id) REFERENCES users(id)
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
