//! Typing presence.
//!
//! Each (conversation, user) pair has at most one row holding the last time
//! the user typed. A row older than [`TYPING_WINDOW_MS`] counts as absent on
//! read; it stays in the table until [`Database::purge_stale_typing`] runs.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};

use parley_shared::constants::TYPING_WINDOW_MS;
use parley_shared::types::{ConversationId, UserId};

use crate::database::Database;
use crate::error::Result;
use crate::models::{TypingIndicator, User};
use crate::sql::{micros, time_at, uuid_at};
use crate::users::{user_columns, user_from_row};

fn liveness_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::milliseconds(TYPING_WINDOW_MS)
}

impl Database {
    /// Record that `user` is typing in `conversation_id` right now.
    pub fn set_typing(&self, conversation_id: ConversationId, user: UserId) -> Result<()> {
        self.require_participant(conversation_id, user)?;

        self.conn().execute(
            "INSERT INTO typing_indicators (conversation_id, user_id, last_typed)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(conversation_id, user_id) DO UPDATE SET last_typed = excluded.last_typed",
            params![
                conversation_id.to_string(),
                user.to_string(),
                micros(self.now()),
            ],
        )?;
        Ok(())
    }

    /// Users other than `exclude` who typed in this conversation within the
    /// liveness window.
    pub fn list_typing_users(
        &self,
        conversation_id: ConversationId,
        exclude: UserId,
    ) -> Result<Vec<User>> {
        self.require_conversation(conversation_id)?;

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {cols}
             FROM typing_indicators t
             JOIN users u ON u.id = t.user_id
             WHERE t.conversation_id = ?1
               AND t.user_id <> ?2
               AND t.last_typed > ?3
             ORDER BY t.rowid ASC",
            cols = user_columns("u"),
        ))?;

        let rows = stmt.query_map(
            params![
                conversation_id.to_string(),
                exclude.to_string(),
                micros(liveness_cutoff(self.now())),
            ],
            |row| user_from_row(row, 0),
        )?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    /// The stored typing row, live or not.
    pub fn get_typing_indicator(
        &self,
        conversation_id: ConversationId,
        user: UserId,
    ) -> Result<Option<TypingIndicator>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT conversation_id, user_id, last_typed
                 FROM typing_indicators
                 WHERE conversation_id = ?1 AND user_id = ?2",
                params![conversation_id.to_string(), user.to_string()],
                |row| {
                    Ok(TypingIndicator {
                        conversation_id: ConversationId(uuid_at(row, 0)?),
                        user_id: UserId(uuid_at(row, 1)?),
                        last_typed: time_at(row, 2)?,
                    })
                },
            )
            .optional()?)
    }

    /// Delete every typing row that has fallen out of the liveness window.
    /// Returns the number of rows removed.
    pub fn purge_stale_typing(&self) -> Result<usize> {
        let removed = self.conn().execute(
            "DELETE FROM typing_indicators WHERE last_typed <= ?1",
            params![micros(liveness_cutoff(self.now()))],
        )?;
        if removed > 0 {
            tracing::debug!(removed, "purged stale typing indicators");
        }
        Ok(removed)
    }
}
