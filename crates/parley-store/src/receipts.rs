//! Read tracking and unread counts.

use rusqlite::{params, OptionalExtension};

use parley_shared::types::{ConversationId, UserId};

use crate::database::Database;
use crate::error::Result;
use crate::models::ReadReceipt;
use crate::sql::{micros, time_at, uuid_at};

impl Database {
    /// Move `user`'s read watermark for this conversation to now.
    pub fn mark_read(&self, conversation_id: ConversationId, user: UserId) -> Result<()> {
        self.require_participant(conversation_id, user)?;

        self.conn().execute(
            "INSERT INTO read_receipts (conversation_id, user_id, last_read_time)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(conversation_id, user_id) DO UPDATE SET last_read_time = excluded.last_read_time",
            params![
                conversation_id.to_string(),
                user.to_string(),
                micros(self.now()),
            ],
        )?;
        tracing::debug!(conversation = %conversation_id, %user, "marked read");
        Ok(())
    }

    pub fn get_read_receipt(
        &self,
        conversation_id: ConversationId,
        user: UserId,
    ) -> Result<Option<ReadReceipt>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT conversation_id, user_id, last_read_time
                 FROM read_receipts
                 WHERE conversation_id = ?1 AND user_id = ?2",
                params![conversation_id.to_string(), user.to_string()],
                |row| {
                    Ok(ReadReceipt {
                        conversation_id: ConversationId(uuid_at(row, 0)?),
                        user_id: UserId(uuid_at(row, 1)?),
                        last_read_time: time_at(row, 2)?,
                    })
                },
            )
            .optional()?)
    }

    /// Messages in the conversation created after `user`'s watermark and sent
    /// by someone else. No receipt means nothing has been read.
    ///
    /// Soft-deleted messages still count: deletion does not change read state.
    pub fn unread_count(&self, conversation_id: ConversationId, user: UserId) -> Result<u64> {
        self.require_conversation(conversation_id)?;

        let watermark = self
            .get_read_receipt(conversation_id, user)?
            .map(|r| micros(r.last_read_time))
            .unwrap_or(0);

        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages
             WHERE conversation_id = ?1 AND created_at > ?2 AND sender_id <> ?3",
            params![conversation_id.to_string(), watermark, user.to_string()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}
