//! Message log: append, list and soft-delete messages within a conversation.

use rusqlite::{params, OptionalExtension, Row};

use parley_shared::constants::{DELETED_MESSAGE_TEXT, MAX_MESSAGE_CHARS};
use parley_shared::types::{ConversationId, MessageId, UserId};

use crate::conversations::update_summary;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Message, MessageWithSender};
use crate::sql::{micros, time_at, uuid_at};
use crate::users::{user_columns, user_from_row};

const MESSAGE_COLUMNS: &str =
    "m.id, m.conversation_id, m.sender_id, m.text, m.is_deleted, m.created_at";

impl Database {
    /// Append a message and refresh the conversation's summary in one
    /// transaction.
    ///
    /// A single clock read stamps both the message and the conversation's
    /// `last_message_time`.
    pub fn send_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        text: &str,
    ) -> Result<MessageId> {
        if text.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "message text must not be empty".into(),
            ));
        }
        let len = text.chars().count();
        if len > MAX_MESSAGE_CHARS {
            return Err(StoreError::InvalidArgument(format!(
                "message is {len} characters, limit is {MAX_MESSAGE_CHARS}"
            )));
        }
        self.require_participant(conversation_id, sender_id)?;

        let id = MessageId::new();
        let now = self.now();

        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO messages (id, conversation_id, sender_id, text, is_deleted, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                id.to_string(),
                conversation_id.to_string(),
                sender_id.to_string(),
                text,
                micros(now),
            ],
        )?;
        update_summary(&tx, conversation_id, now, text)?;
        tx.commit()?;

        tracing::debug!(message = %id, conversation = %conversation_id, sender = %sender_id, "message appended");
        Ok(id)
    }

    /// All messages of a conversation in insertion order, deleted ones
    /// included, each joined with its sender's current record.
    pub fn list_messages(&self, conversation_id: ConversationId) -> Result<Vec<MessageWithSender>> {
        self.require_conversation(conversation_id)?;

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS}, {sender}
             FROM messages m
             JOIN users u ON u.id = m.sender_id
             WHERE m.conversation_id = ?1
             ORDER BY m.seq ASC",
            sender = user_columns("u"),
        ))?;

        let rows = stmt.query_map(params![conversation_id.to_string()], |row| {
            Ok(MessageWithSender {
                message: message_from_row(row, 0)?,
                sender: user_from_row(row, 6)?,
            })
        })?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn get_message(&self, id: MessageId) -> Result<Option<Message>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.id = ?1"),
                params![id.to_string()],
                |row| message_from_row(row, 0),
            )
            .optional()?)
    }

    /// Soft-delete a message: set the flag and replace the body with the
    /// placeholder. Only the sender may do this. Deleting twice is a no-op.
    ///
    /// The conversation summary is left as it was, even if it quotes the
    /// deleted message.
    pub fn delete_message(&self, id: MessageId, requester: UserId) -> Result<()> {
        let message = self
            .get_message(id)?
            .ok_or_else(|| StoreError::InvalidArgument(format!("unknown message {id}")))?;

        if message.sender_id != requester {
            tracing::warn!(message = %id, %requester, "rejected delete by non-sender");
            return Err(StoreError::PermissionDenied(
                "only the sender may delete a message".into(),
            ));
        }

        let affected = self.conn().execute(
            "UPDATE messages SET is_deleted = 1, text = ?2 WHERE id = ?1 AND is_deleted = 0",
            params![id.to_string(), DELETED_MESSAGE_TEXT],
        )?;

        if affected > 0 {
            tracing::info!(message = %id, "message deleted");
        }
        Ok(())
    }
}

fn message_from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Message> {
    Ok(Message {
        id: MessageId(uuid_at(row, base)?),
        conversation_id: ConversationId(uuid_at(row, base + 1)?),
        sender_id: UserId(uuid_at(row, base + 2)?),
        text: row.get(base + 3)?,
        is_deleted: row.get(base + 4)?,
        created_at: time_at(row, base + 5)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::test_support::{setup, user};

    #[test]
    fn send_appends_and_updates_summary() {
        let (db, clock) = setup();
        let ann = user(&db, "Ann");
        let bo = user(&db, "Bo");
        let c = db.get_or_create_conversation(ann, bo).unwrap();

        clock.advance(Duration::seconds(5));
        let id = db.send_message(c, ann, "hi").unwrap();

        let messages = db.list_messages(c).unwrap();
        assert_eq!(messages.len(), 1);
        let m = &messages[0];
        assert_eq!(m.message.id, id);
        assert_eq!(m.message.text, "hi");
        assert_eq!(m.message.sender_id, ann);
        assert_eq!(m.sender.name, "Ann");
        assert!(!m.message.is_deleted);

        let conversation = db.get_conversation(c).unwrap().unwrap();
        assert_eq!(conversation.last_message_text.as_deref(), Some("hi"));
        assert_eq!(conversation.last_message_time, m.message.created_at);
    }

    #[test]
    fn messages_list_in_insertion_order() {
        let (db, _clock) = setup();
        let ann = user(&db, "Ann");
        let bo = user(&db, "Bo");
        let c = db.get_or_create_conversation(ann, bo).unwrap();

        // Same clock reading for all three: order still follows insertion.
        for text in ["one", "two", "three"] {
            db.send_message(c, ann, text).unwrap();
        }
        db.send_message(c, bo, "four").unwrap();

        let texts: Vec<_> = db
            .list_messages(c)
            .unwrap()
            .into_iter()
            .map(|m| m.message.text)
            .collect();
        assert_eq!(texts, ["one", "two", "three", "four"]);
    }

    #[test]
    fn messages_are_scoped_to_their_conversation() {
        let (db, _clock) = setup();
        let ann = user(&db, "Ann");
        let bo = user(&db, "Bo");
        let cy = user(&db, "Cy");
        let ab = db.get_or_create_conversation(ann, bo).unwrap();
        let ac = db.get_or_create_conversation(ann, cy).unwrap();

        db.send_message(ab, ann, "for bo").unwrap();
        db.send_message(ac, cy, "for ann").unwrap();

        assert_eq!(db.list_messages(ab).unwrap().len(), 1);
        assert_eq!(db.list_messages(ac).unwrap()[0].message.text, "for ann");
    }

    #[test]
    fn send_validates_input() {
        let (db, _clock) = setup();
        let ann = user(&db, "Ann");
        let bo = user(&db, "Bo");
        let cy = user(&db, "Cy");
        let c = db.get_or_create_conversation(ann, bo).unwrap();

        assert!(matches!(
            db.send_message(c, ann, "   "),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            db.send_message(c, ann, &"x".repeat(MAX_MESSAGE_CHARS + 1)),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            db.send_message(ConversationId::new(), ann, "hi"),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            db.send_message(c, cy, "let me in"),
            Err(StoreError::PermissionDenied(_))
        ));

        assert!(db.list_messages(c).unwrap().is_empty());
        assert!(db
            .get_conversation(c)
            .unwrap()
            .unwrap()
            .last_message_text
            .is_none());
    }

    #[test]
    fn soft_delete_redacts_in_place() {
        let (db, _clock) = setup();
        let ann = user(&db, "Ann");
        let bo = user(&db, "Bo");
        let c = db.get_or_create_conversation(ann, bo).unwrap();

        db.send_message(c, ann, "first").unwrap();
        let doomed = db.send_message(c, ann, "oops").unwrap();
        db.send_message(c, bo, "third").unwrap();

        db.delete_message(doomed, ann).unwrap();

        let messages = db.list_messages(c).unwrap();
        assert_eq!(messages.len(), 3);
        let m = &messages[1].message;
        assert_eq!(m.id, doomed);
        assert!(m.is_deleted);
        assert_eq!(m.text, DELETED_MESSAGE_TEXT);

        // Deleting again changes nothing.
        db.delete_message(doomed, ann).unwrap();
        assert_eq!(db.get_message(doomed).unwrap().unwrap(), *m);
    }

    #[test]
    fn delete_leaves_summary_stale() {
        let (db, _clock) = setup();
        let ann = user(&db, "Ann");
        let bo = user(&db, "Bo");
        let c = db.get_or_create_conversation(ann, bo).unwrap();

        let id = db.send_message(c, ann, "secret").unwrap();
        db.delete_message(id, ann).unwrap();

        let conversation = db.get_conversation(c).unwrap().unwrap();
        assert_eq!(conversation.last_message_text.as_deref(), Some("secret"));
    }

    #[test]
    fn delete_checks_message_and_sender() {
        let (db, _clock) = setup();
        let ann = user(&db, "Ann");
        let bo = user(&db, "Bo");
        let c = db.get_or_create_conversation(ann, bo).unwrap();
        let id = db.send_message(c, ann, "mine").unwrap();

        assert!(matches!(
            db.delete_message(id, bo),
            Err(StoreError::PermissionDenied(_))
        ));
        assert!(matches!(
            db.delete_message(MessageId::new(), ann),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(!db.get_message(id).unwrap().unwrap().is_deleted);
    }

    #[test]
    fn sending_moves_conversation_to_front() {
        let (db, clock) = setup();
        let ann = user(&db, "Ann");
        let bo = user(&db, "Bo");
        let cy = user(&db, "Cy");

        let oldest = db.get_or_create_conversation(ann, bo).unwrap();
        clock.advance(Duration::seconds(1));
        let newer = db.get_or_create_conversation(ann, cy).unwrap();

        let order: Vec<_> = db
            .list_conversations_for_user(ann)
            .unwrap()
            .into_iter()
            .map(|c| c.conversation.id)
            .collect();
        assert_eq!(order, [newer, oldest]);

        clock.advance(Duration::seconds(1));
        db.send_message(oldest, bo, "bump").unwrap();

        let listed = db.list_conversations_for_user(ann).unwrap();
        assert_eq!(listed[0].conversation.id, oldest);
        assert_eq!(listed[0].conversation.last_message_text.as_deref(), Some("bump"));
        assert_eq!(listed[1].conversation.id, newer);
    }
}
