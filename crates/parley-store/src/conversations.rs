//! Conversation registry: one conversation per unordered pair of users.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use parley_shared::types::{pair_key, ConversationId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Conversation, ConversationWithPeer};
use crate::sql::{micros, time_at, uuid_at};
use crate::users::{user_columns, user_from_row};

const CONVERSATION_COLUMNS: &str =
    "c.id, c.participant_a, c.participant_b, c.last_message_time, c.last_message_text, c.created_at";

impl Database {
    /// Return the conversation between `user_a` and `user_b`, creating it on
    /// first contact.
    ///
    /// The lookup is keyed by the canonical pair, so argument order does not
    /// matter and concurrent first contacts converge on a single row.
    pub fn get_or_create_conversation(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<ConversationId> {
        if user_a == user_b {
            return Err(StoreError::InvalidArgument(
                "a conversation needs two distinct users".into(),
            ));
        }
        self.require_user(user_a)?;
        self.require_user(user_b)?;

        let key = pair_key(user_a, user_b);
        let now = micros(self.now());
        let inserted = self.conn().execute(
            "INSERT INTO conversations
                 (id, participant_a, participant_b, pair_key, last_message_time, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(pair_key) DO NOTHING",
            params![
                ConversationId::new().to_string(),
                user_a.to_string(),
                user_b.to_string(),
                key,
                now,
            ],
        )?;

        let id = self.conn().query_row(
            "SELECT id FROM conversations WHERE pair_key = ?1",
            params![key],
            |row| uuid_at(row, 0).map(ConversationId),
        )?;

        if inserted > 0 {
            tracing::info!(conversation = %id, %user_a, %user_b, "created conversation");
        }
        Ok(id)
    }

    pub fn get_conversation(&self, id: ConversationId) -> Result<Option<Conversation>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.id = ?1"),
                params![id.to_string()],
                |row| conversation_from_row(row, 0),
            )
            .optional()?)
    }

    pub(crate) fn require_conversation(&self, id: ConversationId) -> Result<Conversation> {
        self.get_conversation(id)?
            .ok_or_else(|| StoreError::InvalidArgument(format!("unknown conversation {id}")))
    }

    /// Like [`require_conversation`](Self::require_conversation), but also
    /// checks that `user` is one of the two participants.
    pub(crate) fn require_participant(
        &self,
        id: ConversationId,
        user: UserId,
    ) -> Result<Conversation> {
        let conversation = self.require_conversation(id)?;
        if !conversation.is_participant(user) {
            return Err(StoreError::PermissionDenied(format!(
                "user {user} is not a participant of conversation {id}"
            )));
        }
        Ok(conversation)
    }

    /// Every conversation `user` takes part in, most recently active first,
    /// each joined with the other participant's current record.
    pub fn list_conversations_for_user(&self, user: UserId) -> Result<Vec<ConversationWithPeer>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS}, {peer}
             FROM conversations c
             JOIN users u ON u.id = CASE WHEN c.participant_a = ?1
                                         THEN c.participant_b
                                         ELSE c.participant_a END
             WHERE c.participant_a = ?1 OR c.participant_b = ?1
             ORDER BY c.last_message_time DESC, c.rowid ASC",
            peer = user_columns("u"),
        ))?;

        let rows = stmt.query_map(params![user.to_string()], |row| {
            Ok(ConversationWithPeer {
                conversation: conversation_from_row(row, 0)?,
                other_user: user_from_row(row, 6)?,
            })
        })?;

        let mut conversations = Vec::new();
        for row in rows {
            conversations.push(row?);
        }
        tracing::debug!(%user, count = conversations.len(), "listed conversations");
        Ok(conversations)
    }
}

/// Overwrite a conversation's last-message summary. Only the message append
/// path calls this, inside its transaction.
pub(crate) fn update_summary(
    conn: &Connection,
    id: ConversationId,
    at: DateTime<Utc>,
    text: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE conversations SET last_message_time = ?2, last_message_text = ?3 WHERE id = ?1",
        params![id.to_string(), micros(at), text],
    )
}

fn conversation_from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: ConversationId(uuid_at(row, base)?),
        participants: [
            UserId(uuid_at(row, base + 1)?),
            UserId(uuid_at(row, base + 2)?),
        ],
        last_message_time: time_at(row, base + 3)?,
        last_message_text: row.get(base + 4)?,
        created_at: time_at(row, base + 5)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::test_support::{setup, user};

    fn conversation_rows(db: &Database) -> i64 {
        db.conn()
            .query_row("SELECT COUNT(*) FROM conversations", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn get_or_create_is_idempotent_in_either_order() {
        let (db, _clock) = setup();
        let ann = user(&db, "Ann");
        let bo = user(&db, "Bo");

        let first = db.get_or_create_conversation(ann, bo).unwrap();
        let second = db.get_or_create_conversation(ann, bo).unwrap();
        let swapped = db.get_or_create_conversation(bo, ann).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, swapped);
        assert_eq!(conversation_rows(&db), 1);

        let conversation = db.get_conversation(first).unwrap().unwrap();
        assert_eq!(conversation.participants, [ann, bo]);
        assert!(conversation.last_message_text.is_none());
    }

    #[test]
    fn self_conversation_is_rejected() {
        let (db, _clock) = setup();
        let ann = user(&db, "Ann");
        assert!(matches!(
            db.get_or_create_conversation(ann, ann),
            Err(StoreError::InvalidArgument(_))
        ));
        assert_eq!(conversation_rows(&db), 0);
    }

    #[test]
    fn unknown_user_is_rejected() {
        let (db, _clock) = setup();
        let ann = user(&db, "Ann");
        assert!(matches!(
            db.get_or_create_conversation(ann, UserId::new()),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn distinct_pairs_get_distinct_conversations() {
        let (db, _clock) = setup();
        let ann = user(&db, "Ann");
        let bo = user(&db, "Bo");
        let cy = user(&db, "Cy");

        let ab = db.get_or_create_conversation(ann, bo).unwrap();
        let ac = db.get_or_create_conversation(ann, cy).unwrap();
        let bc = db.get_or_create_conversation(bo, cy).unwrap();
        assert_ne!(ab, ac);
        assert_ne!(ab, bc);
        assert_ne!(ac, bc);
        assert_eq!(conversation_rows(&db), 3);
    }

    #[test]
    fn list_for_user_sorts_by_activity_and_joins_live_peer() {
        let (db, clock) = setup();
        let ann = user(&db, "Ann");
        let bo = user(&db, "Bo");
        let cy = user(&db, "Cy");

        let with_bo = db.get_or_create_conversation(ann, bo).unwrap();
        clock.advance(Duration::seconds(1));
        let with_cy = db.get_or_create_conversation(cy, ann).unwrap();

        let listed = db.list_conversations_for_user(ann).unwrap();
        let ids: Vec<_> = listed.iter().map(|c| c.conversation.id).collect();
        assert_eq!(ids, [with_cy, with_bo]);
        assert_eq!(listed[0].other_user.id, cy);
        assert_eq!(listed[1].other_user.id, bo);

        // The peer is a live join, not a snapshot.
        db.set_online_status("idp_bo", false).unwrap();
        let listed = db.list_conversations_for_user(ann).unwrap();
        assert!(!listed[1].other_user.is_online);

        // Bo only sees the conversation with Ann.
        let bo_view = db.list_conversations_for_user(bo).unwrap();
        assert_eq!(bo_view.len(), 1);
        assert_eq!(bo_view[0].other_user.id, ann);
    }

    #[test]
    fn other_participant_resolves_both_sides() {
        let (db, _clock) = setup();
        let ann = user(&db, "Ann");
        let bo = user(&db, "Bo");
        let id = db.get_or_create_conversation(ann, bo).unwrap();
        let c = db.get_conversation(id).unwrap().unwrap();

        assert_eq!(c.other_participant(ann), Some(bo));
        assert_eq!(c.other_participant(bo), Some(ann));
        assert_eq!(c.other_participant(UserId::new()), None);
    }

    #[test]
    fn unknown_conversation_is_none() {
        let (db, _clock) = setup();
        assert!(db.get_conversation(ConversationId::new()).unwrap().is_none());
    }
}
