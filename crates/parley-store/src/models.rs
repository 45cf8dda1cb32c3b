//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` (camelCase) so it can be
//! handed directly to the API layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parley_shared::types::{ConversationId, MessageId, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A user known to the identity directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Internal identifier.
    pub id: UserId,
    /// Key issued by the external identity provider. Unique.
    pub identity_key: String,
    pub name: String,
    pub email: String,
    pub avatar_url: String,
    pub is_online: bool,
    /// When the record was first inserted.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// A two-party conversation and its denormalized last-message summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    /// The two distinct participants, in the order they were first supplied.
    pub participants: [UserId; 2],
    /// Time of the most recent append, or creation time if none yet.
    pub last_message_time: DateTime<Utc>,
    /// Body of the most recent append. Not refreshed by soft-deletes.
    pub last_message_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_participant(&self, user: UserId) -> bool {
        self.participants.contains(&user)
    }

    /// The participant that is not `me`, or `None` if `me` is not a member.
    pub fn other_participant(&self, me: UserId) -> Option<UserId> {
        match self.participants {
            [a, b] if a == me => Some(b),
            [a, b] if b == me => Some(a),
            _ => None,
        }
    }
}

/// A conversation joined with the current record of the other participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationWithPeer {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub other_user: User,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    /// Message body, or the deletion placeholder once `is_deleted` is set.
    pub text: String,
    pub is_deleted: bool,
    /// Assigned by the store at insert time.
    pub created_at: DateTime<Utc>,
}

/// A message joined with the current record of its sender.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageWithSender {
    #[serde(flatten)]
    pub message: Message,
    pub sender: User,
}

// ---------------------------------------------------------------------------
// Presence / read state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicator {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub last_typed: DateTime<Utc>,
}

/// Per-user "read up to here" watermark for one conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub last_read_time: DateTime<Utc>,
}
