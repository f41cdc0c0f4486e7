//! Chat Message Records
//!
//! Two record shapes flow through the pipeline:
//!
//! - [`PendingMessage`] is built by the gateway at submission time. It has
//!   no persisted id yet; it carries a gateway-assigned idempotency key,
//!   which becomes the message id when the persistence consumer commits it.
//! - [`ChatMessage`] is the finalized record: id and `created_at` are
//!   authoritative once the consumer writes the batch. Re-delivered batches
//!   deduplicate on the id, so replay never duplicates visible history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::conversation::ConversationKey;

/// A message accepted by the gateway but not yet persisted.
///
/// This is the payload appended to the durable log, serialized as JSON
/// under the conversation key as partition key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingMessage {
    /// Gateway-assigned deduplication token; becomes the persisted id.
    pub idempotency_key: Uuid,
    pub conversation_key: ConversationKey,
    pub sender_id: String,
    pub receiver_id: String,
    /// Trimmed, non-empty body.
    pub body: String,
    pub submitted_at: DateTime<Utc>,
}

impl PendingMessage {
    /// Build a pending record for a validated submission.
    ///
    /// The body must already be trimmed and non-empty; the gateway performs
    /// that validation before constructing the record.
    pub fn new(sender_id: &str, receiver_id: &str, body: &str) -> Self {
        Self {
            idempotency_key: Uuid::new_v4(),
            conversation_key: ConversationKey::new(sender_id, receiver_id),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            body: body.to_string(),
            submitted_at: Utc::now(),
        }
    }

    /// The message as acknowledged to the submitting caller.
    ///
    /// The id mirrors the idempotency key and `created_at` mirrors the
    /// submission time; the persistence consumer later assigns the
    /// authoritative `created_at` at write time.
    pub fn accepted_view(&self) -> ChatMessage {
        ChatMessage {
            id: self.idempotency_key,
            conversation_key: self.conversation_key.clone(),
            sender_id: self.sender_id.clone(),
            receiver_id: self.receiver_id.clone(),
            body: self.body.clone(),
            created_at: self.submitted_at,
        }
    }

    /// Finalize the record at persistence time.
    pub fn finalize(&self, created_at: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            id: self.idempotency_key,
            conversation_key: self.conversation_key.clone(),
            sender_id: self.sender_id.clone(),
            receiver_id: self.receiver_id.clone(),
            body: self.body.clone(),
            created_at,
        }
    }
}

/// A persisted chat message. Immutable after creation; the pipeline never
/// updates or deletes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub conversation_key: ConversationKey,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// One page of conversation history, most-recent-first.
///
/// `cursor` is the oldest timestamp in the page; passing it back as
/// `beforeTime` yields stable backward pagination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<ChatMessage>,
    pub has_more: bool,
    pub cursor: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_message_derives_canonical_key() {
        let pending = PendingMessage::new("bob", "alice", "hi");
        assert_eq!(pending.conversation_key.as_str(), "alice_bob");
    }

    #[test]
    fn test_accepted_view_mirrors_idempotency_key() {
        let pending = PendingMessage::new("alice", "bob", "hello");
        let view = pending.accepted_view();
        assert_eq!(view.id, pending.idempotency_key);
        assert_eq!(view.body, "hello");
        assert_eq!(view.created_at, pending.submitted_at);
    }

    #[test]
    fn test_finalize_keeps_id_stable() {
        let pending = PendingMessage::new("alice", "bob", "hello");
        let committed = pending.finalize(Utc::now());
        assert_eq!(committed.id, pending.idempotency_key);
    }

    #[test]
    fn test_wire_fields_are_camel_case() {
        let pending = PendingMessage::new("alice", "bob", "hi");
        let json = serde_json::to_value(&pending).unwrap();
        assert!(json.get("conversationKey").is_some());
        assert!(json.get("senderId").is_some());
        assert!(json.get("idempotencyKey").is_some());
    }

    #[test]
    fn test_queued_payload_roundtrip() {
        let pending = PendingMessage::new("alice", "bob", "hi there");
        let bytes = serde_json::to_vec(&pending).unwrap();
        let parsed: PendingMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, pending);
    }
}
