//! WebSocket Wire Frames
//!
//! The wire-level contract between a connection client and the backend.
//! Every frame is a JSON object tagged by `type`, matching the event names
//! of the contract: `submit-message`, `chat-message`, `presence-update`,
//! `get-online-friends`, `get-user-status`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::messaging::{ChatMessage, ConversationKey, PresenceStatus};

/// Frames a client sends to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientFrame {
    /// Submit a chat message; acknowledged with [`ServerFrame::SubmitAck`].
    #[serde(rename_all = "camelCase")]
    SubmitMessage { receiver_id: String, body: String },
    /// Ask which of the caller's friends are currently online.
    GetOnlineFriends,
    /// Ask whether a single user is currently online.
    #[serde(rename_all = "camelCase")]
    GetUserStatus { user_id: String },
}

/// Frames the server pushes to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerFrame {
    /// Acknowledgment for `submit-message`. `success: true` means the
    /// durable append was acknowledged, not that the message is persisted
    /// to the relational store.
    SubmitAck {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<ChatMessage>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A message fanned out to this connection's user.
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        conversation_key: ConversationKey,
        sender_id: String,
        receiver_id: String,
        body: String,
        timestamp: DateTime<Utc>,
    },
    /// A presence transition of one of this user's friends.
    #[serde(rename_all = "camelCase")]
    PresenceUpdate {
        user_id: String,
        status: PresenceStatus,
        timestamp: i64,
    },
    /// Reply to `get-online-friends`.
    #[serde(rename_all = "camelCase")]
    OnlineFriends { user_ids: Vec<String> },
    /// Reply to `get-user-status`.
    #[serde(rename_all = "camelCase")]
    UserStatus { user_id: String, online: bool },
    /// A request frame that could not be handled.
    Error { error: String },
}
