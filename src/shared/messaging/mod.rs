//! Messaging Data Model
//!
//! The conversation key, message records, and presence types owned by the
//! delivery pipeline. `ConversationKey` and the message records are never
//! mutated outside the pipeline once created.

pub mod conversation;
pub mod message;
pub mod presence;

pub use conversation::ConversationKey;
pub use message::{ChatMessage, MessagePage, PendingMessage};
pub use presence::{PresenceStatus, PresenceUpdate};
