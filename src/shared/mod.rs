//! Shared Types
//!
//! Types shared between the backend and any connection client: the
//! conversation/message data model, presence wire types, and the WebSocket
//! frame definitions that make up the wire-level contract.

pub mod messaging;
pub mod event;

pub use messaging::conversation::ConversationKey;
pub use messaging::message::{ChatMessage, MessagePage, PendingMessage};
pub use messaging::presence::{PresenceStatus, PresenceUpdate};
pub use event::{ClientFrame, ServerFrame};
