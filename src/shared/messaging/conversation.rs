//! Conversation Key
//!
//! A deterministic, order-independent identifier for a 1:1 conversation.
//! The two participant ids are sorted lexicographically and joined, so
//! `ConversationKey::new(a, b) == ConversationKey::new(b, a)` for all pairs.
//! The key doubles as the durable-log partition key and the storage column
//! used for history range queries.

use serde::{Deserialize, Serialize};

/// Canonical identifier for a 1:1 conversation.
///
/// Immutable once derived. Because every message in a conversation carries
/// the same key, the durable log keeps the conversation on a single
/// partition and submission order is preserved end-to-end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Derive the canonical key for a pair of participants.
    pub fn new(user_a: &str, user_b: &str) -> Self {
        if user_a <= user_b {
            Self(format!("{}_{}", user_a, user_b))
        } else {
            Self(format!("{}_{}", user_b, user_a))
        }
    }

    /// The key as a string slice (partition key / storage column value).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConversationKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_order_independent() {
        let a = ConversationKey::new("alice", "bob");
        let b = ConversationKey::new("bob", "alice");
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_joins_sorted_ids() {
        let key = ConversationKey::new("bob", "alice");
        assert_eq!(key.as_str(), "alice_bob");
    }

    #[test]
    fn test_key_for_identical_ids() {
        let key = ConversationKey::new("carol", "carol");
        assert_eq!(key.as_str(), "carol_carol");
    }
}
