//! History pagination against the in-memory store, which shares its
//! contract with the PostgreSQL implementation.

use chrono::{Duration as ChronoDuration, Utc};
use pretty_assertions::assert_eq;
use uuid::Uuid;

use relaychat::backend::storage::{MemoryMessageStore, MessageStore, DEFAULT_PAGE_LIMIT};
use relaychat::shared::{ChatMessage, ConversationKey};

async fn seed(store: &MemoryMessageStore, key: &ConversationKey, count: usize) {
    let base = Utc::now();
    for i in 0..count {
        store
            .insert_messages(&[ChatMessage {
                id: Uuid::new_v4(),
                conversation_key: key.clone(),
                sender_id: "alice".to_string(),
                receiver_id: "bob".to_string(),
                body: format!("m{}", i),
                created_at: base + ChronoDuration::seconds(i as i64),
            }])
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_full_page_sets_has_more() {
    let store = MemoryMessageStore::new();
    let key = ConversationKey::new("alice", "bob");
    seed(&store, &key, 60).await;

    let page = store
        .query_messages(&key, None, DEFAULT_PAGE_LIMIT)
        .await
        .unwrap();
    assert_eq!(page.messages.len(), 50);
    assert!(page.has_more);
    // newest first: the page starts at m59 and ends at m10
    assert_eq!(page.messages[0].body, "m59");
    assert_eq!(page.messages[49].body, "m10");
}

#[tokio::test]
async fn test_cursor_walks_back_to_the_final_short_page() {
    let store = MemoryMessageStore::new();
    let key = ConversationKey::new("alice", "bob");
    seed(&store, &key, 60).await;

    let first = store
        .query_messages(&key, None, DEFAULT_PAGE_LIMIT)
        .await
        .unwrap();
    let cursor = first.cursor.expect("full page must carry a cursor");

    let second = store
        .query_messages(&key, Some(cursor), DEFAULT_PAGE_LIMIT)
        .await
        .unwrap();
    assert_eq!(second.messages.len(), 10);
    assert!(!second.has_more);
    assert_eq!(second.messages[0].body, "m9");
    assert_eq!(second.messages[9].body, "m0");

    // no overlap between pages
    let first_ids: Vec<Uuid> = first.messages.iter().map(|m| m.id).collect();
    assert!(second.messages.iter().all(|m| !first_ids.contains(&m.id)));
}

#[tokio::test]
async fn test_exact_multiple_yields_a_trailing_empty_page() {
    let store = MemoryMessageStore::new();
    let key = ConversationKey::new("alice", "bob");
    seed(&store, &key, DEFAULT_PAGE_LIMIT).await;

    let first = store
        .query_messages(&key, None, DEFAULT_PAGE_LIMIT)
        .await
        .unwrap();
    // a full page claims more even when nothing older exists
    assert!(first.has_more);

    let second = store
        .query_messages(&key, first.cursor, DEFAULT_PAGE_LIMIT)
        .await
        .unwrap();
    assert!(second.messages.is_empty());
    assert!(!second.has_more);
    assert!(second.cursor.is_none());
}

#[tokio::test]
async fn test_empty_conversation() {
    let store = MemoryMessageStore::new();
    let key = ConversationKey::new("alice", "bob");

    let page = store
        .query_messages(&key, None, DEFAULT_PAGE_LIMIT)
        .await
        .unwrap();
    assert!(page.messages.is_empty());
    assert!(!page.has_more);
    assert!(page.cursor.is_none());
}

#[tokio::test]
async fn test_direction_does_not_matter_for_the_conversation() {
    let store = MemoryMessageStore::new();
    let key = ConversationKey::new("alice", "bob");
    seed(&store, &key, 3).await;

    // bob asking about alice resolves to the same conversation
    let from_bob = ConversationKey::new("bob", "alice");
    let page = store
        .query_messages(&from_bob, None, DEFAULT_PAGE_LIMIT)
        .await
        .unwrap();
    assert_eq!(page.messages.len(), 3);
}
