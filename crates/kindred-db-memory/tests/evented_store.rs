//! EventedStore over the in-memory backend: events follow successful writes only.

use std::sync::Arc;
use std::time::Duration;

use kindred_core::events::{DocumentEventType, EventBroadcaster};
use kindred_core::{DocumentPath, Fields, Value};
use kindred_db_memory::MemoryStore;
use kindred_storage::{DocumentStore, EventedStore, WriteBatch};
use tokio::time::timeout;

fn interest_fields(from: &str, to: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert("fromUserId".into(), Value::from(from));
    fields.insert("toUserId".into(), Value::from(to));
    fields
}

#[tokio::test]
async fn create_emits_created_event_with_fields() {
    let broadcaster = EventBroadcaster::new_shared();
    let mut receiver = broadcaster.subscribe();
    let store = EventedStore::new(MemoryStore::new(), broadcaster.clone());

    let doc = store
        .create("interests", None, interest_fields("A", "B"))
        .await
        .unwrap();

    let event = timeout(Duration::from_secs(1), receiver.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.event_type, DocumentEventType::Created);
    assert_eq!(event.collection, "interests");
    assert_eq!(event.document_id, doc.id());
    let fields = event.fields.unwrap();
    assert_eq!(fields.get("toUserId"), Some(&Value::from("B")));
}

#[tokio::test]
async fn failed_create_emits_nothing() {
    let broadcaster = EventBroadcaster::new_shared();
    let store = EventedStore::new(MemoryStore::new(), broadcaster.clone());
    store
        .create("interests", Some("i1"), interest_fields("A", "B"))
        .await
        .unwrap();

    let mut receiver = broadcaster.subscribe();
    assert!(
        store
            .create("interests", Some("i1"), interest_fields("A", "B"))
            .await
            .is_err()
    );
    assert!(receiver.try_recv().is_err());
}

#[tokio::test]
async fn committed_batch_emits_creates_and_deletes() {
    let broadcaster = Arc::new(EventBroadcaster::new());
    let store = EventedStore::new(MemoryStore::new(), broadcaster.clone());
    store
        .create("interests", Some("old"), interest_fields("A", "B"))
        .await
        .unwrap();

    let mut receiver = broadcaster.subscribe();
    let mut batch = WriteBatch::new();
    batch
        .delete(DocumentPath::new("interests", "old").unwrap())
        .create(
            DocumentPath::new("processed_events", "k").unwrap(),
            Fields::new(),
        );
    store.commit(batch).await.unwrap();

    let first = receiver.recv().await.unwrap();
    let second = receiver.recv().await.unwrap();
    assert_eq!(first.event_type, DocumentEventType::Deleted);
    assert_eq!(first.source_path(), "interests/old");
    assert_eq!(second.event_type, DocumentEventType::Created);
    assert_eq!(second.collection, "processed_events");
    assert_eq!(store.inner().count("interests"), 0);
}
