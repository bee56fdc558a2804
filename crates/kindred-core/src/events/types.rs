//! Event records published by evented stores.

use serde::{Deserialize, Serialize};

use crate::document::{Document, Fields};
use crate::time::{Timestamp, now_utc};

/// Kind of document change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentEventType {
    Created,
    Deleted,
}

impl DocumentEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentEventType::Created => "created",
            DocumentEventType::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for DocumentEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change to a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEvent {
    pub event_type: DocumentEventType,
    /// Collection the document lives in (`interests`, `friendships`, ...).
    pub collection: String,
    pub document_id: String,
    /// Document contents at the time of the change. `None` for deletions.
    pub fields: Option<Fields>,
    pub timestamp: Timestamp,
}

impl DocumentEvent {
    pub fn new(
        event_type: DocumentEventType,
        collection: impl Into<String>,
        document_id: impl Into<String>,
        fields: Option<Fields>,
    ) -> Self {
        Self {
            event_type,
            collection: collection.into(),
            document_id: document_id.into(),
            fields,
            timestamp: now_utc(),
        }
    }

    pub fn created(
        collection: impl Into<String>,
        document_id: impl Into<String>,
        fields: Fields,
    ) -> Self {
        Self::new(DocumentEventType::Created, collection, document_id, Some(fields))
    }

    pub fn deleted(collection: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self::new(DocumentEventType::Deleted, collection, document_id, None)
    }

    /// Creation event for a stored document.
    pub fn from_created_document(doc: &Document) -> Self {
        Self {
            event_type: DocumentEventType::Created,
            collection: doc.path.collection().to_string(),
            document_id: doc.id().to_string(),
            fields: Some(doc.fields.clone()),
            timestamp: doc.create_time,
        }
    }

    /// `collection/id` of the changed document.
    pub fn source_path(&self) -> String {
        format!("{}/{}", self.collection, self.document_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Value;

    #[test]
    fn test_created_event() {
        let mut fields = Fields::new();
        fields.insert("fromUserId".into(), Value::from("A"));
        let event = DocumentEvent::created("interests", "i1", fields);
        assert_eq!(event.event_type, DocumentEventType::Created);
        assert_eq!(event.source_path(), "interests/i1");
        assert!(event.fields.is_some());
    }

    #[test]
    fn test_deleted_event_has_no_fields() {
        let event = DocumentEvent::deleted("chat_batches", "b1");
        assert_eq!(event.event_type.to_string(), "deleted");
        assert!(event.fields.is_none());
    }

    #[test]
    fn test_event_serialization() {
        let event = DocumentEvent::created("interests", "i1", Fields::new());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "created");
        assert_eq!(json["documentId"], "i1");
        let parsed: DocumentEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }
}
