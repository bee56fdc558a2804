//! Processed-event markers.
//!
//! A marker at `processed_events/{handler}:{collection}:{documentId}` records
//! that a handler has applied its side effects for one source document. It is
//! created in the same atomic batch as the counter change, so a redelivered
//! event finds the marker and stops.

use kindred_core::model::{collections, fields};
use kindred_core::{DocumentPath, Fields, Timestamp, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedMarker {
    handler: String,
    source: DocumentPath,
}

impl ProcessedMarker {
    pub fn new(handler: impl Into<String>, source: DocumentPath) -> Self {
        Self {
            handler: handler.into(),
            source,
        }
    }

    pub fn source(&self) -> &DocumentPath {
        &self.source
    }

    /// `{handler}:{collection}:{documentId}`. Nested collection separators are
    /// folded to `:` so the key stays a single path segment.
    pub fn key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.handler,
            self.source.collection().replace('/', ":"),
            self.source.id()
        )
    }

    pub fn path(&self) -> kindred_core::Result<DocumentPath> {
        DocumentPath::new(collections::PROCESSED_EVENTS, self.key())
    }

    pub fn fields(&self, processed_at: Timestamp) -> Fields {
        Fields::from([
            (fields::HANDLER.to_string(), Value::from(self.handler.as_str())),
            (
                fields::SOURCE_PATH.to_string(),
                Value::from(self.source.to_string()),
            ),
            (fields::PROCESSED_AT.to_string(), Value::from(processed_at)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindred_core::now_utc;

    #[test]
    fn test_marker_key_and_fields() {
        let source = DocumentPath::new("interests", "i1").unwrap();
        let marker = ProcessedMarker::new("interest", source);
        assert_eq!(marker.key(), "interest:interests:i1");
        assert_eq!(
            marker.path().unwrap().to_string(),
            "processed_events/interest:interests:i1"
        );

        let now = now_utc();
        let f = marker.fields(now);
        assert_eq!(f.get("sourcePath"), Some(&Value::from("interests/i1")));
        assert_eq!(f.get("processedAt"), Some(&Value::Timestamp(now)));
    }

    #[test]
    fn test_nested_source_key_is_one_segment() {
        let source: DocumentPath = "chat_batches/b1/messages/m1".parse().unwrap();
        let marker = ProcessedMarker::new("message", source);
        assert_eq!(marker.key(), "message:chat_batches:b1:messages:m1");
        assert!(marker.path().is_ok());
    }
}
