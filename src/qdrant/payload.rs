//! Payload construction for indexed chunks.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::processing::types::IndexRecord;

/// Assemble the payload stored with one point.
///
/// Everything filtering or grouping relies on (`file_path`, `context`,
/// `category`, `tags`, `file_type`) sits at the top level, where the payload
/// indexes created by the client can cover it.
pub(crate) fn build_payload(record: &IndexRecord, indexed_at: &str) -> Value {
    let metadata = &record.metadata;
    let mut payload = Map::new();
    payload.insert(
        "document_id".into(),
        Value::String(record.document_id.clone()),
    );
    payload.insert("file_path".into(), Value::String(record.file_path.clone()));
    payload.insert("chunk_index".into(), Value::from(record.chunk_index));
    payload.insert(
        "chunk_hash".into(),
        Value::String(compute_chunk_hash(&record.text)),
    );
    payload.insert("text".into(), Value::String(record.text.clone()));
    payload.insert("title".into(), Value::String(metadata.title.clone()));
    payload.insert("category".into(), Value::String(metadata.category.clone()));
    payload.insert("context".into(), Value::String(metadata.context.clone()));
    payload.insert(
        "file_type".into(),
        Value::String(metadata.file_type.clone()),
    );
    payload.insert(
        "last_modified".into(),
        Value::String(metadata.last_modified.clone()),
    );
    payload.insert("indexed_at".into(), Value::String(indexed_at.to_string()));

    if !metadata.tags.is_empty() {
        payload.insert(
            "tags".into(),
            Value::Array(
                metadata
                    .tags
                    .iter()
                    .map(|tag| Value::String(tag.clone()))
                    .collect(),
            ),
        );
    }

    Value::Object(payload)
}

/// SHA-256 of the chunk text, hex encoded. Lets consumers detect content
/// drift without comparing whole chunks.
pub fn compute_chunk_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// The moment of upload, as an RFC 3339 string.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::types::DocumentMetadata;

    fn sample_record() -> IndexRecord {
        IndexRecord {
            id: "4a3f9e2a-0000-5000-8000-000000000001".into(),
            document_id: "doc-hash".into(),
            file_path: "/docs/guides/setup.md".into(),
            chunk_index: 2,
            text: "Install the service.".into(),
            vector: vec![0.1, 0.2],
            metadata: DocumentMetadata {
                title: "Setup".into(),
                tags: vec!["guides".into(), "markdown".into()],
                category: "guides".into(),
                context: "guides".into(),
                file_type: "markdown".into(),
                last_modified: "2025-06-01T00:00:00Z".into(),
            },
        }
    }

    #[test]
    fn chunk_hash_is_stable_and_content_sensitive() {
        let first = compute_chunk_hash("Install the service.");
        let second = compute_chunk_hash("Install the service.");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert_ne!(first, compute_chunk_hash("Install the service"));
    }

    #[test]
    fn timestamp_formats_as_rfc3339() {
        let stamp = current_timestamp_rfc3339();
        assert!(stamp.contains('T'));
        assert!(stamp.ends_with('Z'));
    }

    #[test]
    fn payload_flattens_record_and_metadata() {
        let record = sample_record();
        let payload = build_payload(&record, "2025-06-02T00:00:00Z");

        assert_eq!(payload["document_id"], "doc-hash");
        assert_eq!(payload["file_path"], "/docs/guides/setup.md");
        assert_eq!(payload["chunk_index"], 2);
        assert_eq!(payload["text"], "Install the service.");
        assert_eq!(payload["title"], "Setup");
        assert_eq!(payload["category"], "guides");
        assert_eq!(payload["context"], "guides");
        assert_eq!(payload["file_type"], "markdown");
        assert_eq!(payload["last_modified"], "2025-06-01T00:00:00Z");
        assert_eq!(payload["indexed_at"], "2025-06-02T00:00:00Z");
        assert_eq!(payload["chunk_hash"], compute_chunk_hash(&record.text));
        assert_eq!(
            payload["tags"],
            serde_json::json!(["guides", "markdown"])
        );
    }

    #[test]
    fn payload_omits_empty_tags() {
        let mut record = sample_record();
        record.metadata.tags.clear();
        let payload = build_payload(&record, "2025-06-02T00:00:00Z");
        assert!(payload.get("tags").is_none());
    }
}
