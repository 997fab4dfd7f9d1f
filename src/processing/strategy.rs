//! Turns one discovered file into an embedded document and its index records.

use std::path::Path;

use async_stream::stream;
use futures_core::Stream;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::get_config;
use crate::discovery::FileDescriptor;
use crate::embedding::{EmbeddingClient, EmbeddingClientError, get_embedding_client};
use crate::readers::ReaderRegistry;

use super::chunking::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_MIN_CHUNK_CHARS, chunk_text, determine_chunk_size,
};
use super::metadata::extract_metadata;
use super::types::{IndexRecord, ProcessError, ProcessedDocument};

/// Coordinates the per-file processing stage: extraction, chunking, embedding.
///
/// The processor owns the reader registry and a long-lived embedding client and
/// is shared across the whole indexing run. Files pass through it one at a
/// time, which bounds memory to a single document's chunks and vectors.
pub struct DocumentProcessor {
    readers: ReaderRegistry,
    embedder: Box<dyn EmbeddingClient>,
}

impl DocumentProcessor {
    /// Build a processor with the default readers and the configured embedding client.
    pub fn new() -> Self {
        Self::with_components(ReaderRegistry::with_defaults(), get_embedding_client())
    }

    /// Build a processor from explicit components.
    ///
    /// Used by tests to substitute canned readers or embedding fakes.
    pub fn with_components(readers: ReaderRegistry, embedder: Box<dyn EmbeddingClient>) -> Self {
        Self { readers, embedder }
    }

    /// Fully process one discovered file into chunks and embeddings.
    ///
    /// Embedding failures are handled per severity: an unreachable provider
    /// aborts the document, while a failure scoped to a single chunk degrades
    /// that chunk to a zero vector so the rest of the document stays indexable.
    pub async fn process_single(
        &self,
        descriptor: &FileDescriptor,
        root: &Path,
    ) -> Result<ProcessedDocument, ProcessError> {
        let reader = self
            .readers
            .reader_for(descriptor.kind)
            .ok_or(ProcessError::NoReader {
                kind: descriptor.kind,
            })?;
        let content = reader.read(&descriptor.path)?;
        let file_path = descriptor.normalized_path();
        if content.trim().is_empty() {
            return Err(ProcessError::EmptyDocument { path: file_path });
        }

        let metadata = extract_metadata(descriptor, root, &content);

        let config = get_config();
        let chunk_size = determine_chunk_size(
            config.text_splitter_chunk_size,
            config.embedding_provider,
            &config.embedding_model,
            config.text_splitter_use_safe_defaults,
        );
        let overlap = config
            .text_splitter_chunk_overlap
            .unwrap_or(DEFAULT_CHUNK_OVERLAP);
        let min_chars = config
            .text_splitter_min_chunk_chars
            .unwrap_or(DEFAULT_MIN_CHUNK_CHARS);
        tracing::debug!(
            file = %file_path,
            chunk_size,
            overlap,
            min_chars,
            provider = ?config.embedding_provider,
            model = %config.embedding_model,
            "Derived chunk parameters"
        );
        let chunks = chunk_text(
            &content,
            chunk_size,
            overlap,
            min_chars,
            config.embedding_provider,
            &config.embedding_model,
        )?;
        if chunks.is_empty() {
            return Err(ProcessError::EmptyDocument { path: file_path });
        }

        let mut embeddings = Vec::with_capacity(chunks.len());
        let mut degraded_chunks = 0;
        for (chunk_index, chunk) in chunks.iter().enumerate() {
            match self.embedder.embed(chunk).await {
                Ok(vector) => embeddings.push(vector),
                Err(error @ EmbeddingClientError::ProviderUnavailable(_)) => {
                    return Err(ProcessError::Embedding(error));
                }
                Err(error) => {
                    tracing::warn!(
                        file = %file_path,
                        chunk_index,
                        error = %error,
                        "Embedding failed for chunk; substituting zero vector"
                    );
                    embeddings.push(vec![0.0; config.embedding_dimension]);
                    degraded_chunks += 1;
                }
            }
        }

        Ok(ProcessedDocument {
            document_id: compute_document_id(&file_path),
            file_path,
            chunks,
            embeddings,
            metadata,
            degraded_chunks,
        })
    }
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable document identifier: SHA-256 of the normalized file path.
pub(crate) fn compute_document_id(file_path: &str) -> String {
    hex::encode(Sha256::digest(file_path.as_bytes()))
}

/// Deterministic point identifier for one chunk.
///
/// Qdrant only accepts integers or UUIDs as point ids, so the
/// `document_id:chunk_index` pair is folded into a v5 UUID. Re-indexing an
/// unchanged file therefore overwrites its own points instead of duplicating
/// them.
pub(crate) fn chunk_record_id(document_id: &str, chunk_index: usize) -> String {
    let name = format!("{document_id}:{chunk_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

/// Lazily turn a processed document into index records, in chunk order.
///
/// Records are materialized one at a time as the consumer polls, so upload
/// code never holds more than the document itself plus the record in flight.
pub fn record_stream(document: ProcessedDocument) -> impl Stream<Item = IndexRecord> {
    stream! {
        let ProcessedDocument {
            document_id,
            file_path,
            chunks,
            embeddings,
            metadata,
            ..
        } = document;
        for (chunk_index, (text, vector)) in chunks.into_iter().zip(embeddings).enumerate() {
            yield IndexRecord {
                id: chunk_record_id(&document_id, chunk_index),
                document_id: document_id.clone(),
                file_path: file_path.clone(),
                chunk_index,
                text,
                vector,
                metadata: metadata.clone(),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::types::DocumentMetadata;
    use futures_util::{StreamExt, pin_mut};

    fn sample_document(chunk_count: usize) -> ProcessedDocument {
        let chunks: Vec<String> = (0..chunk_count).map(|i| format!("chunk {i}")).collect();
        let embeddings = vec![vec![0.1, 0.2]; chunk_count];
        ProcessedDocument {
            document_id: compute_document_id("/docs/a.md"),
            file_path: "/docs/a.md".into(),
            chunks,
            embeddings,
            metadata: DocumentMetadata {
                title: "A".into(),
                tags: vec!["markdown".into()],
                category: "general".into(),
                context: "root".into(),
                file_type: "markdown".into(),
                last_modified: "2025-06-01T00:00:00Z".into(),
            },
            degraded_chunks: 0,
        }
    }

    #[test]
    fn document_id_is_stable_hex() {
        let first = compute_document_id("/docs/a.md");
        let second = compute_document_id("/docs/a.md");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, compute_document_id("/docs/b.md"));
    }

    #[test]
    fn record_ids_are_deterministic_per_chunk() {
        let doc = compute_document_id("/docs/a.md");
        let first = chunk_record_id(&doc, 0);
        assert_eq!(first, chunk_record_id(&doc, 0));
        assert_ne!(first, chunk_record_id(&doc, 1));
        assert!(Uuid::parse_str(&first).is_ok());
    }

    #[tokio::test]
    async fn record_stream_yields_chunks_in_order() {
        let document = sample_document(3);
        let expected_doc_id = document.document_id.clone();
        let stream = record_stream(document);
        pin_mut!(stream);

        let mut seen = Vec::new();
        while let Some(record) = stream.next().await {
            assert_eq!(record.document_id, expected_doc_id);
            assert_eq!(record.id, chunk_record_id(&expected_doc_id, record.chunk_index));
            assert_eq!(record.text, format!("chunk {}", record.chunk_index));
            seen.push(record.chunk_index);
        }

        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn record_stream_is_empty_for_chunkless_document() {
        let stream = record_stream(sample_document(0));
        pin_mut!(stream);
        assert!(stream.next().await.is_none());
    }
}
