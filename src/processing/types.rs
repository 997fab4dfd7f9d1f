//! Core data types and error definitions for document processing.

use crate::discovery::FileKind;
use crate::embedding::EmbeddingClientError;
use crate::readers::ReaderError;
use anyhow::Error as TokenizerError;
use thiserror::Error;

/// Failures raised while splitting text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// The configured token budget leaves no room for content.
    #[error("chunk size must be at least one token")]
    InvalidChunkSize,
    /// No tokenizer could be set up for the configured model.
    #[error("tokenizer unavailable for model '{model}': {source}")]
    Tokenizer {
        /// Model whose tokenizer failed to load.
        model: String,
        /// Error reported by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Errors emitted while turning one file into an embedded document.
///
/// Each variant scopes the failure to the file being processed; the pipeline
/// records it and moves on to the next file.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Content extraction failed for the file.
    #[error("Failed to read document: {0}")]
    Reader(#[from] ReaderError),
    /// No reader is registered for the file kind.
    #[error("No reader registered for '{kind}' files")]
    NoReader {
        /// File kind discovery assigned to the file.
        kind: FileKind,
    },
    /// The file contained no extractable text.
    #[error("Document '{path}' has no extractable content")]
    EmptyDocument {
        /// Normalized path of the empty file.
        path: String,
    },
    /// The document could not be split into chunks.
    #[error("Could not chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider was unreachable for the document.
    #[error("Could not embed document: {0}")]
    Embedding(#[from] EmbeddingClientError),
}

/// Descriptive payload attributes shared by every record of one document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMetadata {
    /// Human-readable title, taken from the first heading or the file stem.
    pub title: String,
    /// Lowercased tags derived from the file's location and type.
    pub tags: Vec<String>,
    /// Top-level directory the file lives under, or `general`.
    pub category: String,
    /// Slash-joined directory path relative to the root, or `root`.
    pub context: String,
    /// Lowercase label for the file kind (`markdown`, `text`, ...).
    pub file_type: String,
    /// Last filesystem modification time as an RFC 3339 string.
    pub last_modified: String,
}

/// One fully processed document: chunks and their vectors, ready for upload.
///
/// `chunks` and `embeddings` are index-aligned. This is the unit the pipeline
/// holds in memory at any one time; records for the search index are produced
/// lazily from it via [`crate::processing::record_stream`].
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    /// Stable identifier derived from the normalized file path.
    pub document_id: String,
    /// Normalized absolute path of the source file.
    pub file_path: String,
    /// Chunk texts in document order.
    pub chunks: Vec<String>,
    /// One embedding vector per chunk.
    pub embeddings: Vec<Vec<f32>>,
    /// Shared descriptive attributes for every chunk.
    pub metadata: DocumentMetadata,
    /// Chunks whose embedding failed and was replaced by a zero vector.
    pub degraded_chunks: usize,
}

impl ProcessedDocument {
    /// Number of chunks (and therefore records) this document produces.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

/// One chunk prepared for upsert into the search index.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    /// Deterministic point identifier (UUID v5 of `document_id:chunk_index`).
    pub id: String,
    /// Identifier of the document the chunk belongs to.
    pub document_id: String,
    /// Normalized absolute path of the source file.
    pub file_path: String,
    /// Zero-based position of the chunk within the document.
    pub chunk_index: usize,
    /// Chunk text.
    pub text: String,
    /// Embedding vector for the chunk.
    pub vector: Vec<f32>,
    /// Descriptive attributes copied from the parent document.
    pub metadata: DocumentMetadata,
}
