//! Qdrant search-index integration.

use crate::processing::types::IndexRecord;
use async_trait::async_trait;

pub mod client;
pub mod filters;
pub mod payload;
pub mod types;

pub use client::QdrantService;
pub use filters::file_path_filter;
pub use payload::compute_chunk_hash;
pub use types::{QdrantError, UpsertReport};

/// Operations the indexing pipeline needs from a remote search index.
///
/// [`QdrantService`] is the production implementation; tests substitute
/// in-memory fakes to exercise pipeline behavior without a server.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Create the backing collection and payload indexes if absent.
    async fn ensure_ready(&self) -> Result<(), QdrantError>;

    /// Upsert one document's records in a single batch.
    async fn upsert_batch(&self, records: &[IndexRecord]) -> Result<UpsertReport, QdrantError>;

    /// Remove every record whose `file_path` payload matches, returning how
    /// many records existed beforehand.
    async fn delete_by_file_path(&self, file_path: &str) -> Result<usize, QdrantError>;

    /// Drop all indexed records, returning the prior record count. The
    /// collection is left ready for immediate re-indexing.
    async fn delete_all(&self) -> Result<usize, QdrantError>;

    /// Exact number of records currently stored.
    async fn document_count(&self) -> Result<usize, QdrantError>;
}
