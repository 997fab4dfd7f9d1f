//! Document processing: content extraction, chunking, and embedding.

mod chunking;
mod metadata;
mod strategy;
pub mod types;

pub use strategy::{DocumentProcessor, record_stream};
pub use types::{
    ChunkingError, DocumentMetadata, IndexRecord, ProcessError, ProcessedDocument,
};
