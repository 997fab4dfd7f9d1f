#![deny(missing_docs)]

//! Core library for the docdex document indexer.

/// Environment-driven configuration management.
pub mod config;
/// Filesystem discovery of indexable documents.
pub mod discovery;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Structured logging and tracing setup.
pub mod logging;
/// End-to-end indexing pipeline orchestration.
pub mod pipeline;
/// Document processing utilities.
pub mod processing;
/// Qdrant search-index integration.
pub mod qdrant;
/// Content readers for the supported document formats.
pub mod readers;
/// Idempotent file tracking.
pub mod tracker;
