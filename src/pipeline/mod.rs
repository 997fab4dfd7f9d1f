//! End-to-end indexing pipeline: discover, process, upload, track.
//!
//! The pipeline walks files strictly one at a time. Each file flows through
//! processing and upload to completion before the next is touched, and the
//! tracker is saved after every file whose outcome changed it, so an
//! interrupted run resumes exactly where it stopped and a failed file never
//! poisons its neighbors. A failure also drops the file's entry from any
//! earlier successful run; otherwise reverting the file to that recorded
//! version would skip it while its records are gone from the index.

mod upload;

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::discovery::{self, DiscoveryError};
use crate::processing::{DocumentProcessor, ProcessError};
use crate::qdrant::{QdrantError, QdrantService, SearchIndex};
use crate::tracker::{Tracker, TrackerError};

/// Errors that abort an entire pipeline run.
///
/// Per-file failures are not errors at this level; they are counted in the
/// [`RunSummary`] and the run continues.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The document root could not be scanned.
    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),
    /// The tracker store could not be loaded or persisted.
    #[error("Tracker store error: {0}")]
    Tracker(#[from] TrackerError),
    /// A search-index operation outside per-file scope failed.
    #[error("Search index error: {0}")]
    Index(#[from] QdrantError),
    /// A forced reset finished but records remained in the index.
    #[error("Index reset left {remaining} records behind")]
    ResetVerification {
        /// Records still reported by the index after the reset.
        remaining: usize,
    },
}

/// Aggregate counters for one indexing run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunSummary {
    /// Supported files found under the root.
    pub discovered: usize,
    /// Files excluded because their extension is unsupported.
    pub unsupported: usize,
    /// Files skipped because their signature matched the tracker.
    pub already_processed: usize,
    /// Files fully processed and uploaded this run.
    pub uploaded: usize,
    /// Records uploaded across all files this run.
    pub chunks_uploaded: usize,
    /// Chunks indexed with a substitute zero vector after embedding failures.
    pub degraded_chunks: usize,
    /// Files skipped because they contained no extractable content.
    pub skipped_empty: usize,
    /// Files that failed processing or upload and remain unprocessed.
    pub failed: usize,
}

/// Aggregate counters for a forced cleanup.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CleanupSummary {
    /// Paths the caller asked to clean up.
    pub requested: usize,
    /// Records removed from the search index.
    pub records_removed: usize,
    /// Tracker entries that existed and were cleared.
    pub entries_cleared: usize,
}

/// Point-in-time view of the document root, the tracker, and the remote index.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Supported files currently present under the root.
    pub discovered: usize,
    /// Files under the root with unsupported extensions.
    pub unsupported: usize,
    /// Files the tracker lists as fully indexed.
    pub tracked_files: usize,
    /// Discovered files a run would pick up: new, changed, or previously failed.
    pub pending_files: usize,
    /// Records currently stored in the search index.
    pub indexed_records: usize,
    /// Location of the tracker store.
    pub tracker_path: String,
}

/// Coordinates discovery, processing, upload, and tracking for one run.
///
/// Owns the per-file processor and the search-index handle. Construct it once
/// after [`crate::config::init_config`] and drive it with [`IndexPipeline::run`].
pub struct IndexPipeline {
    processor: DocumentProcessor,
    index: Box<dyn SearchIndex>,
}

impl IndexPipeline {
    /// Build a pipeline against the configured Qdrant endpoint.
    pub fn new() -> Result<Self, PipelineError> {
        let index = QdrantService::new()?;
        Ok(Self::with_components(
            DocumentProcessor::new(),
            Box::new(index),
        ))
    }

    /// Build a pipeline from explicit components.
    ///
    /// Used by tests to substitute an in-memory index or canned processing.
    pub fn with_components(processor: DocumentProcessor, index: Box<dyn SearchIndex>) -> Self {
        Self { processor, index }
    }

    /// Index every supported file under `root` that changed since the last run.
    ///
    /// With `force_reset` the search index and the tracker are emptied first
    /// and everything is re-indexed from scratch; the reset is verified against
    /// the index before any local state is dropped.
    pub async fn run(&self, root: &Path, force_reset: bool) -> Result<RunSummary, PipelineError> {
        let root = discovery::normalize_path(root);
        self.index.ensure_ready().await?;
        let mut tracker = Tracker::load(&root)?;

        let mut fresh_reset = false;
        if force_reset {
            let removed = self.index.delete_all().await?;
            let remaining = self.index.document_count().await?;
            if remaining != 0 {
                return Err(PipelineError::ResetVerification { remaining });
            }
            tracker.clear()?;
            fresh_reset = true;
            tracing::info!(records = removed, "Search index reset verified");
        }

        let outcome = discovery::discover(&root)?;
        let mut summary = RunSummary {
            discovered: outcome.files.len(),
            unsupported: outcome.unsupported,
            ..RunSummary::default()
        };
        tracing::info!(
            root = %root.display(),
            discovered = summary.discovered,
            unsupported = summary.unsupported,
            "Discovery complete"
        );

        for descriptor in &outcome.files {
            if tracker.is_processed(descriptor) {
                tracing::debug!(file = %descriptor.normalized_path(), "Unchanged since last run");
                summary.already_processed += 1;
                continue;
            }

            let document = match self.processor.process_single(descriptor, &root).await {
                Ok(document) => document,
                Err(ProcessError::EmptyDocument { path }) => {
                    tracing::debug!(file = %path, "Skipping document without content");
                    summary.skipped_empty += 1;
                    continue;
                }
                Err(error) => {
                    tracing::error!(
                        file = %descriptor.normalized_path(),
                        error = %error,
                        "Processing failed"
                    );
                    summary.failed += 1;
                    untrack_failed(&mut tracker, &descriptor.normalized_path())?;
                    continue;
                }
            };

            // A changed file replaces its old records before the new ones land.
            if !fresh_reset {
                match self.index.delete_by_file_path(&document.file_path).await {
                    Ok(stale) if stale > 0 => {
                        tracing::debug!(file = %document.file_path, stale, "Removed stale records");
                    }
                    Ok(_) => {}
                    Err(error) => {
                        tracing::error!(
                            file = %document.file_path,
                            error = %error,
                            "Stale record cleanup failed"
                        );
                        summary.failed += 1;
                        untrack_failed(&mut tracker, &document.file_path)?;
                        continue;
                    }
                }
            }

            let degraded = document.degraded_chunks;
            let file_path = document.file_path.clone();
            match upload::upload_document(self.index.as_ref(), document).await {
                Ok(outcome) if outcome.failed == 0 => {
                    tracker.mark_processed(descriptor);
                    tracker.save()?;
                    summary.uploaded += 1;
                    summary.chunks_uploaded += outcome.uploaded;
                    summary.degraded_chunks += degraded;
                    tracing::info!(
                        file = %file_path,
                        chunks = outcome.uploaded,
                        degraded,
                        "Document indexed"
                    );
                }
                Ok(outcome) => {
                    tracing::error!(
                        file = %file_path,
                        rejected = outcome.failed,
                        "Index rejected records; file left unprocessed"
                    );
                    summary.failed += 1;
                    untrack_failed(&mut tracker, &file_path)?;
                }
                Err(error) => {
                    tracing::error!(file = %file_path, error = %error, "Upload failed");
                    summary.failed += 1;
                    untrack_failed(&mut tracker, &file_path)?;
                }
            }
        }

        tracing::info!(
            uploaded = summary.uploaded,
            chunks = summary.chunks_uploaded,
            already_processed = summary.already_processed,
            skipped_empty = summary.skipped_empty,
            failed = summary.failed,
            "Indexing run complete"
        );
        Ok(summary)
    }

    /// Remove the given files from the search index and the tracker.
    ///
    /// Meant for files deleted from disk, which discovery can no longer see.
    /// Paths are normalized the same way discovery normalizes them, so the
    /// caller can pass the paths as they were originally indexed.
    pub async fn force_cleanup(
        &self,
        root: &Path,
        files: &[PathBuf],
    ) -> Result<CleanupSummary, PipelineError> {
        let root = discovery::normalize_path(root);
        let mut tracker = Tracker::load(&root)?;
        let mut summary = CleanupSummary {
            requested: files.len(),
            ..CleanupSummary::default()
        };

        for file in files {
            let normalized = discovery::normalize_path(file);
            let file_path = normalized.to_string_lossy().into_owned();
            let removed = self.index.delete_by_file_path(&file_path).await?;
            summary.records_removed += removed;
            if tracker.mark_unprocessed(&file_path) {
                tracker.save()?;
                summary.entries_cleared += 1;
            }
            tracing::info!(file = %file_path, records = removed, "Cleanup complete");
        }

        Ok(summary)
    }

    /// Report root, tracker, and index state without modifying any of them.
    pub async fn status(&self, root: &Path) -> Result<StatusReport, PipelineError> {
        let root = discovery::normalize_path(root);
        let tracker = Tracker::load(&root)?;
        let outcome = discovery::discover(&root)?;
        let pending_files = outcome
            .files
            .iter()
            .filter(|descriptor| !tracker.is_processed(descriptor))
            .count();
        let indexed_records = self.index.document_count().await?;
        Ok(StatusReport {
            discovered: outcome.files.len(),
            unsupported: outcome.unsupported,
            tracked_files: tracker.len(),
            pending_files,
            indexed_records,
            tracker_path: tracker.store_path().display().to_string(),
        })
    }
}

/// Drop a failed file's tracker entry, if one exists, so a stale signature
/// from an earlier successful run cannot mask the failure on a later rerun.
fn untrack_failed(tracker: &mut Tracker, file_path: &str) -> Result<(), TrackerError> {
    if tracker.mark_unprocessed(file_path) {
        tracker.save()?;
        tracing::debug!(file = %file_path, "Dropped stale tracker entry after failure");
    }
    Ok(())
}
