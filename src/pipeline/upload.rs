//! Streams a processed document's records into the search index.

use futures_util::{StreamExt, pin_mut};

use crate::processing::{ProcessedDocument, record_stream};
use crate::qdrant::{QdrantError, SearchIndex};

/// Result of uploading one document's records.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadOutcome {
    /// Records accepted by the index.
    pub uploaded: usize,
    /// Records the index rejected.
    pub failed: usize,
}

/// Drain the document's record stream and upsert everything in one batch.
///
/// The stream keeps record construction lazy; the batch stays bounded by the
/// one document the pipeline holds at a time. A document counts as uploaded
/// only when every record was accepted, so callers must not mark the file
/// processed when `failed` is non-zero.
pub(crate) async fn upload_document(
    index: &dyn SearchIndex,
    document: ProcessedDocument,
) -> Result<UploadOutcome, QdrantError> {
    let expected = document.chunk_count();
    let stream = record_stream(document);
    pin_mut!(stream);

    let mut records = Vec::with_capacity(expected);
    while let Some(record) = stream.next().await {
        records.push(record);
    }

    let report = index.upsert_batch(&records).await?;
    Ok(UploadOutcome {
        uploaded: report.succeeded,
        failed: report.failed,
    })
}
