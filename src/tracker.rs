//! Idempotent file tracking backed by a JSON store beside the document root.
//!
//! The tracker records, per file, the signature (path, size, mtime) of the last
//! version whose chunks were all uploaded. A file is reprocessed whenever its
//! live signature differs from the stored one. Entries are written only after a
//! fully successful upload, and the store is saved after each file so an
//! interrupted run never forgets completed work.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::discovery::{FileDescriptor, normalize_path};

/// File name of the tracker store, co-located with the document root.
pub const TRACKER_FILE_NAME: &str = ".docdex-tracker.json";

/// Errors raised while loading or persisting the tracker store.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The store exists but could not be read.
    #[error("Failed to read tracker store at {path}")]
    Read {
        /// Store location.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The store exists but does not contain valid tracker JSON.
    #[error("Tracker store at {path} is not valid JSON")]
    Parse {
        /// Store location.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// The store could not be serialized or written back to disk.
    #[error("Failed to write tracker store at {path}")]
    Write {
        /// Store location.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// The idempotency key for one file: all three fields must match exactly for a
/// file to count as already processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSignature {
    /// Normalized absolute path.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    /// Last-modified timestamp in unix milliseconds.
    pub modified_ms: u64,
}

impl From<&FileDescriptor> for FileSignature {
    fn from(descriptor: &FileDescriptor) -> Self {
        Self {
            path: descriptor.normalized_path(),
            size: descriptor.size,
            modified_ms: descriptor.modified_ms,
        }
    }
}

/// Persisted record of one successfully indexed file version.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackerEntry {
    /// Normalized absolute path.
    pub path: String,
    /// Size in bytes at the time of the successful upload.
    pub size: u64,
    /// Last-modified timestamp (unix milliseconds) at the time of the upload.
    pub modified_ms: u64,
    /// RFC3339 timestamp of the successful upload.
    pub last_processed: String,
}

impl TrackerEntry {
    fn matches(&self, signature: &FileSignature) -> bool {
        self.path == signature.path
            && self.size == signature.size
            && self.modified_ms == signature.modified_ms
    }
}

/// In-memory view of the tracker store, keyed by normalized path.
#[derive(Debug)]
pub struct Tracker {
    store_path: PathBuf,
    entries: BTreeMap<String, TrackerEntry>,
}

impl Tracker {
    /// Load the tracker store for a document root.
    ///
    /// A missing store yields an empty tracker; an unreadable or unparsable
    /// store is an error, since guessing here would cause silent reindexing or
    /// silently skipped files.
    pub fn load(root: &Path) -> Result<Self, TrackerError> {
        let store_path = store_path_for(root);
        if !store_path.exists() {
            return Ok(Self {
                store_path,
                entries: BTreeMap::new(),
            });
        }

        let raw = fs::read_to_string(&store_path).map_err(|source| TrackerError::Read {
            path: store_path.display().to_string(),
            source,
        })?;
        let entries = serde_json::from_str(&raw).map_err(|source| TrackerError::Parse {
            path: store_path.display().to_string(),
            source,
        })?;
        Ok(Self {
            store_path,
            entries,
        })
    }

    /// Location of the backing JSON file.
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Number of tracked files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tracker holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the descriptor's current signature matches the stored one.
    pub fn is_processed(&self, descriptor: &FileDescriptor) -> bool {
        let signature = FileSignature::from(descriptor);
        self.entries
            .get(&signature.path)
            .map(|entry| entry.matches(&signature))
            .unwrap_or(false)
    }

    /// Record a fully uploaded file version. In-memory until [`Tracker::save`].
    pub fn mark_processed(&mut self, descriptor: &FileDescriptor) {
        let signature = FileSignature::from(descriptor);
        let entry = TrackerEntry {
            path: signature.path.clone(),
            size: signature.size,
            modified_ms: signature.modified_ms,
            last_processed: now_rfc3339(),
        };
        self.entries.insert(signature.path, entry);
    }

    /// Remove a file's entry, returning whether one existed.
    pub fn mark_unprocessed(&mut self, path: &str) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Persist the current entries.
    ///
    /// Writes a sibling temp file and renames it into place, so a crash mid-save
    /// leaves the previous store intact rather than a truncated one.
    pub fn save(&self) -> Result<(), TrackerError> {
        let serialized =
            serde_json::to_string_pretty(&self.entries).map_err(|source| TrackerError::Write {
                path: self.store_path.display().to_string(),
                source: std::io::Error::other(source),
            })?;

        let mut temp_path = self.store_path.as_os_str().to_owned();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        fs::write(&temp_path, serialized).map_err(|source| TrackerError::Write {
            path: temp_path.display().to_string(),
            source,
        })?;
        fs::rename(&temp_path, &self.store_path).map_err(|source| TrackerError::Write {
            path: self.store_path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    /// Drop every entry and delete the backing file. Used by force reset.
    pub fn clear(&mut self) -> Result<(), TrackerError> {
        self.entries.clear();
        if self.store_path.exists() {
            fs::remove_file(&self.store_path).map_err(|source| TrackerError::Write {
                path: self.store_path.display().to_string(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Resolve the store location for a root: inside a directory root, or beside a
/// single-file root.
fn store_path_for(root: &Path) -> PathBuf {
    let normalized = normalize_path(root);
    if normalized.is_file() {
        return match normalized.parent() {
            Some(parent) => parent.join(TRACKER_FILE_NAME),
            None => PathBuf::from(TRACKER_FILE_NAME),
        };
    }
    normalized.join(TRACKER_FILE_NAME)
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("unknown"))
}
