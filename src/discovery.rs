//! Filesystem discovery of indexable documents.
//!
//! Walks a root path (single file or directory tree), classifies entries by
//! extension, and captures the size and modification time that later feed the
//! idempotency check. Unsupported files are excluded silently and surface only
//! as an aggregate count.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Errors raised while scanning a document root.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The root path does not exist.
    #[error("Document root not found: {path}")]
    RootNotFound {
        /// Path that was requested.
        path: String,
    },
    /// A directory entry could not be visited.
    #[error("Failed to walk document root")]
    Walk(#[from] walkdir::Error),
    /// Filesystem metadata could not be read for a candidate file.
    #[error("Failed to read metadata for {path}")]
    Metadata {
        /// File the metadata lookup failed for.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Supported document categories, detected from the file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Markdown sources (`.md`, `.markdown`).
    Markdown,
    /// Plain text (`.txt`, `.text`).
    Text,
    /// Word documents (`.docx`).
    Document,
    /// PowerPoint presentations (`.pptx`).
    Presentation,
    /// Anything else; excluded from processing.
    Unknown,
}

impl FileKind {
    /// Classify a path by its extension, case-insensitively.
    pub fn from_path(path: &Path) -> Self {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return Self::Unknown;
        };
        match extension.to_ascii_lowercase().as_str() {
            "md" | "markdown" => Self::Markdown,
            "txt" | "text" => Self::Text,
            "docx" => Self::Document,
            "pptx" => Self::Presentation,
            _ => Self::Unknown,
        }
    }

    /// Stable lowercase label used in payloads and metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Text => "text",
            Self::Document => "document",
            Self::Presentation => "presentation",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the pipeline knows how to read this kind of file.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered file, captured with the filesystem state the idempotency
/// check compares against.
#[derive(Clone, Debug)]
pub struct FileDescriptor {
    /// Normalized absolute path.
    pub path: PathBuf,
    /// Detected document category.
    pub kind: FileKind,
    /// Size in bytes at discovery time.
    pub size: u64,
    /// Last-modified timestamp in unix milliseconds at discovery time.
    pub modified_ms: u64,
}

impl FileDescriptor {
    /// The tracker key for this file.
    pub fn normalized_path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Result of a discovery pass.
#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    /// Supported files, sorted by path for reproducible run logs.
    pub files: Vec<FileDescriptor>,
    /// Number of files excluded because their extension is unsupported.
    pub unsupported: usize,
}

/// Scan `root` (a file or a directory) for supported documents.
///
/// Hidden entries (dot-prefixed names) are skipped, which also keeps the
/// tracker store itself out of its own corpus. Files are returned sorted by
/// path; unsupported files are counted, never listed.
pub fn discover(root: &Path) -> Result<DiscoveryOutcome, DiscoveryError> {
    if !root.exists() {
        return Err(DiscoveryError::RootNotFound {
            path: root.display().to_string(),
        });
    }

    let mut outcome = DiscoveryOutcome::default();

    if root.is_file() {
        // An explicitly named file is indexed even when dot-prefixed.
        match describe(root)? {
            Some(descriptor) => outcome.files.push(descriptor),
            None => outcome.unsupported += 1,
        }
        return Ok(outcome);
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        match describe(entry.path())? {
            Some(descriptor) => outcome.files.push(descriptor),
            None => outcome.unsupported += 1,
        }
    }

    outcome.files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(outcome)
}

/// Build a descriptor for one candidate path, or `None` when unsupported.
fn describe(path: &Path) -> Result<Option<FileDescriptor>, DiscoveryError> {
    let kind = FileKind::from_path(path);
    if !kind.is_supported() {
        return Ok(None);
    }

    let metadata = std::fs::metadata(path).map_err(|source| DiscoveryError::Metadata {
        path: path.display().to_string(),
        source,
    })?;
    let modified_ms = metadata
        .modified()
        .map_err(|source| DiscoveryError::Metadata {
            path: path.display().to_string(),
            source,
        })?
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;

    Ok(Some(FileDescriptor {
        path: normalize_path(path),
        kind,
        size: metadata.len(),
        modified_ms,
    }))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Resolve a path to its canonical absolute form.
///
/// Falls back to a lexical absolute path when the file no longer exists, so
/// cleanup of already-deleted files still produces stable tracker keys.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn classifies_extensions_case_insensitively() {
        assert_eq!(FileKind::from_path(Path::new("a/b.md")), FileKind::Markdown);
        assert_eq!(
            FileKind::from_path(Path::new("slides.PPTX")),
            FileKind::Presentation
        );
        assert_eq!(
            FileKind::from_path(Path::new("report.Docx")),
            FileKind::Document
        );
        assert_eq!(FileKind::from_path(Path::new("notes.text")), FileKind::Text);
        assert_eq!(FileKind::from_path(Path::new("image.png")), FileKind::Unknown);
        assert_eq!(FileKind::from_path(Path::new("Makefile")), FileKind::Unknown);
    }

    #[test]
    fn discovers_supported_files_sorted_and_counts_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/z.md"), "# z").unwrap();
        fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        fs::write(dir.path().join("skip.png"), [0u8; 4]).unwrap();

        let outcome = discover(dir.path()).unwrap();
        assert_eq!(outcome.unsupported, 1);
        let names: Vec<_> = outcome
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "z.md"]);
        assert!(outcome.files.iter().all(|f| f.size > 0));
    }

    #[test]
    fn skips_hidden_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/config.md"), "# hidden").unwrap();
        fs::write(dir.path().join(".docdex-tracker.json"), "{}").unwrap();
        fs::write(dir.path().join("visible.md"), "# hello").unwrap();

        let outcome = discover(dir.path()).unwrap();
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.unsupported, 0);
        assert!(outcome.files[0].path.ends_with("visible.md"));
    }

    #[test]
    fn accepts_a_single_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("only.md");
        fs::write(&file, "# only").unwrap();

        let outcome = discover(&file).unwrap();
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].kind, FileKind::Markdown);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            discover(&missing),
            Err(DiscoveryError::RootNotFound { .. })
        ));
    }
}
