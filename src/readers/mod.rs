//! Content readers that turn supported files into plain text.
//!
//! Each [`FileKind`] maps to one [`ContentReader`] implementation through a
//! registry, so the processing strategy never branches on file types itself and
//! tests can swap in failing or canned readers.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::discovery::FileKind;

mod office;

pub use office::{DocxReader, PptxReader};

/// Errors raised while extracting text from a file.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The file could not be read from disk.
    #[error("Failed to read {path}")]
    Io {
        /// File that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file was readable but its content could not be extracted.
    #[error("Failed to extract text from {path}: {message}")]
    Extract {
        /// File that failed to extract.
        path: String,
        /// Description of the extraction failure.
        message: String,
    },
}

/// Interface implemented by per-format text extractors.
pub trait ContentReader: Send + Sync {
    /// Extract the plain-text content of `path`.
    fn read(&self, path: &Path) -> Result<String, ReaderError>;
}

/// Maps file kinds to their reader implementation.
pub struct ReaderRegistry {
    readers: HashMap<FileKind, Box<dyn ContentReader>>,
}

impl ReaderRegistry {
    /// An empty registry; useful for tests that register bespoke readers.
    pub fn empty() -> Self {
        Self {
            readers: HashMap::new(),
        }
    }

    /// Registry covering every supported file kind.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(FileKind::Markdown, Box::new(MarkdownReader));
        registry.register(FileKind::Text, Box::new(PlainTextReader));
        registry.register(FileKind::Document, Box::new(DocxReader));
        registry.register(FileKind::Presentation, Box::new(PptxReader));
        registry
    }

    /// Install or replace the reader for a kind.
    pub fn register(&mut self, kind: FileKind, reader: Box<dyn ContentReader>) {
        self.readers.insert(kind, reader);
    }

    /// Look up the reader for a kind.
    pub fn reader_for(&self, kind: FileKind) -> Option<&dyn ContentReader> {
        self.readers.get(&kind).map(Box::as_ref)
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Reader for markdown sources. Markdown is indexed as-is; heading structure is
/// interpreted later during metadata extraction, not here.
pub struct MarkdownReader;

impl ContentReader for MarkdownReader {
    fn read(&self, path: &Path) -> Result<String, ReaderError> {
        read_lossy(path)
    }
}

/// Reader for plain-text files.
pub struct PlainTextReader;

impl ContentReader for PlainTextReader {
    fn read(&self, path: &Path) -> Result<String, ReaderError> {
        read_lossy(path)
    }
}

/// Read a file as UTF-8, replacing invalid sequences rather than failing: a
/// stray byte in a notes file should not knock the file out of the index.
fn read_lossy(path: &Path) -> Result<String, ReaderError> {
    let bytes = std::fs::read(path).map_err(|source| ReaderError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_all_supported_kinds() {
        let registry = ReaderRegistry::with_defaults();
        for kind in [
            FileKind::Markdown,
            FileKind::Text,
            FileKind::Document,
            FileKind::Presentation,
        ] {
            assert!(registry.reader_for(kind).is_some(), "missing {kind:?}");
        }
        assert!(registry.reader_for(FileKind::Unknown).is_none());
    }

    #[test]
    fn plain_text_reader_tolerates_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, [b'o', b'k', 0xFF, b'!']).unwrap();

        let content = PlainTextReader.read(&path).unwrap();
        assert!(content.starts_with("ok"));
        assert!(content.ends_with('!'));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MarkdownReader
            .read(&dir.path().join("absent.md"))
            .unwrap_err();
        assert!(matches!(err, ReaderError::Io { .. }));
    }

    #[test]
    fn registered_reader_replaces_default() {
        struct Canned;
        impl ContentReader for Canned {
            fn read(&self, _path: &Path) -> Result<String, ReaderError> {
                Ok("canned".to_string())
            }
        }

        let mut registry = ReaderRegistry::with_defaults();
        registry.register(FileKind::Markdown, Box::new(Canned));
        let reader = registry.reader_for(FileKind::Markdown).unwrap();
        assert_eq!(reader.read(Path::new("ignored.md")).unwrap(), "canned");
    }
}
