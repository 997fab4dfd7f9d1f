//! Payload metadata derived from a document's location and content.

use std::path::{Component, Path};

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::discovery::FileDescriptor;

use super::types::DocumentMetadata;

/// Derive the shared payload attributes for one discovered file.
///
/// `root` is the normalized document root the indexing run was started with.
/// Tags, category, and context describe where the file sits beneath it: tags
/// are lowercased for filtering, while category and context keep the original
/// directory casing.
pub(crate) fn extract_metadata(
    descriptor: &FileDescriptor,
    root: &Path,
    content: &str,
) -> DocumentMetadata {
    let relative_dirs = relative_directories(&descriptor.path, root);
    let file_type = descriptor.kind.as_str().to_string();

    let mut tags: Vec<String> = relative_dirs
        .iter()
        .map(|component| component.to_lowercase())
        .collect();
    tags.push(file_type.clone());
    tags.sort();
    tags.dedup();

    let category = relative_dirs
        .first()
        .cloned()
        .unwrap_or_else(|| "general".to_string());
    let context = if relative_dirs.is_empty() {
        "root".to_string()
    } else {
        relative_dirs.join("/")
    };

    DocumentMetadata {
        title: extract_title(content, &descriptor.path),
        tags,
        category,
        context,
        file_type,
        last_modified: format_modified(descriptor.modified_ms),
    }
}

/// Directory components between the root and the file, in order.
fn relative_directories(path: &Path, root: &Path) -> Vec<String> {
    let Ok(relative) = path.strip_prefix(root) else {
        return Vec::new();
    };
    let Some(parent) = relative.parent() else {
        return Vec::new();
    };
    parent
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// First Markdown-style heading in the content, or the file stem.
fn extract_title(content: &str, path: &Path) -> String {
    content
        .lines()
        .map(str::trim)
        .find_map(|line| {
            line.strip_prefix("# ")
                .map(str::trim)
                .filter(|heading| !heading.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| fallback_title(path))
}

fn fallback_title(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_string())
}

fn format_modified(modified_ms: u64) -> String {
    let nanos = i128::from(modified_ms) * 1_000_000;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|timestamp| timestamp.format(&Rfc3339).ok())
        .unwrap_or_default()
}
