//! OOXML text extraction for Word documents and PowerPoint presentations.
//!
//! Both formats are ZIP archives holding XML parts; the readers pull the text
//! runs (`w:t` / `a:t`) out of the relevant parts with a streaming XML walk and
//! restore paragraph boundaries so downstream chunking sees real structure.

use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::Event;

use super::{ContentReader, ReaderError};

/// Decompression cap per archive entry; oversized entries are rejected rather
/// than inflated into memory.
const MAX_ENTRY_BYTES: u64 = 32 * 1024 * 1024;

/// Reader for Word `.docx` files.
pub struct DocxReader;

impl ContentReader for DocxReader {
    fn read(&self, path: &Path) -> Result<String, ReaderError> {
        let bytes = read_bytes(path)?;
        extract_docx(&bytes).map_err(|message| ReaderError::Extract {
            path: path.display().to_string(),
            message,
        })
    }
}

/// Reader for PowerPoint `.pptx` files.
pub struct PptxReader;

impl ContentReader for PptxReader {
    fn read(&self, path: &Path) -> Result<String, ReaderError> {
        let bytes = read_bytes(path)?;
        extract_pptx(&bytes).map_err(|message| ReaderError::Extract {
            path: path.display().to_string(),
            message,
        })
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, ReaderError> {
    std::fs::read(path).map_err(|source| ReaderError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn extract_docx(bytes: &[u8]) -> Result<String, String> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry(&mut archive, "word/document.xml")?;
    collect_text_runs(&xml)
}

fn extract_pptx(bytes: &[u8]) -> Result<String, String> {
    let mut archive = open_archive(bytes)?;

    let mut slides: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    // Entry names sort lexically (slide10 before slide2); order by slide number.
    slides.sort_by_key(|name| slide_number(name));

    let mut sections = Vec::new();
    for name in slides {
        let xml = read_entry(&mut archive, &name)?;
        let text = collect_text_runs(&xml)?;
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            sections.push(trimmed.to_string());
        }
    }
    Ok(sections.join("\n\n"))
}

fn slide_number(name: &str) -> u32 {
    name.trim_start_matches("ppt/slides/slide")
        .trim_end_matches(".xml")
        .parse()
        .unwrap_or(u32::MAX)
}

fn open_archive(bytes: &[u8]) -> Result<zip::ZipArchive<Cursor<&[u8]>>, String> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(|err| err.to_string())
}

fn read_entry(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, String> {
    let entry = archive
        .by_name(name)
        .map_err(|err| format!("{name}: {err}"))?;
    let mut out = Vec::new();
    entry
        .take(MAX_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|err| format!("{name}: {err}"))?;
    if out.len() as u64 >= MAX_ENTRY_BYTES {
        return Err(format!("{name} exceeds the {MAX_ENTRY_BYTES}-byte limit"));
    }
    Ok(out)
}

/// Collect the text runs of an OOXML part.
///
/// Text lives in `t` elements (namespace prefixes vary between formats, so
/// matching is on the local name); each closing paragraph (`w:p` / `a:p`)
/// becomes a line break.
fn collect_text_runs(xml: &[u8]) -> Result<String, String> {
    let mut reader = quick_xml::Reader::from_reader(xml);

    let mut out = String::new();
    let mut buf = Vec::new();
    let mut in_run = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) => {
                if element.local_name().as_ref() == b"t" {
                    in_run = true;
                }
            }
            Ok(Event::Text(text)) if in_run => {
                out.push_str(text.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(element)) => {
                let name = element.local_name();
                if name.as_ref() == b"t" {
                    in_run = false;
                } else if name.as_ref() == b"p" && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(err.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with_entries(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            for (name, content) in entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    fn docx_xml(paragraphs: &[&str]) -> String {
        let body: String = paragraphs
            .iter()
            .map(|text| format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>"))
            .collect();
        format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{body}</w:body></w:document>"
        )
    }

    fn slide_xml(lines: &[&str]) -> String {
        let body: String = lines
            .iter()
            .map(|text| format!("<a:p><a:r><a:t>{text}</a:t></a:r></a:p>"))
            .collect();
        format!(
            "<?xml version=\"1.0\"?><p:sld xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\">{body}</p:sld>"
        )
    }

    #[test]
    fn docx_reader_restores_paragraph_breaks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.docx");
        let xml = docx_xml(&["Alpha paragraph.", "Beta paragraph."]);
        std::fs::write(&path, zip_with_entries(&[("word/document.xml", &xml)])).unwrap();

        let text = DocxReader.read(&path).unwrap();
        assert_eq!(text, "Alpha paragraph.\nBeta paragraph.\n");
    }

    #[test]
    fn docx_reader_unescapes_entities() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("escaped.docx");
        let xml = docx_xml(&["Fish &amp; chips"]);
        std::fs::write(&path, zip_with_entries(&[("word/document.xml", &xml)])).unwrap();

        let text = DocxReader.read(&path).unwrap();
        assert_eq!(text.trim(), "Fish & chips");
    }

    #[test]
    fn docx_without_document_part_is_an_extract_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hollow.docx");
        std::fs::write(&path, zip_with_entries(&[("word/other.xml", "<x/>")])).unwrap();

        let err = DocxReader.read(&path).unwrap_err();
        assert!(matches!(err, ReaderError::Extract { .. }));
    }

    #[test]
    fn corrupt_archive_is_an_extract_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"this is not a zip archive").unwrap();

        let err = DocxReader.read(&path).unwrap_err();
        assert!(matches!(err, ReaderError::Extract { .. }));
    }

    #[test]
    fn pptx_reader_orders_slides_numerically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.pptx");
        let slide_two = slide_xml(&["Second slide"]);
        let slide_ten = slide_xml(&["Tenth slide"]);
        std::fs::write(
            &path,
            zip_with_entries(&[
                ("ppt/slides/slide10.xml", &slide_ten),
                ("ppt/slides/slide2.xml", &slide_two),
            ]),
        )
        .unwrap();

        let text = PptxReader.read(&path).unwrap();
        assert_eq!(text, "Second slide\n\nTenth slide");
    }

    #[test]
    fn pptx_without_slides_yields_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pptx");
        std::fs::write(
            &path,
            zip_with_entries(&[("ppt/presentation.xml", "<p:presentation/>")]),
        )
        .unwrap();

        let text = PptxReader.read(&path).unwrap();
        assert!(text.is_empty());
    }
}
