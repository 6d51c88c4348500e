//! Per-format text extraction for uploaded files.
//!
//! Office formats are zip archives of XML; the extractors pull the text
//! runs out with tag stripping rather than a full XML parse, which is
//! enough for retrieval purposes. Images return no text here; they go
//! through OCR instead.

use std::io::Read;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use docbase_core::{Error, Result};

/// Supported upload kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Pdf,
    Docx,
    Xlsx,
    Pptx,
    Image,
    Unknown,
}

impl FileKind {
    /// Detect from a lowercase extension without the dot.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "txt" | "md" => Self::Text,
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "xlsx" => Self::Xlsx,
            "pptx" => Self::Pptx,
            "jpg" | "jpeg" | "png" | "tiff" | "bmp" => Self::Image,
            _ => Self::Unknown,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image)
    }
}

/// Extract text from a file according to its extension.
///
/// `Ok(None)` means the format carries no extractable text (images, or
/// documents whose text layer is empty); extraction failures on a
/// recognised format are real errors.
pub fn extract_text(path: &Path) -> Result<Option<String>> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match FileKind::from_extension(ext) {
        FileKind::Text => extract_plain_text(path),
        FileKind::Pdf => extract_pdf(path),
        FileKind::Docx => extract_docx(path),
        FileKind::Xlsx => extract_xlsx(path),
        FileKind::Pptx => extract_pptx(path),
        FileKind::Image => Ok(None),
        FileKind::Unknown => {
            warn!("No text extractor for extension {:?}", ext);
            Ok(None)
        }
    }
}

fn extract_plain_text(path: &Path) -> Result<Option<String>> {
    let bytes = std::fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes).into_owned();
    Ok(non_empty(content))
}

fn extract_pdf(path: &Path) -> Result<Option<String>> {
    let text = pdf_extract::extract_text(path)
        .map_err(|e| Error::Extraction(format!("PDF extraction failed: {}", e)))?;
    Ok(non_empty(text))
}

static XML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static SLIDE_TEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<a:t>([^<]*)</a:t>").unwrap());
static SHARED_STRING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<t(?: [^>]*)?>([^<]*)</t>").unwrap());

fn extract_docx(path: &Path) -> Result<Option<String>> {
    let xml = read_zip_entry(path, "word/document.xml")?;
    // Paragraph closes become newlines before the tags are dropped.
    let with_breaks = xml.replace("</w:p>", "</w:p>\n");
    let text = XML_TAG_RE.replace_all(&with_breaks, "");
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    Ok(non_empty(decode_entities(&lines.join("\n"))))
}

fn extract_pptx(path: &Path) -> Result<Option<String>> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| Error::Extraction(format!("Not a pptx archive: {}", e)))?;

    // Slide entries are ppt/slides/slideN.xml; collect and order by N.
    let mut slide_names: Vec<String> = (0..archive.len())
        .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_string()))
        .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
        .collect();
    slide_names.sort_by_key(|name| slide_number(name));

    let mut sections = Vec::new();
    for (idx, name) in slide_names.iter().enumerate() {
        let mut entry = archive
            .by_name(name)
            .map_err(|e| Error::Extraction(e.to_string()))?;
        let mut xml = String::new();
        entry.read_to_string(&mut xml)?;

        let runs: Vec<String> = SLIDE_TEXT_RE
            .captures_iter(&xml)
            .map(|cap| decode_entities(&cap[1]))
            .filter(|t| !t.trim().is_empty())
            .collect();
        if !runs.is_empty() {
            sections.push(format!("--- Slide {} ---\n{}", idx + 1, runs.join("\n")));
        }
    }
    Ok(non_empty(sections.join("\n\n")))
}

fn extract_xlsx(path: &Path) -> Result<Option<String>> {
    // Cell text lives in the shared-strings table; that is the part worth
    // indexing without replaying cell references.
    let xml = match read_zip_entry(path, "xl/sharedStrings.xml") {
        Ok(xml) => xml,
        Err(_) => return Ok(None),
    };
    let values: Vec<String> = SHARED_STRING_RE
        .captures_iter(&xml)
        .map(|cap| decode_entities(&cap[1]))
        .filter(|t| !t.trim().is_empty())
        .collect();
    Ok(non_empty(values.join("\n")))
}

fn read_zip_entry(path: &Path, entry_name: &str) -> Result<String> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| Error::Extraction(format!("Not a zip archive: {}", e)))?;
    let mut entry = archive
        .by_name(entry_name)
        .map_err(|e| Error::Extraction(format!("Missing {}: {}", entry_name, e)))?;
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(content)
}

fn slide_number(name: &str) -> u32 {
    name.trim_start_matches("ppt/slides/slide")
        .trim_end_matches(".xml")
        .parse()
        .unwrap_or(0)
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn plain_text_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "line one\nline two").unwrap();
        assert_eq!(
            extract_text(&path).unwrap().as_deref(),
            Some("line one\nline two")
        );
    }

    #[test]
    fn images_carry_no_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, [0x89, 0x50, 0x4e, 0x47]).unwrap();
        assert!(extract_text(&path).unwrap().is_none());
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.docx");
        write_zip(
            &path,
            &[(
                "word/document.xml",
                "<w:document><w:body>\
                 <w:p><w:r><w:t>First paragraph</w:t></w:r></w:p>\
                 <w:p><w:r><w:t>Second &amp; third</w:t></w:r></w:p>\
                 </w:body></w:document>",
            )],
        );
        let text = extract_text(&path).unwrap().unwrap();
        assert_eq!(text, "First paragraph\nSecond & third");
    }

    #[test]
    fn pptx_slides_in_order_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.pptx");
        write_zip(
            &path,
            &[
                ("ppt/slides/slide2.xml", "<p:sld><a:t>Later slide</a:t></p:sld>"),
                ("ppt/slides/slide1.xml", "<p:sld><a:t>Title slide</a:t></p:sld>"),
            ],
        );
        let text = extract_text(&path).unwrap().unwrap();
        let title_pos = text.find("Title slide").unwrap();
        let later_pos = text.find("Later slide").unwrap();
        assert!(title_pos < later_pos);
        assert!(text.contains("--- Slide 1 ---"));
    }

    #[test]
    fn xlsx_shared_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.xlsx");
        write_zip(
            &path,
            &[(
                "xl/sharedStrings.xml",
                "<sst><si><t>Revenue</t></si><si><t xml:space=\"preserve\">Q1 2026</t></si></sst>",
            )],
        );
        let text = extract_text(&path).unwrap().unwrap();
        assert_eq!(text, "Revenue\nQ1 2026");
    }
}
