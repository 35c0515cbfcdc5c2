//! Text extraction from OOXML word processing files (.docx).
//!
//! A .docx is a zip archive with the body text in word/document.xml. The
//! markup is stripped with a tag regex after paragraph and line-break
//! elements are turned into newlines. Legacy binary .doc is not handled
//! here at all.

use std::io::{Cursor, Read};
use std::sync::OnceLock;

use regex::Regex;

use super::ExtractionError;

const DOCUMENT_XML: &str = "word/document.xml";

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid tag regex"))
}

pub fn extract_docx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractionError::WordXml(format!("Not a valid docx archive: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_XML)
        .map_err(|e| ExtractionError::WordXml(format!("Missing {DOCUMENT_XML}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractionError::WordXml(format!("Failed to read {DOCUMENT_XML}: {e}")))?;

    let text = strip_markup(&xml);
    if text.trim().is_empty() {
        return Err(ExtractionError::WordXml(
            "Document body contains no text".to_string(),
        ));
    }
    Ok(text)
}

fn strip_markup(xml: &str) -> String {
    // Paragraph ends and explicit breaks become newlines before tags are
    // stripped, so runs inside one paragraph stay joined.
    let with_breaks = xml
        .replace("</w:p>", "\n")
        .replace("<w:br/>", "\n")
        .replace("<w:tab/>", "\t");

    let stripped = tag_regex().replace_all(&with_breaks, "");
    let decoded = decode_entities(&stripped);

    decoded
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
