//! PDF text extraction using lopdf.
//!
//! Digital PDFs yield text directly from the content streams. Scanned PDFs
//! carry each page as an embedded image XObject; those pages fall back to
//! the vision OCR engine. Pages are joined with markers so provenance
//! survives aggregation.

use lopdf::{Document, Object, ObjectId};

use super::ocr::OcrEngine;
use super::ExtractionError;

/// Minimum characters of direct text before a page is trusted without OCR.
/// Scanned PDFs often carry a few stray glyphs from stamps or headers.
const MIN_DIRECT_TEXT_CHARS: usize = 20;

pub fn extract_pdf_text(pdf_bytes: &[u8], ocr: &dyn OcrEngine) -> Result<String, ExtractionError> {
    let doc = Document::load_mem(pdf_bytes)
        .map_err(|e| ExtractionError::PdfParsing(format!("Failed to parse PDF: {e}")))?;

    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(ExtractionError::PdfParsing("PDF has no pages".into()));
    }

    let mut sections = Vec::with_capacity(pages.len());
    let mut extracted_any = false;

    for (&page_number, &page_id) in &pages {
        let text = extract_page_text(&doc, page_number, page_id, ocr)?;
        if !text.trim().is_empty() {
            extracted_any = true;
        }
        sections.push(format!("=== Page {page_number} ===\n{}", text.trim()));
    }

    if !extracted_any {
        return Err(ExtractionError::PdfParsing(
            "No text could be extracted from any page".into(),
        ));
    }

    Ok(sections.join("\n\n"))
}

fn extract_page_text(
    doc: &Document,
    page_number: u32,
    page_id: ObjectId,
    ocr: &dyn OcrEngine,
) -> Result<String, ExtractionError> {
    let direct = doc.extract_text(&[page_number]).unwrap_or_default();
    if direct.trim().len() >= MIN_DIRECT_TEXT_CHARS {
        return Ok(direct);
    }

    // Sparse or absent text layer. If the page carries an embedded scan,
    // OCR it; otherwise keep whatever the text layer gave us.
    match extract_largest_page_image(doc, page_id) {
        Some(image_bytes) => {
            tracing::debug!(
                page = page_number,
                image_size = image_bytes.len(),
                "Falling back to OCR for scanned page"
            );
            ocr.recognize(&image_bytes)
        }
        None => Ok(direct),
    }
}

/// Find the largest JPEG image XObject on a page.
///
/// Walks: page dict -> /Resources -> /XObject -> /Subtype /Image entries.
/// Only DCTDecode (JPEG) streams are usable as-is; the OCR endpoint accepts
/// JPEG bytes directly.
fn extract_largest_page_image(doc: &Document, page_id: ObjectId) -> Option<Vec<u8>> {
    let page_dict = doc.get_object(page_id).ok()?.as_dict().ok()?;
    let resources = resolve_dict_entry(doc, page_dict, b"Resources")?;
    let xobjects = resolve_dict_entry(doc, resources, b"XObject")?;

    let mut largest: Option<Vec<u8>> = None;

    for (_name, obj_ref) in xobjects.iter() {
        let xobj = match obj_ref {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(obj) => obj,
                Err(_) => continue,
            },
            other => other,
        };
        let stream = match xobj {
            Object::Stream(ref s) => s,
            _ => continue,
        };
        if !is_image_subtype(&stream.dict) || !is_jpeg_stream(&stream.dict) {
            continue;
        }

        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        if largest.as_ref().map_or(true, |prev| content.len() > prev.len()) {
            largest = Some(content);
        }
    }

    largest
}

fn is_image_subtype(dict: &lopdf::Dictionary) -> bool {
    dict.get(b"Subtype")
        .map(|obj| matches!(obj, Object::Name(ref n) if n == b"Image"))
        .unwrap_or(false)
}

fn is_jpeg_stream(dict: &lopdf::Dictionary) -> bool {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => n == b"DCTDecode",
        Ok(Object::Array(arr)) => arr
            .iter()
            .any(|o| matches!(o, Object::Name(ref n) if n == b"DCTDecode")),
        _ => false,
    }
}

fn resolve_dict_entry<'a>(
    doc: &'a Document,
    dict: &'a lopdf::Dictionary,
    key: &[u8],
) -> Option<&'a lopdf::Dictionary> {
    let obj = dict.get(key).ok()?;
    let resolved = match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    resolved.as_dict().ok()
}
