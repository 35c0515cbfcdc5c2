//! Text extraction from uploaded document files.
//!
//! Each supported format maps to one extractor; `DocumentTextExtractor`
//! dispatches on the detected file kind. Extraction is synchronous and
//! runs on the worker thread that claimed the document.

pub mod image;
pub mod ocr;
pub mod pdf;
pub mod word_xml;

use std::sync::Arc;

use thiserror::Error;

use ocr::OcrEngine;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("File is empty")]
    EmptyFile,

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("Word document parsing failed: {0}")]
    WordXml(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extractable file formats, detected from the stored file_type extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Jpeg,
    Png,
    Tiff,
    WordXml,
}

impl FileKind {
    /// Map an upload extension to an extractable kind. Returns None for
    /// extensions accepted at upload but not extractable (legacy `.doc`).
    pub fn detect(file_type: &str) -> Option<Self> {
        match file_type.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tiff" => Some(Self::Tiff),
            "docx" => Some(Self::WordXml),
            _ => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png | Self::Tiff)
    }
}

/// Format-dispatching extractor. Holds the OCR engine shared by the image
/// and scanned-PDF paths.
pub struct DocumentTextExtractor {
    ocr: Arc<dyn OcrEngine>,
}

impl DocumentTextExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }

    /// Extract text from raw file bytes.
    pub fn extract(&self, file_type: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        if bytes.is_empty() {
            return Err(ExtractionError::EmptyFile);
        }
        let kind = FileKind::detect(file_type)
            .ok_or_else(|| ExtractionError::UnsupportedFormat(file_type.to_string()))?;

        let _span = tracing::info_span!("extract_text", kind = ?kind, size = bytes.len()).entered();

        match kind {
            FileKind::Pdf => pdf::extract_pdf_text(bytes, self.ocr.as_ref()),
            FileKind::WordXml => word_xml::extract_docx_text(bytes),
            _ => image::extract_image_text(bytes, self.ocr.as_ref()),
        }
    }
}
