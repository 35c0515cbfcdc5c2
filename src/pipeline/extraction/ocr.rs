//! Vision OCR engine for image-based documents.
//!
//! Scanned pages and photos go through a local vision model speaking the
//! Ollama generate API. The engine is a trait so the processor can be
//! tested without a running model server.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::ExtractionError;
use crate::config::PipelineConfig;

const OCR_SYSTEM_PROMPT: &str = "\
You are a clinical document text extractor. Extract ALL visible text from \
the provided document image, preserving reading order. Transcribe tables \
row by row. Do not summarize, interpret, or omit values.";

const OCR_USER_PROMPT: &str = "\
Extract all visible text from this document image. Output only the \
transcribed text, nothing else.";

pub trait OcrEngine: Send + Sync {
    /// Recognize text in a single image.
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Production OCR engine backed by an Ollama-compatible vision endpoint.
pub struct HttpVisionOcr {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct VisionGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    images: Vec<String>,
    stream: bool,
}

#[derive(Deserialize)]
struct VisionGenerateResponse {
    response: String,
}

impl HttpVisionOcr {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, ExtractionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Ocr(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, ExtractionError> {
        Self::new(&config.ocr_base_url, &config.ocr_model, config.ocr_timeout_secs)
    }
}

impl OcrEngine for HttpVisionOcr {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, ExtractionError> {
        let _span = tracing::info_span!(
            "vision_ocr",
            model = %self.model,
            image_size = image_bytes.len(),
        )
        .entered();
        let start = std::time::Instant::now();

        let encoded = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        let url = format!("{}/api/generate", self.base_url);
        let body = VisionGenerateRequest {
            model: &self.model,
            prompt: OCR_USER_PROMPT,
            system: OCR_SYSTEM_PROMPT,
            images: vec![encoded],
            stream: false,
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                ExtractionError::Ocr(format!("OCR endpoint unreachable at {}", self.base_url))
            } else if e.is_timeout() {
                ExtractionError::Ocr(format!("OCR timed out after {}s", self.timeout_secs))
            } else {
                ExtractionError::Ocr(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractionError::Ocr(format!(
                "OCR endpoint returned {status}: {body}"
            )));
        }

        let parsed: VisionGenerateResponse = response
            .json()
            .map_err(|e| ExtractionError::Ocr(format!("Malformed OCR response: {e}")))?;

        let text = parsed.response.trim().to_string();
        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            text_len = text.len(),
            "Vision OCR complete"
        );
        Ok(text)
    }
}

/// Mock OCR engine for testing. Returns a fixed response, or fails when
/// constructed with `failing`.
pub struct MockOcrEngine {
    response: String,
    fail_with: Option<String>,
}

impl MockOcrEngine {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            fail_with: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: String::new(),
            fail_with: Some(message.to_string()),
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, ExtractionError> {
        match &self.fail_with {
            Some(message) => Err(ExtractionError::Ocr(message.clone())),
            None => Ok(self.response.clone()),
        }
    }
}
