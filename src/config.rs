use std::path::PathBuf;

pub const APP_NAME: &str = "Clinident";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upload size ceiling in bytes (10 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 10_485_760;

/// File extensions accepted at upload. Acceptance here does not guarantee
/// text extraction succeeds; legacy binary `.doc` in particular is accepted
/// but fails during processing.
pub const ALLOWED_FILE_TYPES: &[&str] =
    &["pdf", "jpg", "jpeg", "png", "tiff", "doc", "docx"];

/// Runtime knobs for the ingestion and summarization pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base URL of the text-generation endpoint.
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_timeout_secs: u64,
    /// Base URL of the vision OCR endpoint.
    pub ocr_base_url: String,
    pub ocr_model: String,
    pub ocr_timeout_secs: u64,
    pub max_upload_bytes: u64,
    /// How many times a summary publish is retried on version contention.
    pub publish_retry_attempts: u32,
    /// Corpus truncation threshold fed to the summarization prompt.
    pub max_corpus_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            llm_base_url: "http://localhost:11434".to_string(),
            llm_model: "llama3.2".to_string(),
            llm_timeout_secs: 120,
            ocr_base_url: "http://localhost:11434".to_string(),
            ocr_model: "llava".to_string(),
            ocr_timeout_secs: 180,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            publish_retry_attempts: 3,
            max_corpus_chars: 16_000,
        }
    }
}

impl PipelineConfig {
    pub fn is_allowed_file_type(file_type: &str) -> bool {
        let lowered = file_type.to_lowercase();
        ALLOWED_FILE_TYPES.contains(&lowered.as_str())
    }
}

/// Default location for stored document files.
pub fn default_storage_dir() -> PathBuf {
    PathBuf::from("data").join("uploads")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_types_are_case_insensitive() {
        assert!(PipelineConfig::is_allowed_file_type("PDF"));
        assert!(PipelineConfig::is_allowed_file_type("jpeg"));
        assert!(!PipelineConfig::is_allowed_file_type("exe"));
        assert!(!PipelineConfig::is_allowed_file_type("bmp"));
        assert!(!PipelineConfig::is_allowed_file_type(""));
    }

    #[test]
    fn legacy_doc_is_accepted_at_upload() {
        assert!(PipelineConfig::is_allowed_file_type("doc"));
    }

    #[test]
    fn default_limits() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_upload_bytes, 10_485_760);
        assert_eq!(config.publish_retry_attempts, 3);
        assert!(config.max_corpus_chars > 0);
    }
}
