//! Single-image extraction. The whole file is one OCR call; an image that
//! yields no text at all is treated as unreadable rather than silently
//! completing with an empty corpus entry.

use super::ocr::OcrEngine;
use super::ExtractionError;

pub fn extract_image_text(
    image_bytes: &[u8],
    ocr: &dyn OcrEngine,
) -> Result<String, ExtractionError> {
    let text = ocr.recognize(image_bytes)?;
    if text.trim().is_empty() {
        return Err(ExtractionError::Ocr(
            "No text recognized in image".to_string(),
        ));
    }
    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::ocr::MockOcrEngine;

    #[test]
    fn recognized_text_is_trimmed() {
        let ocr = MockOcrEngine::new("  Blood pressure 180/110 mmHg\n");
        let text = extract_image_text(&[0xFF, 0xD8], &ocr).unwrap();
        assert_eq!(text, "Blood pressure 180/110 mmHg");
    }

    #[test]
    fn blank_recognition_is_an_error() {
        let ocr = MockOcrEngine::new("   \n  ");
        let err = extract_image_text(&[0xFF, 0xD8], &ocr).unwrap_err();
        assert!(matches!(err, ExtractionError::Ocr(_)));
    }

    #[test]
    fn engine_failure_propagates() {
        let ocr = MockOcrEngine::failing("timeout");
        let err = extract_image_text(&[0xFF, 0xD8], &ocr).unwrap_err();
        assert_eq!(err.to_string(), "OCR failed: timeout");
    }
}
