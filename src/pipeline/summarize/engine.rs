use std::sync::Arc;

use super::client::LlmClient;
use super::parser::parse_summary_response;
use super::prompt::{build_summary_prompt, SUMMARY_SYSTEM_PROMPT};
use super::SummarizeError;
use crate::models::StructuredSummary;
use crate::pipeline::aggregate::Corpus;

/// Drives one corpus through the model and validates the result.
pub struct SummarizationEngine {
    llm: Arc<dyn LlmClient>,
    max_corpus_chars: usize,
}

impl SummarizationEngine {
    pub fn new(llm: Arc<dyn LlmClient>, max_corpus_chars: usize) -> Self {
        Self { llm, max_corpus_chars }
    }

    pub fn summarize(&self, corpus: &Corpus) -> Result<StructuredSummary, SummarizeError> {
        let _span = tracing::info_span!(
            "summarize",
            patient_id = %corpus.patient_id,
            documents = corpus.items.len(),
            corpus_chars = corpus.total_chars(),
        )
        .entered();
        let start = std::time::Instant::now();

        let prompt = build_summary_prompt(corpus, self.max_corpus_chars);
        let response = self.llm.complete(SUMMARY_SYSTEM_PROMPT, &prompt)?;
        let summary = parse_summary_response(&response)?;

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            red_flags = summary.red_flags.len(),
            lab_results = summary.lab_results.len(),
            medications = summary.medications.len(),
            "Summarization complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RedFlagSeverity;
    use crate::pipeline::aggregate::CorpusItem;
    use crate::pipeline::summarize::client::MockLlmClient;
    use uuid::Uuid;

    fn one_doc_corpus() -> Corpus {
        Corpus {
            patient_id: Uuid::new_v4(),
            items: vec![CorpusItem {
                document_id: Uuid::new_v4(),
                file_name: "labs.pdf".to_string(),
                uploaded_at: chrono::Utc::now().naive_utc(),
                text: "Potassium 6.1 mmol/L (3.5-5.0)".to_string(),
            }],
        }
    }

    const MODEL_RESPONSE: &str = r#"```json
{
    "narrative": "Hyperkalemia documented on most recent labs.",
    "red_flags": [
        {"category": "electrolytes", "finding": "Potassium above range", "severity": "high", "measured_value": "6.1 mmol/L"}
    ],
    "lab_results": {
        "potassium": {"value": "6.1", "unit": "mmol/L", "reference_range": "3.5-5.0"}
    },
    "medications": []
}
```"#;

    #[test]
    fn engine_produces_structured_summary() {
        let engine = SummarizationEngine::new(Arc::new(MockLlmClient::new(MODEL_RESPONSE)), 16_000);
        let summary = engine.summarize(&one_doc_corpus()).unwrap();
        assert_eq!(summary.red_flags[0].severity, RedFlagSeverity::High);
        assert_eq!(summary.lab_results["potassium"].value, "6.1");
    }

    #[test]
    fn client_failure_propagates() {
        let engine =
            SummarizationEngine::new(Arc::new(MockLlmClient::unreachable()), 16_000);
        let err = engine.summarize(&one_doc_corpus()).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn schema_violation_propagates() {
        let engine = SummarizationEngine::new(
            Arc::new(MockLlmClient::new("{\"narrative\": \"missing the rest\"}")),
            16_000,
        );
        let err = engine.summarize(&one_doc_corpus()).unwrap_err();
        assert!(matches!(err, SummarizeError::MalformedOutput(_)));
    }
}
