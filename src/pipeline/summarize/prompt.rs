use crate::pipeline::aggregate::Corpus;

pub const SUMMARY_SYSTEM_PROMPT: &str = r#"
You are a clinical summarization assistant. You read the full text of a
patient's medical documents and produce one consolidated summary.

RULES — ABSOLUTE, NO EXCEPTIONS:
1. Use ONLY information explicitly present in the documents.
2. NEVER invent findings, values, medications, or dates.
3. Preserve exact measured values (doses, lab values) verbatim.
4. Flag any value outside its stated reference range as a red flag.
5. If a field is unknown, use null. Do not guess.
6. Output MUST be a single JSON object wrapped in ```json``` fences,
   matching the requested schema exactly. No prose outside the fences.
"#;

const SCHEMA_BLOCK: &str = r#"```json
{
  "narrative": "3-6 sentence clinical overview of the patient's situation",
  "red_flags": [
    {
      "category": "e.g., hematology, cardiology, electrolytes",
      "finding": "what is abnormal and why it matters",
      "severity": "critical | high | medium | low",
      "measured_value": "the exact value from the document, or null"
    }
  ],
  "lab_results": {
    "test_name": {
      "value": "measured value as written",
      "unit": "unit or null",
      "reference_range": "range as written or null"
    }
  },
  "medications": [
    {"name": "medication name", "dosage": "dose and frequency, or null"}
  ]
}
```"#;

const DOCUMENT_SEPARATOR: &str = "\n\n---\n\n";
const TRUNCATION_NOTICE: &str = "\n[corpus truncated]";

/// Assemble the user prompt for one summarization run.
///
/// Each document is wrapped in a tagged block so the model can attribute
/// findings. The corpus is truncated at a char boundary when it exceeds
/// `max_corpus_chars`; earlier documents are kept because they establish
/// baseline values the later ones reference.
pub fn build_summary_prompt(corpus: &Corpus, max_corpus_chars: usize) -> String {
    let blocks: Vec<String> = corpus
        .items
        .iter()
        .map(|item| format!("<document name=\"{}\">\n{}\n</document>", item.file_name, item.text))
        .collect();

    let mut body = blocks.join(DOCUMENT_SEPARATOR);
    if body.len() > max_corpus_chars {
        let mut cut = max_corpus_chars;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str(TRUNCATION_NOTICE);
    }

    format!(
        "Summarize the patient's clinical situation from the documents below.\n\n\
         {body}\n\n\
         Respond with ONLY a JSON object in this exact structure:\n\n{SCHEMA_BLOCK}"
    )
}
