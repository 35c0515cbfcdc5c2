use std::collections::BTreeMap;

use serde::Deserialize;

use super::SummarizeError;
use crate::models::{LabValue, MedicationEntry, RedFlag, RedFlagSeverity, StructuredSummary};

/// Parse the model's response into a structured summary.
///
/// The JSON may arrive inside ```json``` fences or bare. All four top-level
/// fields are required; a response missing any of them is malformed and the
/// run fails rather than publishing a partial summary.
pub fn parse_summary_response(response: &str) -> Result<StructuredSummary, SummarizeError> {
    let json_str = extract_json_block(response)?;

    let raw: RawSummary = serde_json::from_str(&json_str)
        .map_err(|e| SummarizeError::MalformedOutput(e.to_string()))?;

    if raw.narrative.trim().is_empty() {
        return Err(SummarizeError::MalformedOutput("Empty narrative".into()));
    }

    let red_flags = raw
        .red_flags
        .into_iter()
        .map(raw_flag_to_model)
        .collect::<Result<Vec<_>, _>>()?;

    let lab_results = raw
        .lab_results
        .into_iter()
        .map(|(name, lab)| {
            (
                name,
                LabValue {
                    value: lab.value,
                    unit: lab.unit,
                    reference_range: lab.reference_range,
                },
            )
        })
        .collect();

    let medications = raw
        .medications
        .into_iter()
        .map(|med| MedicationEntry {
            name: med.name,
            dosage: med.dosage,
        })
        .collect();

    Ok(StructuredSummary {
        narrative: raw.narrative.trim().to_string(),
        red_flags,
        lab_results,
        medications,
    })
}

/// Find the JSON payload: fenced block if present, otherwise the outermost
/// object in the raw response.
fn extract_json_block(response: &str) -> Result<String, SummarizeError> {
    if let Some(fence_start) = response.find("```json") {
        let content_start = fence_start + 7;
        let fence_end = response[content_start..]
            .find("```")
            .ok_or_else(|| SummarizeError::MalformedOutput("Unclosed JSON fence".into()))?;
        return Ok(response[content_start..content_start + fence_end].trim().to_string());
    }

    let start = response
        .find('{')
        .ok_or_else(|| SummarizeError::MalformedOutput("No JSON object in response".into()))?;
    let end = response
        .rfind('}')
        .ok_or_else(|| SummarizeError::MalformedOutput("No JSON object in response".into()))?;
    if end < start {
        return Err(SummarizeError::MalformedOutput("No JSON object in response".into()));
    }
    Ok(response[start..=end].to_string())
}

fn raw_flag_to_model(raw: RawRedFlag) -> Result<RedFlag, SummarizeError> {
    let severity = RedFlagSeverity::from_str(&raw.severity).ok_or_else(|| {
        SummarizeError::MalformedOutput(format!("Unknown severity: {}", raw.severity))
    })?;
    Ok(RedFlag {
        category: raw.category,
        finding: raw.finding,
        severity,
        measured_value: raw.measured_value,
    })
}

// No serde defaults here on purpose: a missing field means the model did
// not follow the schema, and that must surface as a failure.
#[derive(Deserialize)]
struct RawSummary {
    narrative: String,
    red_flags: Vec<RawRedFlag>,
    lab_results: BTreeMap<String, RawLabValue>,
    medications: Vec<RawMedication>,
}

#[derive(Deserialize)]
struct RawRedFlag {
    category: String,
    finding: String,
    severity: String,
    measured_value: Option<String>,
}

#[derive(Deserialize)]
struct RawLabValue {
    value: String,
    unit: Option<String>,
    reference_range: Option<String>,
}

#[derive(Deserialize)]
struct RawMedication {
    name: String,
    dosage: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_JSON: &str = r#"{
        "narrative": "Patient has severe anemia with a downward hemoglobin trend.",
        "red_flags": [
            {
                "category": "hematology",
                "finding": "Hemoglobin well below reference range",
                "severity": "critical",
                "measured_value": "7.2 g/dL"
            }
        ],
        "lab_results": {
            "hemoglobin": {"value": "7.2", "unit": "g/dL", "reference_range": "13.5-17.5"}
        },
        "medications": [
            {"name": "Ferrous sulfate", "dosage": "325mg daily"}
        ]
    }"#;

    #[test]
    fn parses_fenced_response() {
        let response = format!("Here is the summary:\n```json\n{VALID_JSON}\n```\nDone.");
        let summary = parse_summary_response(&response).unwrap();
        assert!(summary.narrative.contains("severe anemia"));
        assert_eq!(summary.red_flags.len(), 1);
        assert_eq!(summary.red_flags[0].severity, RedFlagSeverity::Critical);
        assert_eq!(summary.lab_results["hemoglobin"].value, "7.2");
        assert_eq!(summary.medications[0].name, "Ferrous sulfate");
    }

    #[test]
    fn parses_bare_json() {
        let summary = parse_summary_response(VALID_JSON).unwrap();
        assert_eq!(summary.red_flags.len(), 1);
    }

    #[test]
    fn missing_medications_field_is_malformed() {
        let response = r#"{
            "narrative": "Stable.",
            "red_flags": [],
            "lab_results": {}
        }"#;
        let err = parse_summary_response(response).unwrap_err();
        match err {
            SummarizeError::MalformedOutput(message) => {
                assert!(message.contains("medications"), "got: {message}");
            }
            other => panic!("expected MalformedOutput, got {other:?}"),
        }
    }

    #[test]
    fn empty_narrative_is_malformed() {
        let response = r#"{
            "narrative": "   ",
            "red_flags": [],
            "lab_results": {},
            "medications": []
        }"#;
        assert!(matches!(
            parse_summary_response(response),
            Err(SummarizeError::MalformedOutput(_))
        ));
    }

    #[test]
    fn unknown_severity_is_malformed() {
        let response = r#"{
            "narrative": "Concerning labs.",
            "red_flags": [
                {"category": "labs", "finding": "bad", "severity": "catastrophic", "measured_value": null}
            ],
            "lab_results": {},
            "medications": []
        }"#;
        let err = parse_summary_response(response).unwrap_err();
        assert!(err.to_string().contains("catastrophic"));
    }

    #[test]
    fn prose_without_json_is_malformed() {
        let err = parse_summary_response("The patient is doing fine overall.").unwrap_err();
        assert!(matches!(err, SummarizeError::MalformedOutput(_)));
    }

    #[test]
    fn unclosed_fence_is_malformed() {
        let response = format!("```json\n{VALID_JSON}");
        assert!(matches!(
            parse_summary_response(&response),
            Err(SummarizeError::MalformedOutput(_))
        ));
    }

    #[test]
    fn empty_collections_are_valid() {
        let response = r#"{
            "narrative": "No abnormalities documented.",
            "red_flags": [],
            "lab_results": {},
            "medications": []
        }"#;
        let summary = parse_summary_response(response).unwrap();
        assert!(summary.red_flags.is_empty());
        assert!(summary.lab_results.is_empty());
        assert!(summary.medications.is_empty());
    }
}
