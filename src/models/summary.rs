use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::RedFlagSeverity;

/// A structured clinical finding flagged as noteworthy or abnormal.
///
/// Value object owned by its summary; it has no identity of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedFlag {
    pub category: String,
    pub finding: String,
    pub severity: RedFlagSeverity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measured_value: Option<String>,
}

/// One lab result as reported by the summarization step, keyed by test name
/// in the owning summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabValue {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_range: Option<String>,
}

/// One medication entry extracted into a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dosage: Option<String>,
}

/// Schema-conformant output of one summarization run, before versioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredSummary {
    pub narrative: String,
    pub red_flags: Vec<RedFlag>,
    pub lab_results: BTreeMap<String, LabValue>,
    pub medications: Vec<MedicationEntry>,
}

/// One versioned clinical summary for a patient.
///
/// Immutable once created. Superseded (never deleted) when a newer summary
/// is published: the prior latest flips `is_latest` to false in the same
/// transaction that inserts the successor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub created_by: Uuid,
    pub narrative: String,
    pub red_flags: Vec<RedFlag>,
    pub lab_results: BTreeMap<String, LabValue>,
    pub medications: Vec<MedicationEntry>,
    pub version: i64,
    pub is_latest: bool,
    pub created_at: NaiveDateTime,
}

impl Summary {
    /// Materialize a structured summary as a versioned row.
    pub fn from_structured(
        patient_id: Uuid,
        created_by: Uuid,
        structured: StructuredSummary,
        version: i64,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            created_by,
            narrative: structured.narrative,
            red_flags: structured.red_flags,
            lab_results: structured.lab_results,
            medications: structured.medications,
            version,
            is_latest: true,
            created_at,
        }
    }
}
