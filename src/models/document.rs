use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ProcessingStatus;

/// One uploaded clinical file attached to a patient record.
///
/// Invariants (enforced by the repository layer and mirrored as SQL CHECKs):
/// `error_message` is present iff `status` is `Failed`; `extracted_text` is
/// present iff `status` is `Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub uploaded_by: Uuid,
    pub file_name: String,
    /// Lowercased file extension as received at upload (e.g. "pdf", "jpg").
    /// Kept verbatim so unsupported uploads can be recorded and failed by
    /// the processor instead of being rejected with a crash.
    pub file_type: String,
    pub byte_size: u64,
    pub extracted_text: Option<String>,
    pub status: ProcessingStatus,
    pub error_message: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Document {
    /// A fresh `Pending` document as created at upload time.
    pub fn new_pending(
        patient_id: Uuid,
        uploaded_by: Uuid,
        file_name: &str,
        file_type: &str,
        byte_size: u64,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            uploaded_by,
            file_name: file_name.to_string(),
            file_type: file_type.to_lowercase(),
            byte_size,
            extracted_text: None,
            status: ProcessingStatus::Pending,
            error_message: None,
            created_at,
        }
    }
}

/// Thin mirror of the external Patient entity. The pipeline never creates or
/// deletes patients itself; the row exists so foreign keys can cascade and so
/// a concurrently-deleted patient surfaces as not-found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub display_name: String,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_hms_opt(9, 30, 0).unwrap()
    }

    #[test]
    fn new_pending_has_no_text_or_error() {
        let doc = Document::new_pending(Uuid::new_v4(), Uuid::new_v4(), "scan.PDF", "PDF", 1024, ts());
        assert_eq!(doc.status, ProcessingStatus::Pending);
        assert!(doc.extracted_text.is_none());
        assert!(doc.error_message.is_none());
        assert_eq!(doc.file_type, "pdf", "file type is normalized to lowercase");
        assert_eq!(doc.file_name, "scan.PDF", "original file name is preserved");
    }

    #[test]
    fn new_pending_generates_unique_ids() {
        let a = Document::new_pending(Uuid::new_v4(), Uuid::new_v4(), "a.jpg", "jpg", 1, ts());
        let b = Document::new_pending(Uuid::new_v4(), Uuid::new_v4(), "b.jpg", "jpg", 1, ts());
        assert_ne!(a.id, b.id);
    }
}
