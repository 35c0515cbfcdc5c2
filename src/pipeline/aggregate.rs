//! Corpus aggregation: gather every completed document for a patient into
//! the text the summarizer reads. Pending, processing, and failed documents
//! are skipped; an all-failed or empty document set refuses to aggregate
//! rather than producing a summary of nothing.

use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository::document as documents;
use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("No processed documents available for patient {0}")]
    NoProcessedDocuments(Uuid),
}

/// One completed document's contribution to the corpus, tagged with its
/// source and upload time for provenance.
#[derive(Debug, Clone)]
pub struct CorpusItem {
    pub document_id: Uuid,
    pub file_name: String,
    pub uploaded_at: chrono::NaiveDateTime,
    pub text: String,
}

/// The assembled input for one summarization run, in upload order.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub patient_id: Uuid,
    pub items: Vec<CorpusItem>,
}

impl Corpus {
    pub fn total_chars(&self) -> usize {
        self.items.iter().map(|item| item.text.len()).sum()
    }
}

pub fn collect_corpus(conn: &Connection, patient_id: &Uuid) -> Result<Corpus, AggregateError> {
    let completed = documents::get_completed_documents(conn, patient_id)?;

    let items: Vec<CorpusItem> = completed
        .into_iter()
        .filter_map(|doc| {
            doc.extracted_text.map(|text| CorpusItem {
                document_id: doc.id,
                file_name: doc.file_name,
                uploaded_at: doc.created_at,
                text,
            })
        })
        .collect();

    if items.is_empty() {
        return Err(AggregateError::NoProcessedDocuments(*patient_id));
    }

    tracing::debug!(
        patient_id = %patient_id,
        documents = items.len(),
        total_chars = items.iter().map(|i| i.text.len()).sum::<usize>(),
        "Corpus assembled"
    );

    Ok(Corpus {
        patient_id: *patient_id,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::document::{
        claim_for_processing, complete_processing, fail_processing, insert_document,
    };
    use crate::db::repository::patient::insert_patient;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{Document, Patient};
    use chrono::NaiveDate;

    fn ts(hour: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 5).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    fn setup_patient(conn: &Connection) -> Uuid {
        let patient = Patient {
            id: Uuid::new_v4(),
            display_name: "Test Patient".to_string(),
            created_at: ts(7),
        };
        insert_patient(conn, &patient).unwrap();
        patient.id
    }

    fn completed_doc(conn: &Connection, patient_id: Uuid, hour: u32, text: &str) -> Uuid {
        let doc = Document::new_pending(patient_id, Uuid::new_v4(), "report.pdf", "pdf", 100, ts(hour));
        insert_document(conn, &doc).unwrap();
        claim_for_processing(conn, &doc.id).unwrap();
        complete_processing(conn, &doc.id, text).unwrap();
        doc.id
    }

    #[test]
    fn corpus_in_upload_order() {
        let conn = open_memory_database().unwrap();
        let patient_id = setup_patient(&conn);
        completed_doc(&conn, patient_id, 11, "second report");
        completed_doc(&conn, patient_id, 9, "first report");

        let corpus = collect_corpus(&conn, &patient_id).unwrap();
        assert_eq!(corpus.items.len(), 2);
        assert_eq!(corpus.items[0].text, "first report");
        assert_eq!(corpus.items[1].text, "second report");
        assert_eq!(corpus.total_chars(), "first report".len() + "second report".len());
    }

    #[test]
    fn failed_and_pending_documents_excluded() {
        let conn = open_memory_database().unwrap();
        let patient_id = setup_patient(&conn);
        completed_doc(&conn, patient_id, 9, "usable text");

        let pending = Document::new_pending(patient_id, Uuid::new_v4(), "p.jpg", "jpg", 10, ts(10));
        insert_document(&conn, &pending).unwrap();

        let failed = Document::new_pending(patient_id, Uuid::new_v4(), "f.jpg", "jpg", 10, ts(11));
        insert_document(&conn, &failed).unwrap();
        claim_for_processing(&conn, &failed.id).unwrap();
        fail_processing(&conn, &failed.id, "unreadable").unwrap();

        let corpus = collect_corpus(&conn, &patient_id).unwrap();
        assert_eq!(corpus.items.len(), 1);
        assert_eq!(corpus.items[0].text, "usable text");
    }

    #[test]
    fn no_completed_documents_refuses() {
        let conn = open_memory_database().unwrap();
        let patient_id = setup_patient(&conn);

        let err = collect_corpus(&conn, &patient_id).unwrap_err();
        match err {
            AggregateError::NoProcessedDocuments(id) => assert_eq!(id, patient_id),
            other => panic!("expected NoProcessedDocuments, got {other:?}"),
        }
    }

    #[test]
    fn all_failed_documents_refuses() {
        let conn = open_memory_database().unwrap();
        let patient_id = setup_patient(&conn);
        let doc = Document::new_pending(patient_id, Uuid::new_v4(), "f.png", "png", 10, ts(9));
        insert_document(&conn, &doc).unwrap();
        claim_for_processing(&conn, &doc.id).unwrap();
        fail_processing(&conn, &doc.id, "blank scan").unwrap();

        assert!(matches!(
            collect_corpus(&conn, &patient_id),
            Err(AggregateError::NoProcessedDocuments(_))
        ));
    }
}
