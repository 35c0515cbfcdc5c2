//! Upload intake: validate, persist bytes, record the pending document,
//! and hand off to a background processing thread.
//!
//! Validation here is deliberately shallow. The upload gate checks only
//! what the caller can fix immediately (unknown patient, bad extension,
//! size). Content problems, including empty and unreadable files, are the
//! processor's to record as failed documents.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::db::repository::{document as documents, patient as patients};
use crate::db::sqlite::open_database;
use crate::db::DatabaseError;
use crate::models::Document;
use crate::pipeline::extraction::DocumentTextExtractor;
use crate::pipeline::processor::process_document;
use crate::storage::{FileStore, StorageError};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Patient not found: {0}")]
    PatientNotFound(Uuid),

    #[error("File name has no extension: {0}")]
    MissingExtension(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Accept an upload: store the bytes and create the pending document row.
/// Returns the document as recorded; processing happens separately.
pub fn upload_document(
    conn: &Connection,
    store: &FileStore,
    config: &PipelineConfig,
    patient_id: &Uuid,
    uploaded_by: &Uuid,
    file_name: &str,
    bytes: &[u8],
) -> Result<Document, IngestError> {
    if !patients::patient_exists(conn, patient_id)? {
        return Err(IngestError::PatientNotFound(*patient_id));
    }

    let file_type = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| IngestError::MissingExtension(file_name.to_string()))?;

    if !PipelineConfig::is_allowed_file_type(&file_type) {
        return Err(IngestError::UnsupportedFileType(file_type));
    }

    let size = bytes.len() as u64;
    if size > config.max_upload_bytes {
        return Err(IngestError::TooLarge { size, limit: config.max_upload_bytes });
    }

    let document = Document::new_pending(
        *patient_id,
        *uploaded_by,
        file_name,
        &file_type,
        size,
        chrono::Utc::now().naive_utc(),
    );

    store.save(&document.id, &file_type, bytes)?;
    if let Err(e) = documents::insert_document(conn, &document) {
        // Do not leave orphaned bytes behind a failed insert.
        let _ = store.delete(&document.id, &file_type);
        return Err(e.into());
    }

    tracing::info!(
        document_id = %document.id,
        patient_id = %patient_id,
        file_name = %file_name,
        mime = %mime_guess::from_path(file_name).first_or_octet_stream(),
        byte_size = size,
        "Document uploaded"
    );
    Ok(document)
}

/// Process a pending document on a background thread. The worker opens its
/// own connection; outcomes land in the documents table, not in the handle.
pub fn spawn_document_processing(
    db_path: PathBuf,
    store: FileStore,
    extractor: Arc<DocumentTextExtractor>,
    document_id: Uuid,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(format!("process-{document_id}"))
        .spawn(move || {
            let conn = match open_database(&db_path) {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(document_id = %document_id, error = %e, "Worker could not open database");
                    return;
                }
            };
            if let Err(e) = process_document(&conn, &store, &extractor, &document_id) {
                tracing::error!(document_id = %document_id, error = %e, "Document processing errored");
            }
        })
        .expect("failed to spawn processing thread")
}
