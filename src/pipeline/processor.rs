//! Per-document processing: claim, extract, record outcome.
//!
//! Runs on whichever worker thread picked up the document. The claim is a
//! conditional UPDATE, so two workers racing on the same document cannot
//! both process it; the loser sees `AlreadyClaimed` and walks away.

use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository::document as documents;
use crate::db::DatabaseError;
use crate::pipeline::extraction::DocumentTextExtractor;
use crate::storage::{FileStore, StorageError};

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// Extraction succeeded; the document is completed with text.
    Completed,
    /// Extraction failed; the document is failed with the given message.
    /// This is a recorded outcome, not an error: the pipeline did its job.
    Failed(String),
    /// Another worker holds or already resolved this document.
    AlreadyClaimed,
}

pub fn process_document(
    conn: &Connection,
    store: &FileStore,
    extractor: &DocumentTextExtractor,
    document_id: &Uuid,
) -> Result<ProcessingOutcome, ProcessorError> {
    let _span = tracing::info_span!("process_document", document_id = %document_id).entered();

    let document = documents::get_document(conn, document_id)?
        .ok_or_else(|| DatabaseError::not_found("Document", document_id))?;

    if !documents::claim_for_processing(conn, document_id)? {
        tracing::debug!(status = %document.status, "Document already claimed, skipping");
        return Ok(ProcessingOutcome::AlreadyClaimed);
    }

    if document.byte_size == 0 {
        return fail(conn, document_id, "Uploaded file is empty");
    }

    // Every storage failure is a terminal outcome for the document. Leaving
    // it in `processing` would strand it: the claim requires `pending`, so
    // nothing would ever pick it up again.
    let bytes = match store.read(document_id, &document.file_type) {
        Ok(bytes) => bytes,
        Err(StorageError::Missing(_)) => {
            return fail(conn, document_id, "Stored file is missing");
        }
        Err(e) => {
            return fail(conn, document_id, &format!("Could not read stored file: {e}"));
        }
    };

    match extractor.extract(&document.file_type, &bytes) {
        Ok(text) => {
            documents::complete_processing(conn, document_id, &text)?;
            tracing::info!(text_len = text.len(), "Document extraction complete");
            Ok(ProcessingOutcome::Completed)
        }
        Err(e) => fail(conn, document_id, &e.to_string()),
    }
}

fn fail(
    conn: &Connection,
    document_id: &Uuid,
    message: &str,
) -> Result<ProcessingOutcome, ProcessorError> {
    documents::fail_processing(conn, document_id, message)?;
    tracing::warn!(document_id = %document_id, error = message, "Document extraction failed");
    Ok(ProcessingOutcome::Failed(message.to_string()))
}
