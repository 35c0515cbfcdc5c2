use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::repository::{parse_timestamp, TIMESTAMP_FORMAT};
use crate::db::DatabaseError;
use crate::models::{Document, ProcessingStatus};

pub fn insert_document(conn: &Connection, doc: &Document) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO documents (id, patient_id, uploaded_by, file_name, file_type,
         byte_size, extracted_text, status, error_message, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            doc.id.to_string(),
            doc.patient_id.to_string(),
            doc.uploaded_by.to_string(),
            doc.file_name,
            doc.file_type,
            doc.byte_size as i64,
            doc.extracted_text,
            doc.status.as_str(),
            doc.error_message,
            doc.created_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_document(conn: &Connection, id: &Uuid) -> Result<Option<Document>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, uploaded_by, file_name, file_type, byte_size,
         extracted_text, status, error_message, created_at
         FROM documents WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], row_to_document_row);

    match result {
        Ok(row) => Ok(Some(document_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All documents for a patient, newest first.
pub fn list_documents(conn: &Connection, patient_id: &Uuid) -> Result<Vec<Document>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, uploaded_by, file_name, file_type, byte_size,
         extracted_text, status, error_message, created_at
         FROM documents WHERE patient_id = ?1 ORDER BY created_at DESC, id",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string()], row_to_document_row)?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(document_from_row(row?)?);
    }
    Ok(docs)
}

/// Completed documents for a patient in upload order. This is the corpus
/// the summarizer reads.
pub fn get_completed_documents(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Document>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, uploaded_by, file_name, file_type, byte_size,
         extracted_text, status, error_message, created_at
         FROM documents WHERE patient_id = ?1 AND status = 'completed'
         ORDER BY created_at ASC, id",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string()], row_to_document_row)?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(document_from_row(row?)?);
    }
    Ok(docs)
}

/// Atomically move a pending document to processing.
///
/// Returns false when the document exists but is no longer pending, which
/// means another worker already claimed it (or it reached a terminal state).
/// The conditional UPDATE is what makes concurrent workers safe without a
/// long-lived transaction.
pub fn claim_for_processing(conn: &Connection, document_id: &Uuid) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "UPDATE documents SET status = 'processing' WHERE id = ?1 AND status = 'pending'",
        params![document_id.to_string()],
    )?;
    if rows == 1 {
        return Ok(true);
    }

    // Distinguish "already claimed" from "no such document".
    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE id = ?1",
        params![document_id.to_string()],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(DatabaseError::not_found("Document", document_id));
    }
    Ok(false)
}

/// Record successful extraction. Only legal from the processing state.
pub fn complete_processing(
    conn: &Connection,
    document_id: &Uuid,
    extracted_text: &str,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE documents SET status = 'completed', extracted_text = ?2, error_message = NULL
         WHERE id = ?1 AND status = 'processing'",
        params![document_id.to_string(), extracted_text],
    )?;
    if rows == 0 {
        return Err(illegal_transition(conn, document_id, ProcessingStatus::Completed)?);
    }
    Ok(())
}

/// Record a failed extraction with a human-readable reason. Only legal from
/// the processing state.
pub fn fail_processing(
    conn: &Connection,
    document_id: &Uuid,
    error_message: &str,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE documents SET status = 'failed', error_message = ?2, extracted_text = NULL
         WHERE id = ?1 AND status = 'processing'",
        params![document_id.to_string(), error_message],
    )?;
    if rows == 0 {
        return Err(illegal_transition(conn, document_id, ProcessingStatus::Failed)?);
    }
    Ok(())
}

pub fn delete_document(conn: &Connection, document_id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM documents WHERE id = ?1",
        params![document_id.to_string()],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::not_found("Document", document_id));
    }
    Ok(())
}

/// Build the error for a guarded transition whose UPDATE matched no rows.
fn illegal_transition(
    conn: &Connection,
    document_id: &Uuid,
    to: ProcessingStatus,
) -> Result<DatabaseError, DatabaseError> {
    let current = match get_document(conn, document_id)? {
        Some(doc) => doc.status,
        None => return Ok(DatabaseError::not_found("Document", document_id)),
    };
    Ok(DatabaseError::IllegalTransition {
        document_id: document_id.to_string(),
        from: current,
        to,
    })
}

struct DocumentRow {
    id: String,
    patient_id: String,
    uploaded_by: String,
    file_name: String,
    file_type: String,
    byte_size: i64,
    extracted_text: Option<String>,
    status: String,
    error_message: Option<String>,
    created_at: String,
}

fn row_to_document_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        uploaded_by: row.get(2)?,
        file_name: row.get(3)?,
        file_type: row.get(4)?,
        byte_size: row.get(5)?,
        extracted_text: row.get(6)?,
        status: row.get(7)?,
        error_message: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn document_from_row(row: DocumentRow) -> Result<Document, DatabaseError> {
    let status = ProcessingStatus::from_str(&row.status).ok_or_else(|| {
        DatabaseError::InvalidEnum {
            field: "documents.status".to_string(),
            value: row.status.clone(),
        }
    })?;

    Ok(Document {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::InvariantViolation(e.to_string()))?,
        patient_id: Uuid::parse_str(&row.patient_id)
            .map_err(|e| DatabaseError::InvariantViolation(e.to_string()))?,
        uploaded_by: Uuid::parse_str(&row.uploaded_by)
            .map_err(|e| DatabaseError::InvariantViolation(e.to_string()))?,
        file_name: row.file_name,
        file_type: row.file_type,
        byte_size: row.byte_size as u64,
        extracted_text: row.extracted_text,
        status,
        error_message: row.error_message,
        created_at: parse_timestamp(&row.created_at),
    })
}
