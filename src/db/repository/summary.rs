use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::repository::{parse_timestamp, TIMESTAMP_FORMAT};
use crate::db::DatabaseError;
use crate::models::Summary;

/// Insert a summary row as-is. Callers that publish a new latest version
/// must clear the previous latest flag in the same transaction, or the
/// partial unique index on (patient_id) WHERE is_latest = 1 rejects the
/// insert.
pub fn insert_summary(conn: &Connection, summary: &Summary) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO summaries (id, patient_id, created_by, narrative, red_flags,
         lab_results, medications, version, is_latest, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            summary.id.to_string(),
            summary.patient_id.to_string(),
            summary.created_by.to_string(),
            summary.narrative,
            serde_json::to_string(&summary.red_flags)
                .map_err(|e| DatabaseError::InvariantViolation(e.to_string()))?,
            serde_json::to_string(&summary.lab_results)
                .map_err(|e| DatabaseError::InvariantViolation(e.to_string()))?,
            serde_json::to_string(&summary.medications)
                .map_err(|e| DatabaseError::InvariantViolation(e.to_string()))?,
            summary.version,
            summary.is_latest as i32,
            summary.created_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

/// Highest version number published for a patient so far (0 if none).
pub fn max_version(conn: &Connection, patient_id: &Uuid) -> Result<i64, DatabaseError> {
    let version: Option<i64> = conn.query_row(
        "SELECT MAX(version) FROM summaries WHERE patient_id = ?1",
        params![patient_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(version.unwrap_or(0))
}

/// Drop the latest flag from whichever summary currently holds it.
/// Returns how many rows were flipped (0 or 1 under the invariant).
pub fn clear_latest(conn: &Connection, patient_id: &Uuid) -> Result<usize, DatabaseError> {
    let rows = conn.execute(
        "UPDATE summaries SET is_latest = 0 WHERE patient_id = ?1 AND is_latest = 1",
        params![patient_id.to_string()],
    )?;
    Ok(rows)
}

pub fn get_summary(conn: &Connection, id: &Uuid) -> Result<Option<Summary>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, created_by, narrative, red_flags, lab_results,
         medications, version, is_latest, created_at
         FROM summaries WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], row_to_summary_row);
    match result {
        Ok(row) => Ok(Some(summary_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_latest_summary(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Option<Summary>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, created_by, narrative, red_flags, lab_results,
         medications, version, is_latest, created_at
         FROM summaries WHERE patient_id = ?1 AND is_latest = 1",
    )?;

    let result = stmt.query_row(params![patient_id.to_string()], row_to_summary_row);
    match result {
        Ok(row) => Ok(Some(summary_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Full version history for a patient, newest version first.
pub fn list_summaries(conn: &Connection, patient_id: &Uuid) -> Result<Vec<Summary>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, created_by, narrative, red_flags, lab_results,
         medications, version, is_latest, created_at
         FROM summaries WHERE patient_id = ?1 ORDER BY version DESC",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string()], row_to_summary_row)?;

    let mut summaries = Vec::new();
    for row in rows {
        summaries.push(summary_from_row(row?)?);
    }
    Ok(summaries)
}

/// How many summaries carry the latest flag for a patient. Anything other
/// than 0 or 1 means the storage invariant is broken.
pub fn count_latest(conn: &Connection, patient_id: &Uuid) -> Result<i64, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM summaries WHERE patient_id = ?1 AND is_latest = 1",
        params![patient_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Remove a summary on explicit external request. If the deleted row was
/// the latest, the highest remaining version is promoted in the same
/// transaction so the single-latest invariant holds throughout.
pub fn delete_summary(conn: &mut Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let tx = conn.transaction()?;

    let target = {
        let result = tx.query_row(
            "SELECT patient_id, is_latest FROM summaries WHERE id = ?1",
            params![id.to_string()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)?)),
        );
        match result {
            Ok(found) => found,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(DatabaseError::not_found("Summary", id));
            }
            Err(e) => return Err(e.into()),
        }
    };

    tx.execute("DELETE FROM summaries WHERE id = ?1", params![id.to_string()])?;

    if target.1 != 0 {
        tx.execute(
            "UPDATE summaries SET is_latest = 1
             WHERE patient_id = ?1
               AND version = (SELECT MAX(version) FROM summaries WHERE patient_id = ?1)",
            params![target.0],
        )?;
    }

    tx.commit()?;
    tracing::info!(summary_id = %id, was_latest = target.1 != 0, "Summary deleted");
    Ok(())
}

struct SummaryRow {
    id: String,
    patient_id: String,
    created_by: String,
    narrative: String,
    red_flags: String,
    lab_results: String,
    medications: String,
    version: i64,
    is_latest: i32,
    created_at: String,
}

fn row_to_summary_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SummaryRow> {
    Ok(SummaryRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        created_by: row.get(2)?,
        narrative: row.get(3)?,
        red_flags: row.get(4)?,
        lab_results: row.get(5)?,
        medications: row.get(6)?,
        version: row.get(7)?,
        is_latest: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn summary_from_row(row: SummaryRow) -> Result<Summary, DatabaseError> {
    Ok(Summary {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::InvariantViolation(e.to_string()))?,
        patient_id: Uuid::parse_str(&row.patient_id)
            .map_err(|e| DatabaseError::InvariantViolation(e.to_string()))?,
        created_by: Uuid::parse_str(&row.created_by)
            .map_err(|e| DatabaseError::InvariantViolation(e.to_string()))?,
        narrative: row.narrative,
        red_flags: serde_json::from_str(&row.red_flags)
            .map_err(|e| DatabaseError::InvariantViolation(e.to_string()))?,
        lab_results: serde_json::from_str(&row.lab_results)
            .map_err(|e| DatabaseError::InvariantViolation(e.to_string()))?,
        medications: serde_json::from_str(&row.medications)
            .map_err(|e| DatabaseError::InvariantViolation(e.to_string()))?,
        version: row.version,
        is_latest: row.is_latest != 0,
        created_at: parse_timestamp(&row.created_at),
    })
}
