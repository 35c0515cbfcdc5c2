use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::repository::{parse_timestamp, TIMESTAMP_FORMAT};
use crate::db::DatabaseError;
use crate::models::Patient;

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, display_name, created_at) VALUES (?1, ?2, ?3)",
        params![
            patient.id.to_string(),
            patient.display_name,
            patient.created_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, display_name, created_at FROM patients WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    );

    match result {
        Ok((id, display_name, created_at)) => Ok(Some(Patient {
            id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::InvariantViolation(e.to_string()))?,
            display_name,
            created_at: parse_timestamp(&created_at),
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Fast existence probe used before uploads and generation requests.
pub fn patient_exists(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM patients WHERE id = ?1",
        params![id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn delete_patient(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM patients WHERE id = ?1",
        params![id.to_string()],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::not_found("Patient", id));
    }
    Ok(())
}
