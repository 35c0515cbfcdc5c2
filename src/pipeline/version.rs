//! Versioned summary publication.
//!
//! A publish allocates the next version number, retires the current latest,
//! and inserts the new row, all inside one IMMEDIATE transaction. The write
//! lock taken up front means the version number cannot go stale between
//! read and insert. A second writer either waits out the busy timeout or
//! surfaces as `VersionConflict` for the orchestrator to retry.

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository::summary as summaries;
use crate::db::DatabaseError;
use crate::models::{StructuredSummary, Summary};

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Concurrent summary publication for the same patient")]
    VersionConflict,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub fn publish_summary(
    conn: &mut Connection,
    patient_id: &Uuid,
    created_by: &Uuid,
    structured: StructuredSummary,
    created_at: NaiveDateTime,
) -> Result<Summary, PublishError> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(map_sqlite_error)?;

    let version = summaries::max_version(&tx, patient_id).map_err(map_database_error)? + 1;
    let retired = summaries::clear_latest(&tx, patient_id).map_err(map_database_error)?;

    let summary = Summary::from_structured(*patient_id, *created_by, structured, version, created_at);
    summaries::insert_summary(&tx, &summary).map_err(map_database_error)?;

    tx.commit().map_err(map_sqlite_error)?;

    tracing::info!(
        patient_id = %patient_id,
        summary_id = %summary.id,
        version,
        superseded = retired,
        "Summary published"
    );
    Ok(summary)
}

fn map_database_error(e: DatabaseError) -> PublishError {
    match e {
        DatabaseError::Sqlite(sqlite) => map_sqlite_error(sqlite),
        other => PublishError::Database(other),
    }
}

/// Busy, locked, and constraint failures all mean another publisher got
/// there first. Anything else is a real database error.
fn map_sqlite_error(e: rusqlite::Error) -> PublishError {
    use rusqlite::ErrorCode;
    if let rusqlite::Error::SqliteFailure(inner, _) = &e {
        if matches!(
            inner.code,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::ConstraintViolation
        ) {
            return PublishError::VersionConflict;
        }
    }
    PublishError::Database(DatabaseError::Sqlite(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::patient::insert_patient;
    use crate::db::repository::summary::{count_latest, get_latest_summary, list_summaries};
    use crate::db::sqlite::{open_database, open_memory_database};
    use crate::models::Patient;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Barrier};

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 6).unwrap().and_hms_opt(hour, 0, 0).unwrap()
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

    fn structured(narrative: &str) -> StructuredSummary {
        StructuredSummary {
            narrative: narrative.to_string(),
            red_flags: vec![],
            lab_results: BTreeMap::new(),
            medications: vec![],
        }
    }

    #[test]
    fn first_publish_is_version_one() {
        let mut conn = open_memory_database().unwrap();
        let patient_id = setup_patient(&conn);

        let summary =
            publish_summary(&mut conn, &patient_id, &Uuid::new_v4(), structured("v1"), ts(9))
                .unwrap();
        assert_eq!(summary.version, 1);
        assert!(summary.is_latest);
        assert_eq!(count_latest(&conn, &patient_id).unwrap(), 1);
    }

    #[test]
    fn republish_supersedes_previous() {
        let mut conn = open_memory_database().unwrap();
        let patient_id = setup_patient(&conn);
        let author = Uuid::new_v4();

        let v1 = publish_summary(&mut conn, &patient_id, &author, structured("v1"), ts(9)).unwrap();
        let v2 = publish_summary(&mut conn, &patient_id, &author, structured("v2"), ts(10)).unwrap();

        assert_eq!(v2.version, 2);
        let latest = get_latest_summary(&conn, &patient_id).unwrap().unwrap();
        assert_eq!(latest.id, v2.id);
        assert_eq!(count_latest(&conn, &patient_id).unwrap(), 1);

        let history = list_summaries(&conn, &patient_id).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().any(|s| s.id == v1.id && !s.is_latest));
    }

    #[test]
    fn versions_increase_monotonically() {
        let mut conn = open_memory_database().unwrap();
        let patient_id = setup_patient(&conn);
        let author = Uuid::new_v4();

        for expected in 1..=5 {
            let summary =
                publish_summary(&mut conn, &patient_id, &author, structured("update"), ts(9))
                    .unwrap();
            assert_eq!(summary.version, expected);
        }
        assert_eq!(count_latest(&conn, &patient_id).unwrap(), 1);
    }

    #[test]
    fn publishes_are_independent_per_patient() {
        let mut conn = open_memory_database().unwrap();
        let patient_a = setup_patient(&conn);
        let patient_b = setup_patient(&conn);
        let author = Uuid::new_v4();

        publish_summary(&mut conn, &patient_a, &author, structured("a1"), ts(9)).unwrap();
        publish_summary(&mut conn, &patient_a, &author, structured("a2"), ts(10)).unwrap();
        let b1 = publish_summary(&mut conn, &patient_b, &author, structured("b1"), ts(9)).unwrap();

        assert_eq!(b1.version, 1);
        assert_eq!(count_latest(&conn, &patient_a).unwrap(), 1);
        assert_eq!(count_latest(&conn, &patient_b).unwrap(), 1);
    }

    #[test]
    fn racing_publishers_serialize_through_write_lock() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("race.db");
        let setup_conn = open_database(&db_path).unwrap();
        let patient_id = setup_patient(&setup_conn);
        drop(setup_conn);

        let barrier = Arc::new(Barrier::new(2));
        let mut handles = Vec::new();
        for worker in 0..2 {
            let barrier = Arc::clone(&barrier);
            let db_path = db_path.clone();
            handles.push(std::thread::spawn(move || {
                let mut conn = open_database(&db_path).unwrap();
                barrier.wait();
                publish_summary(
                    &mut conn,
                    &patient_id,
                    &Uuid::new_v4(),
                    structured(&format!("from worker {worker}")),
                    ts(9),
                )
            }));
        }

        let mut published = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => published += 1,
                Err(PublishError::VersionConflict) => {}
                Err(other) => panic!("unexpected publish error: {other:?}"),
            }
        }
        assert!(published >= 1, "at least one publisher must succeed");

        let conn = open_database(&db_path).unwrap();
        assert_eq!(count_latest(&conn, &patient_id).unwrap(), 1);
        let history = list_summaries(&conn, &patient_id).unwrap();
        assert_eq!(history.len(), published, "every success allocated a distinct version");
    }
}
