//! Generation orchestration: one background job per summary request.
//!
//! A request checks the patient, takes the per-patient inflight slot, and
//! spawns a worker thread that aggregates, summarizes, and publishes. Only
//! one generation may run per patient at a time; a second request while one
//! is inflight is rejected up front instead of queued. Callers poll job
//! snapshots or block on `wait_for`.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::db::repository::patient as patients;
use crate::db::sqlite::open_database;
use crate::db::DatabaseError;
use crate::pipeline::aggregate::{collect_corpus, AggregateError};
use crate::pipeline::summarize::{SummarizationEngine, SummarizeError};
use crate::pipeline::version::{publish_summary, PublishError};

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("A summary generation is already in progress for patient {0}")]
    InProgress(Uuid),

    #[error("Patient not found: {0}")]
    PatientNotFound(Uuid),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Why a generation job failed. Coarse enough for callers to decide whether
/// retrying makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// No completed documents to summarize.
    NoInput,
    /// The LLM endpoint could not be reached or returned an error.
    ProviderUnavailable,
    /// The model responded but violated the output schema.
    BadOutput,
    /// Publish retries were exhausted against concurrent publishers.
    VersionContention,
    PatientNotFound,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationPhase {
    Requested,
    Aggregating,
    Summarizing,
    Publishing,
    Done { summary_id: Uuid },
    Failed { reason: FailureReason, message: String },
}

impl GenerationPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Failed { .. })
    }
}

/// Snapshot of one generation job. Cloned out of the registry on request;
/// never a live handle.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub requested_by: Uuid,
    pub phase: GenerationPhase,
    pub requested_at: NaiveDateTime,
}

struct JobState {
    job: Mutex<GenerationJob>,
}

impl JobState {
    fn set_phase(&self, phase: GenerationPhase) {
        let mut job = self.job.lock().expect("job lock poisoned");
        job.phase = phase;
    }
}

/// Releases the per-patient inflight slot when the worker finishes, on
/// every exit path including panics.
struct InflightGuard {
    inflight: Arc<Mutex<HashSet<Uuid>>>,
    patient_id: Uuid,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.inflight
            .lock()
            .expect("inflight lock poisoned")
            .remove(&self.patient_id);
    }
}

/// How long terminal job snapshots stay pollable before being pruned.
const JOB_RETENTION_SECS: i64 = 300;

pub struct Orchestrator {
    db_path: PathBuf,
    engine: Arc<SummarizationEngine>,
    config: PipelineConfig,
    inflight: Arc<Mutex<HashSet<Uuid>>>,
    jobs: Mutex<HashMap<Uuid, Arc<JobState>>>,
    handles: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(db_path: PathBuf, engine: Arc<SummarizationEngine>, config: PipelineConfig) -> Self {
        Self {
            db_path,
            engine,
            config,
            inflight: Arc::new(Mutex::new(HashSet::new())),
            jobs: Mutex::new(HashMap::new()),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Start a generation job for a patient. Returns the job id, or rejects
    /// when the patient is unknown or already has a generation inflight.
    pub fn request_generation(
        &self,
        patient_id: &Uuid,
        requested_by: &Uuid,
    ) -> Result<Uuid, GenerationError> {
        self.reap_finished();

        let conn = open_database(&self.db_path)?;
        if !patients::patient_exists(&conn, patient_id)? {
            return Err(GenerationError::PatientNotFound(*patient_id));
        }
        drop(conn);

        {
            let mut inflight = self.inflight.lock().expect("inflight lock poisoned");
            if !inflight.insert(*patient_id) {
                return Err(GenerationError::InProgress(*patient_id));
            }
        }
        let guard = InflightGuard {
            inflight: Arc::clone(&self.inflight),
            patient_id: *patient_id,
        };

        let job_id = Uuid::new_v4();
        let state = Arc::new(JobState {
            job: Mutex::new(GenerationJob {
                id: job_id,
                patient_id: *patient_id,
                requested_by: *requested_by,
                phase: GenerationPhase::Requested,
                requested_at: chrono::Utc::now().naive_utc(),
            }),
        });
        self.jobs
            .lock()
            .expect("jobs lock poisoned")
            .insert(job_id, Arc::clone(&state));

        let db_path = self.db_path.clone();
        let engine = Arc::clone(&self.engine);
        let retry_attempts = self.config.publish_retry_attempts;
        let patient_id = *patient_id;
        let requested_by = *requested_by;

        let handle = std::thread::Builder::new()
            .name(format!("generate-{job_id}"))
            .spawn(move || {
                let _guard = guard;
                let _span = tracing::info_span!(
                    "generation_job",
                    job_id = %job_id,
                    patient_id = %patient_id,
                )
                .entered();

                match open_database(&db_path) {
                    Ok(mut conn) => run_generation(
                        &mut conn,
                        &engine,
                        &state,
                        &patient_id,
                        &requested_by,
                        retry_attempts,
                    ),
                    Err(e) => {
                        tracing::error!(error = %e, "Worker could not open database");
                        state.set_phase(GenerationPhase::Failed {
                            reason: FailureReason::Internal,
                            message: e.to_string(),
                        });
                    }
                }
            })
            .expect("failed to spawn generation thread");

        self.handles
            .lock()
            .expect("handles lock poisoned")
            .insert(job_id, handle);

        tracing::info!(job_id = %job_id, patient_id = %patient_id, "Generation requested");
        Ok(job_id)
    }

    /// Current snapshot of a job, or None for an unknown id.
    pub fn job(&self, job_id: &Uuid) -> Option<GenerationJob> {
        let jobs = self.jobs.lock().expect("jobs lock poisoned");
        jobs.get(job_id)
            .map(|state| state.job.lock().expect("job lock poisoned").clone())
    }

    /// Block until the job's worker thread exits, then return the final
    /// snapshot. Safe to call once per job; later calls just snapshot.
    pub fn wait_for(&self, job_id: &Uuid) -> Option<GenerationJob> {
        let handle = self
            .handles
            .lock()
            .expect("handles lock poisoned")
            .remove(job_id);
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!(job_id = %job_id, "Generation worker panicked");
                if let Some(state) = self.jobs.lock().expect("jobs lock poisoned").get(job_id) {
                    state.set_phase(GenerationPhase::Failed {
                        reason: FailureReason::Internal,
                        message: "Worker thread panicked".to_string(),
                    });
                }
            }
        }
        self.job(job_id)
    }

    /// Join workers that have exited and prune terminal snapshots past the
    /// retention window, so the registries stay bounded for callers that
    /// only ever poll `job()`.
    fn reap_finished(&self) {
        let finished: Vec<(Uuid, JoinHandle<()>)> = {
            let mut handles = self.handles.lock().expect("handles lock poisoned");
            let done: Vec<Uuid> = handles
                .iter()
                .filter(|(_, handle)| handle.is_finished())
                .map(|(id, _)| *id)
                .collect();
            done.into_iter()
                .filter_map(|id| handles.remove(&id).map(|handle| (id, handle)))
                .collect()
        };
        for (job_id, handle) in finished {
            if handle.join().is_err() {
                tracing::error!(job_id = %job_id, "Generation worker panicked");
                if let Some(state) = self.jobs.lock().expect("jobs lock poisoned").get(&job_id) {
                    state.set_phase(GenerationPhase::Failed {
                        reason: FailureReason::Internal,
                        message: "Worker thread panicked".to_string(),
                    });
                }
            }
        }

        let cutoff =
            chrono::Utc::now().naive_utc() - chrono::Duration::seconds(JOB_RETENTION_SECS);
        self.jobs.lock().expect("jobs lock poisoned").retain(|_, state| {
            let job = state.job.lock().expect("job lock poisoned");
            !job.phase.is_terminal() || job.requested_at >= cutoff
        });
    }
}

fn run_generation(
    conn: &mut Connection,
    engine: &SummarizationEngine,
    state: &JobState,
    patient_id: &Uuid,
    requested_by: &Uuid,
    retry_attempts: u32,
) {
    state.set_phase(GenerationPhase::Aggregating);
    let corpus = match collect_corpus(conn, patient_id) {
        Ok(corpus) => corpus,
        Err(AggregateError::NoProcessedDocuments(_)) => {
            state.set_phase(GenerationPhase::Failed {
                reason: FailureReason::NoInput,
                message: "No processed documents available".to_string(),
            });
            return;
        }
        Err(AggregateError::Database(e)) => {
            state.set_phase(GenerationPhase::Failed {
                reason: FailureReason::Internal,
                message: e.to_string(),
            });
            return;
        }
    };

    state.set_phase(GenerationPhase::Summarizing);
    let structured = match engine.summarize(&corpus) {
        Ok(structured) => structured,
        Err(e) => {
            let reason = match &e {
                SummarizeError::MalformedOutput(_) => FailureReason::BadOutput,
                _ => FailureReason::ProviderUnavailable,
            };
            state.set_phase(GenerationPhase::Failed { reason, message: e.to_string() });
            return;
        }
    };

    state.set_phase(GenerationPhase::Publishing);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let now = chrono::Utc::now().naive_utc();
        match publish_summary(conn, patient_id, requested_by, structured.clone(), now) {
            Ok(summary) => {
                state.set_phase(GenerationPhase::Done { summary_id: summary.id });
                return;
            }
            Err(PublishError::VersionConflict) if attempt < retry_attempts => {
                tracing::warn!(attempt, "Publish hit version contention, retrying");
                continue;
            }
            Err(PublishError::VersionConflict) => {
                state.set_phase(GenerationPhase::Failed {
                    reason: FailureReason::VersionContention,
                    message: format!("Publish failed after {attempt} attempts"),
                });
                return;
            }
            Err(PublishError::Database(e)) => {
                state.set_phase(GenerationPhase::Failed {
                    reason: FailureReason::Internal,
                    message: e.to_string(),
                });
                return;
            }
        }
    }
}
