//! Clinical document ingestion and summarization pipeline.
//!
//! Documents are uploaded per patient, pushed through text extraction on
//! background workers, aggregated into a corpus, and summarized by a local
//! LLM into versioned structured summaries. At most one summary per patient
//! is ever marked latest; history is retained, never rewritten.

pub mod config;
pub mod db;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod storage;

pub use config::PipelineConfig;
pub use ingest::{spawn_document_processing, upload_document, IngestError};
pub use pipeline::orchestrator::{
    FailureReason, GenerationError, GenerationJob, GenerationPhase, Orchestrator,
};
pub use storage::FileStore;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// `info` level. Safe to call once per process; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
