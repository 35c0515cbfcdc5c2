//! LLM summarization: turn a patient's document corpus into a structured
//! clinical summary. The model output must match the schema exactly; a
//! response missing required fields is rejected, never patched up with
//! defaults.

pub mod client;
pub mod engine;
pub mod parser;
pub mod prompt;

pub use client::{HttpLlmClient, LlmClient, MockLlmClient};
pub use engine::SummarizationEngine;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("Cannot reach LLM endpoint at {0}")]
    Connection(String),

    #[error("LLM endpoint returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("HTTP transport error: {0}")]
    Transport(String),

    #[error("Malformed model output: {0}")]
    MalformedOutput(String),
}

impl SummarizeError {
    /// Connection and transport failures may succeed on a fresh attempt;
    /// a schema violation will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Transport(_))
    }
}
