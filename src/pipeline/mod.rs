pub mod aggregate;
pub mod extraction;
pub mod orchestrator;
pub mod processor;
pub mod summarize;
pub mod version;
