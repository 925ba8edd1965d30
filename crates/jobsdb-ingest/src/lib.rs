//! Orchestration of one ingestion run: walk the result pages, normalize each
//! record, upsert it, and report what happened in a [`RunSummary`].

pub mod runner;
pub mod summary;

pub use runner::{IngestionRunner, RunnerOptions, DEFAULT_ERROR_SAMPLE_LIMIT};
pub use summary::{ErrorSample, FailureKind, RunSummary, TerminalState};
