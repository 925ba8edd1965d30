use jobsdb_core::{SourceQuery, UpsertOutcome};
use serde::Serialize;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    /// The walk finished and every record was stored.
    Completed,
    /// The walk finished (or stopped on a later page) with at least one
    /// record or page lost.
    PartiallyFailed,
    /// Nothing more could be done: first page failed, the page ceiling was
    /// hit, or the store connection was lost.
    Fatal,
    /// A cancellation signal was observed between pages.
    Cancelled,
}

impl std::fmt::Display for TerminalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminalState::Completed => write!(f, "completed"),
            TerminalState::PartiallyFailed => write!(f, "partially_failed"),
            TerminalState::Fatal => write!(f, "fatal"),
            TerminalState::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Normalization,
    Storage,
}

/// One record-level failure kept for the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorSample {
    pub page: usize,
    /// 0-based position of the record within its page.
    pub index: usize,
    /// `None` when the record failed before an id could be read.
    pub record_id: Option<String>,
    pub kind: FailureKind,
    pub message: String,
}

impl std::fmt::Display for ErrorSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page {} record {}", self.page, self.index)?;
        if let Some(id) = &self.record_id {
            write!(f, " (id {id})")?;
        }
        write!(f, ": {}", self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub query: SourceQuery,
    pub pages_fetched: usize,
    pub records_seen: u64,
    /// Successful upserts: inserted + updated + unchanged.
    pub records_stored: u64,
    pub records_failed: u64,
    pub records_inserted: u64,
    pub records_updated: u64,
    pub records_unchanged: u64,
    pub terminal_state: TerminalState,
    /// The first few record-level failures, in the order they happened.
    pub error_samples: Vec<ErrorSample>,
    /// The run-level error that ended the walk, if any.
    pub error: Option<String>,
}

impl RunSummary {
    pub(crate) fn new(query: SourceQuery) -> Self {
        Self {
            query,
            pages_fetched: 0,
            records_seen: 0,
            records_stored: 0,
            records_failed: 0,
            records_inserted: 0,
            records_updated: 0,
            records_unchanged: 0,
            terminal_state: TerminalState::Completed,
            error_samples: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn record_stored(&mut self, outcome: UpsertOutcome) {
        self.records_stored += 1;
        match outcome {
            UpsertOutcome::Inserted => self.records_inserted += 1,
            UpsertOutcome::Updated => self.records_updated += 1,
            UpsertOutcome::Unchanged => self.records_unchanged += 1,
        }
    }

    pub(crate) fn record_failed(&mut self, sample: ErrorSample, sample_limit: usize) {
        self.records_failed += 1;
        if self.error_samples.len() < sample_limit {
            self.error_samples.push(sample);
        }
    }

    /// Picks the end state for a walk that reached its natural end.
    pub(crate) fn finish_natural(&mut self) {
        self.terminal_state = if self.records_failed > 0 {
            TerminalState::PartiallyFailed
        } else {
            TerminalState::Completed
        };
    }

    pub(crate) fn finish_with(&mut self, state: TerminalState, error: Option<String>) {
        self.terminal_state = state;
        self.error = error;
    }
}
