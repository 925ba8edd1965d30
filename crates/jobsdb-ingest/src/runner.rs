//! Drives one ingestion run to a [`RunSummary`].
//!
//! A run is sequential: fetch a page, normalize and upsert each record in
//! order, then move to the next page. Record-level failures are counted and
//! sampled without stopping the run. Losing the store connection stops it.

use std::sync::Arc;

use jobsdb_core::{AppConfig, ListingStore, SourceQuery, StoreError};
use jobsdb_dice::{
    normalize_listing, CursorWalker, DiceClient, Page, RetryPolicy, WalkError, WalkOptions,
};
use tokio::sync::watch;

use crate::summary::{ErrorSample, FailureKind, RunSummary, TerminalState};

pub const DEFAULT_ERROR_SAMPLE_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    pub walk: WalkOptions,
    /// How many record-level failures are kept verbatim in the summary.
    pub error_sample_limit: usize,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            walk: WalkOptions::default(),
            error_sample_limit: DEFAULT_ERROR_SAMPLE_LIMIT,
        }
    }
}

impl RunnerOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            walk: WalkOptions {
                max_pages: config.max_pages,
                retry: RetryPolicy {
                    max_retries: config.max_retries,
                    backoff_base_ms: config.retry_backoff_base_ms,
                },
                inter_page_delay_ms: config.inter_page_delay_ms,
            },
            error_sample_limit: config.error_sample_limit,
        }
    }
}

/// Why processing a page stopped early.
enum PageAbort {
    ConnectionLost(StoreError),
}

pub struct IngestionRunner {
    client: DiceClient,
    store: Arc<dyn ListingStore>,
    options: RunnerOptions,
}

impl IngestionRunner {
    #[must_use]
    pub fn new(client: DiceClient, store: Arc<dyn ListingStore>, options: RunnerOptions) -> Self {
        Self {
            client,
            store,
            options,
        }
    }

    /// Runs one ingestion for `query` to the end. Always returns a summary,
    /// including for fatal runs.
    pub async fn run(&self, query: &SourceQuery) -> RunSummary {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.run_with_cancel(query, cancel_rx).await
    }

    /// Like [`IngestionRunner::run`], but stops with
    /// [`TerminalState::Cancelled`] once `cancel` reads `true`. The flag is
    /// checked before each page fetch; a page already in progress is
    /// finished, so every listing upserted so far stays valid.
    pub async fn run_with_cancel(
        &self,
        query: &SourceQuery,
        cancel: watch::Receiver<bool>,
    ) -> RunSummary {
        let mut summary = RunSummary::new(query.clone());
        let mut walker = CursorWalker::new(&self.client, query, self.options.walk);

        tracing::info!(query = %query, "ingestion run started");

        loop {
            if *cancel.borrow() {
                tracing::warn!(
                    query = %query,
                    pages_fetched = summary.pages_fetched,
                    "ingestion run cancelled"
                );
                summary.finish_with(TerminalState::Cancelled, None);
                break;
            }

            match walker.next_page().await {
                Ok(Some(page)) => {
                    summary.pages_fetched = page.number;
                    if let Err(PageAbort::ConnectionLost(err)) =
                        self.ingest_page(&page, query, &mut summary).await
                    {
                        tracing::error!(
                            query = %query,
                            page = page.number,
                            error = %err,
                            "store connection lost; aborting run"
                        );
                        summary.finish_with(TerminalState::Fatal, Some(err.to_string()));
                        break;
                    }
                }
                Ok(None) => {
                    summary.finish_natural();
                    break;
                }
                Err(err) => {
                    let state = match &err {
                        WalkError::PartialIngestion { .. } => TerminalState::PartiallyFailed,
                        WalkError::FirstPage(_) | WalkError::PageLimit { .. } => {
                            TerminalState::Fatal
                        }
                    };
                    tracing::error!(query = %query, error = %err, %state, "page walk stopped");
                    summary.finish_with(state, Some(err.to_string()));
                    break;
                }
            }
        }

        tracing::info!(
            query = %query,
            state = %summary.terminal_state,
            pages_fetched = summary.pages_fetched,
            records_seen = summary.records_seen,
            records_stored = summary.records_stored,
            records_failed = summary.records_failed,
            "ingestion run finished"
        );
        summary
    }

    async fn ingest_page(
        &self,
        page: &Page,
        query: &SourceQuery,
        summary: &mut RunSummary,
    ) -> Result<(), PageAbort> {
        let limit = self.options.error_sample_limit;

        for (index, raw) in page.records.iter().enumerate() {
            summary.records_seen += 1;

            let listing = match normalize_listing(raw, query) {
                Ok(listing) => listing,
                Err(err) => {
                    tracing::warn!(page = page.number, index, error = %err, "skipping record");
                    summary.record_failed(
                        ErrorSample {
                            page: page.number,
                            index,
                            record_id: None,
                            kind: FailureKind::Normalization,
                            message: err.to_string(),
                        },
                        limit,
                    );
                    continue;
                }
            };

            match self.store.upsert(&listing).await {
                Ok(outcome) => summary.record_stored(outcome),
                Err(err) if err.is_connection_lost() => {
                    // The record is lost with the connection.
                    summary.record_failed(
                        ErrorSample {
                            page: page.number,
                            index,
                            record_id: Some(listing.id),
                            kind: FailureKind::Storage,
                            message: err.to_string(),
                        },
                        limit,
                    );
                    return Err(PageAbort::ConnectionLost(err));
                }
                Err(err) => {
                    tracing::warn!(
                        page = page.number,
                        index,
                        id = %listing.id,
                        error = %err,
                        "upsert failed; skipping record"
                    );
                    summary.record_failed(
                        ErrorSample {
                            page: page.number,
                            index,
                            record_id: Some(listing.id),
                            kind: FailureKind::Storage,
                            message: err.to_string(),
                        },
                        limit,
                    );
                }
            }
        }

        tracing::debug!(
            page = page.number,
            records = page.records.len(),
            records_seen = summary.records_seen,
            "page ingested"
        );
        Ok(())
    }
}
