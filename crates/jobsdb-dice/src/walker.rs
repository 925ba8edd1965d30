//! Cursor walk over the paginated search results.
//!
//! A [`CursorWalker`] is created per run and yields pages lazily through
//! [`CursorWalker::next_page`] (or [`CursorWalker::into_stream`]). The walk ends
//! when any of these holds:
//!
//! - the envelope carries no `nextUrl`,
//! - the documents received so far reach the `count` the API reported,
//! - a page arrives with no records.
//!
//! The server's `lastDocument` is never used as a stop condition; a server
//! that never advances it would otherwise keep the walk alive forever. The
//! `max_pages` ceiling bounds the walk regardless of what the server sends.

use std::time::Duration;

use futures::stream::{self, Stream};
use jobsdb_core::SourceQuery;

use crate::client::DiceClient;
use crate::error::{FetchError, WalkError};
use crate::retry::{retry_with_backoff, RetryPolicy};

pub const DEFAULT_MAX_PAGES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    /// Hard ceiling on pages fetched in one walk.
    pub max_pages: usize,
    /// Applied to every page after the first.
    pub retry: RetryPolicy,
    /// Politeness delay before every page after the first.
    pub inter_page_delay_ms: u64,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            retry: RetryPolicy::default(),
            inter_page_delay_ms: 0,
        }
    }
}

/// Pagination state carried between page fetches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCursor {
    /// URL of the next page to fetch, as received (possibly relative).
    pub next_url: Option<String>,
    /// `count` from the most recent envelope.
    pub total_count: u64,
    pub documents_seen: u64,
    pub pages_fetched: usize,
}

/// One fetched page of raw records.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based page number within the walk.
    pub number: usize,
    pub records: Vec<serde_json::Value>,
}

pub struct CursorWalker<'a> {
    client: &'a DiceClient,
    options: WalkOptions,
    cursor: PageCursor,
    finished: bool,
}

impl<'a> CursorWalker<'a> {
    #[must_use]
    pub fn new(client: &'a DiceClient, query: &SourceQuery, options: WalkOptions) -> Self {
        let first = client.first_page_url(query).to_string();
        Self {
            client,
            options,
            cursor: PageCursor {
                next_url: Some(first),
                ..PageCursor::default()
            },
            finished: false,
        }
    }

    #[must_use]
    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetches the next page, or returns `Ok(None)` once the walk is over.
    ///
    /// After any error the walker is finished and further calls return
    /// `Ok(None)`.
    ///
    /// # Errors
    ///
    /// - [`WalkError::FirstPage`] if the first request fails (never retried).
    /// - [`WalkError::PartialIngestion`] if a later page still fails after
    ///   retries, or fails with a non-retriable error.
    /// - [`WalkError::PageLimit`] if another page is needed beyond `max_pages`.
    pub async fn next_page(&mut self) -> Result<Option<Page>, WalkError> {
        if self.finished {
            return Ok(None);
        }
        let Some(next_url) = self.cursor.next_url.clone() else {
            self.finished = true;
            return Ok(None);
        };

        if self.cursor.pages_fetched >= self.options.max_pages {
            self.finished = true;
            tracing::error!(
                max_pages = self.options.max_pages,
                documents_seen = self.cursor.documents_seen,
                "pagination ceiling reached with pages still pending"
            );
            return Err(WalkError::PageLimit {
                max_pages: self.options.max_pages,
            });
        }

        let number = self.cursor.pages_fetched + 1;
        let fetched = if number == 1 {
            self.fetch_once(&next_url)
                .await
                .map_err(WalkError::FirstPage)
        } else {
            if self.options.inter_page_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.options.inter_page_delay_ms)).await;
            }
            self.fetch_with_retry(&next_url)
                .await
                .map_err(|source| WalkError::PartialIngestion {
                    page: number,
                    records_delivered: self.cursor.documents_seen,
                    source,
                })
        };

        let envelope = match fetched {
            Ok(envelope) => envelope,
            Err(err) => {
                self.finished = true;
                return Err(err);
            }
        };

        let received = u64::try_from(envelope.result_item_list.len()).unwrap_or(u64::MAX);
        self.cursor.pages_fetched = number;
        self.cursor.documents_seen = self.cursor.documents_seen.saturating_add(received);
        self.cursor.total_count = envelope.count;

        let exhausted = received == 0 || self.cursor.documents_seen >= self.cursor.total_count;
        self.cursor.next_url = if exhausted {
            None
        } else {
            envelope.next_url().map(str::to_owned)
        };

        tracing::debug!(
            page = number,
            received,
            documents_seen = self.cursor.documents_seen,
            total_count = self.cursor.total_count,
            last_document = envelope.last_document,
            has_next = self.cursor.next_url.is_some(),
            "fetched page"
        );

        Ok(Some(Page {
            number,
            records: envelope.result_item_list,
        }))
    }

    /// The same page sequence as a `Stream`; ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Page, WalkError>> + 'a {
        stream::unfold(self, |mut walker| async move {
            match walker.next_page().await {
                Ok(Some(page)) => Some((Ok(page), walker)),
                Ok(None) => None,
                Err(err) => Some((Err(err), walker)),
            }
        })
    }

    async fn fetch_once(&self, raw_url: &str) -> Result<crate::types::Envelope, FetchError> {
        let url = self.client.resolve(raw_url)?;
        self.client.fetch_page(&url).await
    }

    async fn fetch_with_retry(&self, raw_url: &str) -> Result<crate::types::Envelope, FetchError> {
        let url = self.client.resolve(raw_url)?;
        let client = self.client;
        let url = &url;
        retry_with_backoff(self.options.retry, || client.fetch_page(url)).await
    }
}
