use thiserror::Error;

/// Errors from a single page request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// The body is not JSON or does not match the page envelope.
    #[error("JSON deserialization error for {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Errors that end a cursor walk.
#[derive(Debug, Error)]
pub enum WalkError {
    /// The first page could not be fetched; nothing was ingested.
    #[error("first page failed: {0}")]
    FirstPage(#[source] FetchError),

    /// A later page failed after retries; earlier pages were delivered.
    ///
    /// `records_delivered` counts raw records handed out by the walker. How
    /// many of them were stored is up to the consumer.
    #[error("page {page} failed after {records_delivered} records were delivered: {source}")]
    PartialIngestion {
        page: usize,
        records_delivered: u64,
        #[source]
        source: FetchError,
    },

    #[error("pagination limit reached: exceeded {max_pages} pages")]
    PageLimit { max_pages: usize },
}

/// Errors mapping one raw record into a listing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record has no usable id (no id field and no detailUrl)")]
    MissingId,

    #[error("field \"{field}\" has the wrong type: expected {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}
