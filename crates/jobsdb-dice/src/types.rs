//! Dice `jobsearch/v1/simple.json` response envelope.
//!
//! ## Observed shape
//!
//! ```json
//! { "count": 25, "firstDocument": 1, "lastDocument": 20,
//!   "nextUrl": "/api/rest/jobsearch/v1/simple.json?text=python&city=07059&page=2",
//!   "resultItemList": [ { "detailUrl": "...", "jobTitle": "...",
//!                         "company": "...", "location": "Warren, NJ",
//!                         "date": "2017-03-20" } ] }
//! ```
//!
//! `nextUrl` is a path relative to the service origin and is omitted on the
//! last page. `lastDocument` is reported but not trusted for termination.
//! Items are kept as raw JSON so a single odd record cannot fail the page.

use serde::Deserialize;

/// One page of search results.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Total matching documents across all pages.
    pub count: u64,

    #[serde(default)]
    pub last_document: u64,

    #[serde(default)]
    pub next_url: Option<String>,

    #[serde(default)]
    pub result_item_list: Vec<serde_json::Value>,
}

impl Envelope {
    /// The `nextUrl` value if present and non-blank.
    #[must_use]
    pub fn next_url(&self) -> Option<&str> {
        self.next_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
