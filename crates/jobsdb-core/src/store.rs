//! The persistence seam of the ingestion pipeline.
//!
//! [`ListingStore`] is implemented by the Postgres store in `jobsdb-db` and by
//! [`crate::MemoryListingStore`] for dry runs and tests. Every implementation
//! must keep at most one stored listing per `id` and treat an upsert of
//! unchanged content as a no-op.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::listings::{Listing, NormalizedListing};

/// Errors surfaced by a [`ListingStore`].
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The write or read for one record failed; the store itself is usable.
    #[error("storage error: {0}")]
    Storage(String),

    /// The store connection is gone; no further writes can succeed.
    #[error("store connection lost: {0}")]
    ConnectionLost(String),
}

impl StoreError {
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, StoreError::ConnectionLost(_))
    }
}

/// What an upsert did to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Conjunctive filter for [`ListingStore::count`]. `None` fields match all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingFilter {
    pub query_text: Option<String>,
    pub query_city: Option<String>,
    /// Case-insensitive equality on `location`.
    pub location: Option<String>,
    /// Case-insensitive equality on `company`.
    pub company: Option<String>,
}

impl ListingFilter {
    /// Returns `true` if `listing` satisfies every populated field.
    #[must_use]
    pub fn matches(&self, listing: &Listing) -> bool {
        let eq_opt = |want: Option<&String>, have: &str| want.is_none_or(|w| w == have);
        let eq_ci = |want: Option<&String>, have: &str| want.is_none_or(|w| eq_folded(w, have));

        eq_opt(self.query_text.as_ref(), &listing.source_query.text)
            && eq_opt(self.query_city.as_ref(), &listing.source_query.city)
            && eq_ci(self.location.as_ref(), &listing.location)
            && eq_ci(self.company.as_ref(), &listing.company)
    }
}

/// Case-insensitive equality with full Unicode lowercasing, as Postgres
/// `LOWER()` does it.
fn eq_folded(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationCount {
    pub location: String,
    pub total_jobs: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyCount {
    pub company: String,
    pub job_count: i64,
}

#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Inserts or updates the listing keyed by `listing.id`.
    async fn upsert(&self, listing: &NormalizedListing) -> Result<UpsertOutcome, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Listing>, StoreError>;

    async fn count(&self, filter: &ListingFilter) -> Result<u64, StoreError>;

    /// Listing counts per location, largest first, ties broken by location.
    async fn group_by_location(&self) -> Result<Vec<LocationCount>, StoreError>;

    /// Listings whose location equals `city` (case-insensitive), ordered by
    /// title then id.
    async fn filter_by_city(&self, city: &str) -> Result<Vec<Listing>, StoreError>;

    /// The `limit` companies with the most listings, ties broken by name.
    async fn top_companies(&self, limit: usize) -> Result<Vec<CompanyCount>, StoreError>;
}
