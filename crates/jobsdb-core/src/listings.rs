use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The search parameters that produced a listing, e.g. `python` near `07059`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceQuery {
    /// Skill text sent as the `text` query parameter.
    pub text: String,
    /// City or zip code sent as the `city` query parameter.
    pub city: String,
}

impl SourceQuery {
    #[must_use]
    pub fn new(text: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            city: city.into(),
        }
    }
}

impl std::fmt::Display for SourceQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "text={} city={}", self.text, self.city)
    }
}

/// A job listing mapped from one upstream record, ready for upsert.
///
/// Optional upstream fields are empty strings rather than `None` so that
/// downstream grouping never has to distinguish "missing" from "blank".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedListing {
    /// Stable upstream identifier; the deduplication key.
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub detail_url: String,
    pub source_query: SourceQuery,
    /// Parsed from the upstream `date` field when it is a `YYYY-MM-DD` date.
    pub posted_on: Option<NaiveDate>,
    /// The upstream record exactly as received.
    pub raw_data: serde_json::Value,
}

/// A stored listing, as returned by a [`crate::ListingStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub detail_url: String,
    pub source_query: SourceQuery,
    pub posted_on: Option<NaiveDate>,
    pub raw_data: serde_json::Value,
    /// Time of the first successful write; never changed afterwards.
    pub ingested_at: DateTime<Utc>,
    /// Time of the last write that changed any content field.
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Builds the stored form of a freshly inserted listing.
    #[must_use]
    pub fn from_normalized(listing: NormalizedListing, now: DateTime<Utc>) -> Self {
        Self {
            id: listing.id,
            title: listing.title,
            company: listing.company,
            location: listing.location,
            detail_url: listing.detail_url,
            source_query: listing.source_query,
            posted_on: listing.posted_on,
            raw_data: listing.raw_data,
            ingested_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` when every content field matches `other`, ignoring the
    /// store-assigned timestamps.
    #[must_use]
    pub fn same_content_as(&self, other: &NormalizedListing) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.company == other.company
            && self.location == other.location
            && self.detail_url == other.detail_url
            && self.source_query == other.source_query
            && self.posted_on == other.posted_on
            && self.raw_data == other.raw_data
    }
}
