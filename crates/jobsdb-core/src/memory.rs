//! In-process [`ListingStore`] backed by a `BTreeMap`.
//!
//! Used by `ingest --dry-run` and by the pipeline tests. The map is guarded by
//! a `std::sync::Mutex` that is never held across an await point.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::listings::{Listing, NormalizedListing};
use crate::store::{
    CompanyCount, ListingFilter, ListingStore, LocationCount, StoreError, UpsertOutcome,
};

#[derive(Debug, Default)]
pub struct MemoryListingStore {
    listings: Mutex<BTreeMap<String, Listing>>,
}

impl MemoryListingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored listings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the lock was poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the lock was poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.is_empty())
    }

    /// Snapshot of all stored listings ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the lock was poisoned.
    pub fn snapshot(&self) -> Result<Vec<Listing>, StoreError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Listing>>, StoreError> {
        self.listings
            .lock()
            .map_err(|e| StoreError::Storage(format!("listing map lock poisoned: {e}")))
    }
}

#[async_trait]
impl ListingStore for MemoryListingStore {
    async fn upsert(&self, listing: &NormalizedListing) -> Result<UpsertOutcome, StoreError> {
        let mut map = self.lock()?;
        let now = Utc::now();

        match map.get_mut(&listing.id) {
            Some(existing) if existing.same_content_as(listing) => Ok(UpsertOutcome::Unchanged),
            Some(existing) => {
                let ingested_at = existing.ingested_at;
                let mut refreshed = Listing::from_normalized(listing.clone(), now);
                refreshed.ingested_at = ingested_at;
                *existing = refreshed;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                map.insert(
                    listing.id.clone(),
                    Listing::from_normalized(listing.clone(), now),
                );
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Listing>, StoreError> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn count(&self, filter: &ListingFilter) -> Result<u64, StoreError> {
        let map = self.lock()?;
        let n = map.values().filter(|l| filter.matches(l)).count();
        Ok(u64::try_from(n).unwrap_or(u64::MAX))
    }

    async fn group_by_location(&self) -> Result<Vec<LocationCount>, StoreError> {
        let map = self.lock()?;
        let grouped = tally(map.values().map(|l| l.location.as_str()));
        Ok(grouped
            .into_iter()
            .map(|(location, total_jobs)| LocationCount {
                location,
                total_jobs,
            })
            .collect())
    }

    async fn filter_by_city(&self, city: &str) -> Result<Vec<Listing>, StoreError> {
        let map = self.lock()?;
        let city = city.to_lowercase();
        let mut matches: Vec<Listing> = map
            .values()
            .filter(|l| l.location.to_lowercase() == city)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        Ok(matches)
    }

    async fn top_companies(&self, limit: usize) -> Result<Vec<CompanyCount>, StoreError> {
        let map = self.lock()?;
        let grouped = tally(map.values().map(|l| l.company.as_str()));
        Ok(grouped
            .into_iter()
            .take(limit)
            .map(|(company, job_count)| CompanyCount { company, job_count })
            .collect())
    }
}

/// Counts occurrences of each key, sorted by count descending then key.
fn tally<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<(String, i64)> {
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    let mut out: Vec<(String, i64)> = counts
        .into_iter()
        .map(|(k, n)| (k.to_owned(), n))
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listings::SourceQuery;

    fn listing(id: &str, title: &str, company: &str, location: &str) -> NormalizedListing {
        NormalizedListing {
            id: id.to_owned(),
            title: title.to_owned(),
            company: company.to_owned(),
            location: location.to_owned(),
            detail_url: format!("https://www.dice.com/job/result/{id}"),
            source_query: SourceQuery::new("python", "07059"),
            posted_on: None,
            raw_data: serde_json::json!({ "jobTitle": title }),
        }
    }

    #[tokio::test]
    async fn upsert_inserts_then_reports_unchanged() {
        let store = MemoryListingStore::new();
        let l = listing("a1", "Python Developer", "Acme", "Warren, NJ");

        assert_eq!(store.upsert(&l).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert(&l).await.unwrap(), UpsertOutcome::Unchanged);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_same_id_keeps_latest_title_and_first_ingested_at() {
        let store = MemoryListingStore::new();
        let first = listing("a1", "Python Developer", "Acme", "Warren, NJ");
        store.upsert(&first).await.unwrap();
        let ingested_at = store.get("a1").await.unwrap().unwrap().ingested_at;

        let second = listing("a1", "Senior Python Developer", "Acme", "Warren, NJ");
        assert_eq!(store.upsert(&second).await.unwrap(), UpsertOutcome::Updated);

        let stored = store.snapshot().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "Senior Python Developer");
        assert_eq!(stored[0].ingested_at, ingested_at);
    }

    #[tokio::test]
    async fn unchanged_upsert_does_not_touch_updated_at() {
        let store = MemoryListingStore::new();
        let l = listing("a1", "Python Developer", "Acme", "Warren, NJ");
        store.upsert(&l).await.unwrap();
        let before = store.get("a1").await.unwrap().unwrap();

        store.upsert(&l).await.unwrap();
        let after = store.get("a1").await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn count_applies_every_filter_field() {
        let store = MemoryListingStore::new();
        store
            .upsert(&listing("a1", "Dev", "Acme", "Warren, NJ"))
            .await
            .unwrap();
        store
            .upsert(&listing("a2", "Dev", "Globex", "Newark, NJ"))
            .await
            .unwrap();

        assert_eq!(store.count(&ListingFilter::default()).await.unwrap(), 2);

        let by_location = ListingFilter {
            location: Some("warren, nj".to_owned()),
            ..ListingFilter::default()
        };
        assert_eq!(store.count(&by_location).await.unwrap(), 1);

        let by_company_and_city = ListingFilter {
            company: Some("GLOBEX".to_owned()),
            query_city: Some("07059".to_owned()),
            ..ListingFilter::default()
        };
        assert_eq!(store.count(&by_company_and_city).await.unwrap(), 1);

        let no_match = ListingFilter {
            query_text: Some("java".to_owned()),
            ..ListingFilter::default()
        };
        assert_eq!(store.count(&no_match).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn group_by_location_orders_by_count_then_name() {
        let store = MemoryListingStore::new();
        for (id, loc) in [
            ("a1", "Warren, NJ"),
            ("a2", "Newark, NJ"),
            ("a3", "Newark, NJ"),
            ("a4", "Edison, NJ"),
        ] {
            store.upsert(&listing(id, "Dev", "Acme", loc)).await.unwrap();
        }

        let groups = store.group_by_location().await.unwrap();
        let pairs: Vec<(&str, i64)> = groups
            .iter()
            .map(|g| (g.location.as_str(), g.total_jobs))
            .collect();
        assert_eq!(
            pairs,
            vec![("Newark, NJ", 2), ("Edison, NJ", 1), ("Warren, NJ", 1)]
        );
    }

    #[tokio::test]
    async fn filter_by_city_is_case_insensitive_and_empty_is_ok() {
        let store = MemoryListingStore::new();
        store
            .upsert(&listing("b", "Zeta Engineer", "Acme", "Warren, NJ"))
            .await
            .unwrap();
        store
            .upsert(&listing("a", "Alpha Engineer", "Acme", "Warren, NJ"))
            .await
            .unwrap();

        let hits = store.filter_by_city("WARREN, NJ").await.unwrap();
        let titles: Vec<&str> = hits.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha Engineer", "Zeta Engineer"]);

        assert!(store.filter_by_city("Boston, MA").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn case_folding_covers_non_ascii_letters() {
        let store = MemoryListingStore::new();
        store
            .upsert(&listing("m1", "Backend Engineer", "Ärzte AG", "München"))
            .await
            .unwrap();

        assert_eq!(store.filter_by_city("MÜNCHEN").await.unwrap().len(), 1);
        let filter = ListingFilter {
            company: Some("ärzte ag".to_owned()),
            location: Some("münchen".to_owned()),
            ..ListingFilter::default()
        };
        assert_eq!(store.count(&filter).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn top_companies_respects_limit() {
        let store = MemoryListingStore::new();
        for (id, company) in [("a1", "Acme"), ("a2", "Acme"), ("a3", "Globex"), ("a4", "Initech")] {
            store
                .upsert(&listing(id, "Dev", company, "Warren, NJ"))
                .await
                .unwrap();
        }

        let top = store.top_companies(2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].company, "Acme");
        assert_eq!(top[0].job_count, 2);
        assert_eq!(top[1].company, "Globex");
    }

    #[tokio::test]
    async fn concurrent_upserts_of_disjoint_keys_are_all_kept() {
        let store = std::sync::Arc::new(MemoryListingStore::new());
        let mut handles = Vec::new();
        for task in 0..4 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for n in 0..25 {
                    let id = format!("t{task}-{n}");
                    store
                        .upsert(&listing(&id, "Dev", "Acme", "Warren, NJ"))
                        .await
                        .unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.len().unwrap(), 100);
    }
}
