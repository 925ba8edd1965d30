//! Postgres-backed [`ListingStore`] over the `listings` table.
//!
//! Upserts rely on `ON CONFLICT (id) DO UPDATE ... WHERE ... IS DISTINCT FROM`
//! so a write of identical content touches nothing and returns no row.
//! Row-level locking makes concurrent upserts of the same id safe.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use jobsdb_core::{
    CompanyCount, Listing, ListingFilter, ListingStore, LocationCount, NormalizedListing,
    SourceQuery, StoreError, UpsertOutcome,
};
use sqlx::PgPool;

const LISTING_COLUMNS: &str = "id, title, company, location, detail_url, query_text, query_city, \
                               posted_on, raw_data, ingested_at, updated_at";

/// A row from the `listings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListingRow {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub detail_url: String,
    pub query_text: String,
    pub query_city: String,
    pub posted_on: Option<NaiveDate>,
    pub raw_data: serde_json::Value,
    pub ingested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ListingRow> for Listing {
    fn from(row: ListingRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            company: row.company,
            location: row.location,
            detail_url: row.detail_url,
            source_query: SourceQuery {
                text: row.query_text,
                city: row.query_city,
            },
            posted_on: row.posted_on,
            raw_data: row.raw_data,
            ingested_at: row.ingested_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgListingStore {
    pool: PgPool,
}

impl PgListingStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// SQLSTATE codes reported by a server that is dropping the session:
/// class `08` (connection exception) and the `57P0x` shutdown codes.
fn is_connection_sqlstate(code: &str) -> bool {
    code.starts_with("08") || matches!(code, "57P01" | "57P02" | "57P03")
}

/// Pool exhaustion, a closed pool and socket failures mean no later write can
/// succeed either; everything else is scoped to the one statement.
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::ConnectionLost(err.to_string()),
        sqlx::Error::Database(ref db_err)
            if db_err.code().is_some_and(|code| is_connection_sqlstate(&code)) =>
        {
            StoreError::ConnectionLost(err.to_string())
        }
        other => StoreError::Storage(other.to_string()),
    }
}

fn count_to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

#[async_trait]
impl ListingStore for PgListingStore {
    async fn upsert(&self, listing: &NormalizedListing) -> Result<UpsertOutcome, StoreError> {
        // `xmax = 0` only for a freshly inserted tuple.
        let inserted = sqlx::query_scalar::<_, bool>(
            "INSERT INTO listings \
                 (id, title, company, location, detail_url, query_text, query_city, \
                  posted_on, raw_data) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE SET \
                 title      = EXCLUDED.title, \
                 company    = EXCLUDED.company, \
                 location   = EXCLUDED.location, \
                 detail_url = EXCLUDED.detail_url, \
                 query_text = EXCLUDED.query_text, \
                 query_city = EXCLUDED.query_city, \
                 posted_on  = EXCLUDED.posted_on, \
                 raw_data   = EXCLUDED.raw_data, \
                 updated_at = NOW() \
             WHERE (listings.title, listings.company, listings.location, listings.detail_url, \
                    listings.query_text, listings.query_city, listings.posted_on, \
                    listings.raw_data) \
                   IS DISTINCT FROM \
                   (EXCLUDED.title, EXCLUDED.company, EXCLUDED.location, EXCLUDED.detail_url, \
                    EXCLUDED.query_text, EXCLUDED.query_city, EXCLUDED.posted_on, \
                    EXCLUDED.raw_data) \
             RETURNING (xmax = 0)",
        )
        .bind(&listing.id)
        .bind(&listing.title)
        .bind(&listing.company)
        .bind(&listing.location)
        .bind(&listing.detail_url)
        .bind(&listing.source_query.text)
        .bind(&listing.source_query.city)
        .bind(listing.posted_on)
        .bind(&listing.raw_data)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(match inserted {
            Some(true) => UpsertOutcome::Inserted,
            Some(false) => UpsertOutcome::Updated,
            None => UpsertOutcome::Unchanged,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<Listing>, StoreError> {
        let row = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Listing::from))
    }

    async fn count(&self, filter: &ListingFilter) -> Result<u64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM listings \
             WHERE ($1::text IS NULL OR query_text = $1) \
               AND ($2::text IS NULL OR query_city = $2) \
               AND ($3::text IS NULL OR LOWER(location) = LOWER($3)) \
               AND ($4::text IS NULL OR LOWER(company) = LOWER($4))",
        )
        .bind(filter.query_text.as_deref())
        .bind(filter.query_city.as_deref())
        .bind(filter.location.as_deref())
        .bind(filter.company.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(count_to_u64(count))
    }

    async fn group_by_location(&self) -> Result<Vec<LocationCount>, StoreError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT location, COUNT(*) AS total_jobs \
             FROM listings \
             GROUP BY location \
             ORDER BY total_jobs DESC, location ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(location, total_jobs)| LocationCount {
                location,
                total_jobs,
            })
            .collect())
    }

    async fn filter_by_city(&self, city: &str) -> Result<Vec<Listing>, StoreError> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings \
             WHERE LOWER(location) = LOWER($1) \
             ORDER BY title ASC, id ASC"
        ))
        .bind(city)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Listing::from).collect())
    }

    async fn top_companies(&self, limit: usize) -> Result<Vec<CompanyCount>, StoreError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT company, COUNT(*) AS job_count \
             FROM listings \
             GROUP BY company \
             ORDER BY job_count DESC, company ASC \
             LIMIT $1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(company, job_count)| CompanyCount { company, job_count })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_map_to_connection_lost() {
        assert!(map_sqlx_error(sqlx::Error::PoolTimedOut).is_connection_lost());
        assert!(map_sqlx_error(sqlx::Error::PoolClosed).is_connection_lost());
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(map_sqlx_error(sqlx::Error::Io(io)).is_connection_lost());
    }

    #[test]
    fn statement_failures_map_to_storage() {
        let err = map_sqlx_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Storage(_)));
        let err = map_sqlx_error(sqlx::Error::ColumnNotFound("raw_data".to_owned()));
        assert!(matches!(err, StoreError::Storage(_)));
    }

    #[test]
    fn shutdown_and_connection_sqlstates_are_connection_lost() {
        assert!(is_connection_sqlstate("08006"));
        assert!(is_connection_sqlstate("08003"));
        assert!(is_connection_sqlstate("57P01"));
        assert!(is_connection_sqlstate("57P03"));
        assert!(!is_connection_sqlstate("23505"));
        assert!(!is_connection_sqlstate("57014"));
    }

    #[test]
    fn negative_counts_clamp_to_zero() {
        assert_eq!(count_to_u64(-1), 0);
        assert_eq!(count_to_u64(42), 42);
    }
}
