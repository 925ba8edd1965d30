//! Database operations for `ingestion_runs`.
//!
//! Status transitions are enforced in SQL: `queued → running → succeeded |
//! partial | failed`. An update against a row in the wrong status returns
//! [`DbError::InvalidRunTransition`].

use chrono::{DateTime, Utc};
use jobsdb_core::SourceQuery;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const RUN_COLUMNS: &str = "id, public_id, query_text, query_city, trigger_source, status, \
                           pages_fetched, records_seen, records_stored, records_failed, \
                           records_inserted, records_updated, records_unchanged, \
                           error_message, started_at, completed_at, created_at";

/// A row from the `ingestion_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IngestionRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub query_text: String,
    pub query_city: String,
    pub trigger_source: String,
    pub status: String,
    pub pages_fetched: i64,
    pub records_seen: i64,
    pub records_stored: i64,
    pub records_failed: i64,
    pub records_inserted: i64,
    pub records_updated: i64,
    pub records_unchanged: i64,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Counters written when a run leaves `running`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub pages_fetched: i64,
    pub records_seen: i64,
    pub records_stored: i64,
    pub records_failed: i64,
    pub records_inserted: i64,
    pub records_updated: i64,
    pub records_unchanged: i64,
}

/// Terminal status for a run that was not fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcomeStatus {
    Succeeded,
    Partial,
}

impl RunOutcomeStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcomeStatus::Succeeded => "succeeded",
            RunOutcomeStatus::Partial => "partial",
        }
    }
}

/// Creates a new ingestion run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_ingestion_run(
    pool: &PgPool,
    query: &SourceQuery,
    trigger_source: &str,
) -> Result<IngestionRunRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, IngestionRunRow>(&format!(
        "INSERT INTO ingestion_runs (public_id, query_text, query_city, trigger_source, status) \
         VALUES ($1, $2, $3, $4, 'queued') \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(public_id)
    .bind(&query.text)
    .bind(&query.city)
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `queued`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn start_ingestion_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE ingestion_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Records the final counters and moves a `running` run to `succeeded` or
/// `partial`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn complete_ingestion_run(
    pool: &PgPool,
    id: i64,
    status: RunOutcomeStatus,
    counts: &RunCounts,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    finish_run(pool, id, status.as_str(), counts, error_message).await
}

/// Marks a `running` run as `failed` with whatever counters it reached.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn fail_ingestion_run(
    pool: &PgPool,
    id: i64,
    counts: &RunCounts,
    error_message: &str,
) -> Result<(), DbError> {
    finish_run(pool, id, "failed", counts, Some(error_message)).await
}

async fn finish_run(
    pool: &PgPool,
    id: i64,
    status: &str,
    counts: &RunCounts,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE ingestion_runs \
         SET status = $1, completed_at = NOW(), \
             pages_fetched = $2, records_seen = $3, records_stored = $4, \
             records_failed = $5, records_inserted = $6, records_updated = $7, \
             records_unchanged = $8, error_message = $9 \
         WHERE id = $10 AND status = 'running'",
    )
    .bind(status)
    .bind(counts.pages_fetched)
    .bind(counts.records_seen)
    .bind(counts.records_stored)
    .bind(counts.records_failed)
    .bind(counts.records_inserted)
    .bind(counts.records_updated)
    .bind(counts.records_unchanged)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_ingestion_run(pool: &PgPool, id: i64) -> Result<IngestionRunRow, DbError> {
    let row = sqlx::query_as::<_, IngestionRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM ingestion_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_ingestion_runs(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<IngestionRunRow>, DbError> {
    let rows = sqlx::query_as::<_, IngestionRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM ingestion_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
