//! Read-only query commands. Each handler fetches through the
//! [`ListingStore`] trait and prints a plain-text table.

use jobsdb_core::{CompanyCount, Listing, ListingFilter, ListingStore, LocationCount};
use jobsdb_db::IngestionRunRow;

/// Placeholder shown for empty string fields.
const BLANK: &str = "\u{2014}";

fn or_blank(value: &str) -> &str {
    if value.is_empty() {
        BLANK
    } else {
        value
    }
}

pub(crate) async fn run_count(
    store: &dyn ListingStore,
    filter: &ListingFilter,
) -> anyhow::Result<()> {
    let count = store.count(filter).await?;
    println!("{count}");
    Ok(())
}

pub(crate) async fn run_locations(store: &dyn ListingStore) -> anyhow::Result<()> {
    let groups = store.group_by_location().await?;
    if groups.is_empty() {
        println!("no listings stored");
        return Ok(());
    }
    println!("{}", format_locations(&groups));
    Ok(())
}

pub(crate) async fn run_city(store: &dyn ListingStore, city: &str) -> anyhow::Result<()> {
    let listings = store.filter_by_city(city).await?;
    if listings.is_empty() {
        println!("no listings in {city}");
        return Ok(());
    }
    println!("{}", format_listings(&listings));
    Ok(())
}

pub(crate) async fn run_companies(store: &dyn ListingStore, limit: usize) -> anyhow::Result<()> {
    let companies = store.top_companies(limit).await?;
    if companies.is_empty() {
        println!("no listings stored");
        return Ok(());
    }
    println!("{}", format_companies(&companies));
    Ok(())
}

pub(crate) async fn run_runs(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = jobsdb_db::list_ingestion_runs(pool, limit).await?;
    if runs.is_empty() {
        println!("no ingestion runs recorded");
        return Ok(());
    }
    println!("{}", format_runs(&runs));
    Ok(())
}

pub(crate) fn format_locations(groups: &[LocationCount]) -> String {
    let mut lines = vec![format!("{:<40}{:>8}", "LOCATION", "JOBS")];
    lines.extend(
        groups
            .iter()
            .map(|g| format!("{:<40}{:>8}", or_blank(&g.location), g.total_jobs)),
    );
    lines.join("\n")
}

pub(crate) fn format_companies(companies: &[CompanyCount]) -> String {
    let mut lines = vec![format!("{:<40}{:>8}", "COMPANY", "JOBS")];
    lines.extend(
        companies
            .iter()
            .map(|c| format!("{:<40}{:>8}", or_blank(&c.company), c.job_count)),
    );
    lines.join("\n")
}

pub(crate) fn format_listings(listings: &[Listing]) -> String {
    let mut lines = vec![format!("{:<40}{:<30}{}", "TITLE", "COMPANY", "URL")];
    lines.extend(listings.iter().map(|l| {
        format!(
            "{:<40}{:<30}{}",
            or_blank(&l.title),
            or_blank(&l.company),
            or_blank(&l.detail_url)
        )
    }));
    lines.join("\n")
}

pub(crate) fn format_runs(runs: &[IngestionRunRow]) -> String {
    let mut lines = vec![format!(
        "{:<8}{:<11}{:<28}{:>8}{:>8}{:>8}  {}",
        "ID", "STATUS", "QUERY", "SEEN", "STORED", "FAILED", "CREATED"
    )];
    lines.extend(runs.iter().map(|r| {
        format!(
            "{:<8}{:<11}{:<28}{:>8}{:>8}{:>8}  {}",
            r.id,
            r.status,
            format!("{} @ {}", r.query_text, r.query_city),
            r.records_seen,
            r.records_stored,
            r.records_failed,
            r.created_at.format("%Y-%m-%d %H:%M UTC"),
        )
    }));
    lines.join("\n")
}
