//! The `ingest` command: one ingestion run, recorded in `ingestion_runs`.
//!
//! Ctrl-C requests cancellation; the runner stops before the next page and
//! everything stored so far stays in place.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use jobsdb_core::{AppConfig, MemoryListingStore, SourceQuery};
use jobsdb_db::{PgListingStore, RunCounts, RunOutcomeStatus};
use jobsdb_dice::DiceClient;
use jobsdb_ingest::{IngestionRunner, RunSummary, RunnerOptions, TerminalState};
use tokio::sync::watch;

use crate::fail_run_best_effort;

/// Run one ingestion for `query` and print its summary.
///
/// With `dry_run` the run uses an in-memory store and no database is needed.
///
/// # Errors
///
/// Returns an error if the client cannot be built, the run row cannot be
/// created or finished, or the run itself ended fatally.
pub(crate) async fn run_ingest(
    config: &AppConfig,
    query: &SourceQuery,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let client = DiceClient::new(
        &config.dice_base_url,
        config.request_timeout_secs,
        &config.user_agent,
    )?;
    let options = RunnerOptions::from_app_config(config);
    let cancel = cancel_on_ctrl_c();

    if dry_run {
        let store = Arc::new(MemoryListingStore::new());
        let runner = IngestionRunner::new(client, store.clone(), options);
        let summary = runner.run_with_cancel(query, cancel).await;
        println!(
            "dry-run: {} distinct listings held in memory; nothing written",
            store.len()?
        );
        write_summary(&mut std::io::stdout(), &summary, json)?;
        return into_result(&summary);
    }

    let pool = jobsdb_db::connect_pool_from_config(config).await?;
    let run = jobsdb_db::create_ingestion_run(&pool, query, "cli").await?;
    if let Err(e) = jobsdb_db::start_ingestion_run(&pool, run.id).await {
        fail_run_best_effort(&pool, run.id, &RunCounts::default(), format!("{e:#}")).await;
        return Err(e.into());
    }

    let store = Arc::new(PgListingStore::new(pool.clone()));
    let runner = IngestionRunner::new(client, store, options);
    let summary = runner.run_with_cancel(query, cancel).await;
    let counts = run_counts(&summary);

    let record = async {
        let recorded = match summary.terminal_state {
            TerminalState::Completed => {
                jobsdb_db::complete_ingestion_run(
                    &pool,
                    run.id,
                    RunOutcomeStatus::Succeeded,
                    &counts,
                    None,
                )
                .await
            }
            TerminalState::PartiallyFailed | TerminalState::Cancelled => {
                let message = run_message(&summary);
                jobsdb_db::complete_ingestion_run(
                    &pool,
                    run.id,
                    RunOutcomeStatus::Partial,
                    &counts,
                    message.as_deref(),
                )
                .await
            }
            TerminalState::Fatal => {
                let message = run_message(&summary).unwrap_or_else(|| "fatal error".to_owned());
                jobsdb_db::fail_ingestion_run(&pool, run.id, &counts, &message).await
            }
        };
        if let Err(err) = recorded {
            fail_run_best_effort(&pool, run.id, &counts, format!("{err:#}")).await;
            return Err(anyhow::Error::from(err).context(format!("recording run {}", run.id)));
        }
        Ok(())
    };

    println!("run {} ({})", run.id, run.public_id);
    report_then_record(&mut std::io::stdout(), &summary, json, record).await
}

fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping before the next page");
            // The run may already be over, leaving no receiver.
            let _ = tx.send(true);
        }
    });
    rx
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn run_counts(summary: &RunSummary) -> RunCounts {
    RunCounts {
        pages_fetched: i64::try_from(summary.pages_fetched).unwrap_or(i64::MAX),
        records_seen: to_i64(summary.records_seen),
        records_stored: to_i64(summary.records_stored),
        records_failed: to_i64(summary.records_failed),
        records_inserted: to_i64(summary.records_inserted),
        records_updated: to_i64(summary.records_updated),
        records_unchanged: to_i64(summary.records_unchanged),
    }
}

/// The message stored with a non-successful run: the run-level error, else
/// the first record failure.
pub(crate) fn run_message(summary: &RunSummary) -> Option<String> {
    match summary.terminal_state {
        TerminalState::Cancelled => Some("cancelled by operator".to_owned()),
        _ => summary
            .error
            .clone()
            .or_else(|| summary.error_samples.first().map(ToString::to_string)),
    }
}

pub(crate) fn format_summary(summary: &RunSummary) -> String {
    let mut out = format!(
        "{} [{}]: pages={} seen={} stored={} (inserted={} updated={} unchanged={}) failed={}",
        summary.query,
        summary.terminal_state,
        summary.pages_fetched,
        summary.records_seen,
        summary.records_stored,
        summary.records_inserted,
        summary.records_updated,
        summary.records_unchanged,
        summary.records_failed,
    );
    if let Some(err) = &summary.error {
        out.push_str("\nerror: ");
        out.push_str(err);
    }
    for sample in &summary.error_samples {
        out.push_str("\n  - ");
        out.push_str(&sample.to_string());
    }
    let sampled = u64::try_from(summary.error_samples.len()).unwrap_or(u64::MAX);
    let unsampled = summary.records_failed.saturating_sub(sampled);
    if unsampled > 0 {
        out.push_str(&format!("\n  ... {unsampled} more record failure(s)"));
    }
    out
}

fn write_summary(out: &mut impl Write, summary: &RunSummary, json: bool) -> anyhow::Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(summary)?)?;
    } else {
        writeln!(out, "{}", format_summary(summary))?;
    }
    Ok(())
}

/// Writes the summary, then awaits `record`. The operator sees the counters
/// even if the run row cannot be written.
pub(crate) async fn report_then_record<W, F>(
    out: &mut W,
    summary: &RunSummary,
    json: bool,
    record: F,
) -> anyhow::Result<()>
where
    W: Write,
    F: Future<Output = anyhow::Result<()>>,
{
    write_summary(out, summary, json)?;
    record.await?;
    into_result(summary)
}

fn into_result(summary: &RunSummary) -> anyhow::Result<()> {
    if summary.terminal_state == TerminalState::Fatal {
        anyhow::bail!(
            "ingestion run failed: {}",
            summary.error.as_deref().unwrap_or("unknown error")
        );
    }
    if summary.terminal_state == TerminalState::PartiallyFailed {
        tracing::warn!(
            records_failed = summary.records_failed,
            "ingestion finished with failures"
        );
    }
    Ok(())
}
