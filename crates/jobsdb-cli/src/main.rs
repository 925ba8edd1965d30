mod ingest;
mod query;

use clap::{Parser, Subcommand};
use jobsdb_core::{AppConfig, ListingFilter, SourceQuery};
use jobsdb_db::{PgListingStore, RunCounts};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "jobsdb-cli")]
#[command(about = "Ingest and query Dice job listings")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Fetch every result page for a query and upsert the listings
    Ingest {
        /// Skill text, e.g. "python"
        #[arg(long)]
        text: String,
        /// City name or zip code, e.g. "07059"
        #[arg(long)]
        city: String,
        /// Run against an in-memory store; nothing is written to the database
        #[arg(long)]
        dry_run: bool,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Count stored listings, optionally filtered
    Count {
        /// Only listings ingested for this query text
        #[arg(long)]
        text: Option<String>,
        /// Only listings ingested for this query city
        #[arg(long)]
        city: Option<String>,
        /// Only listings at this location (case-insensitive)
        #[arg(long)]
        location: Option<String>,
        /// Only listings from this company (case-insensitive)
        #[arg(long)]
        company: Option<String>,
    },
    /// Listing counts per location
    Locations,
    /// Listings located in one city
    City {
        /// Location to match, e.g. "Warren, NJ"
        name: String,
    },
    /// Companies with the most listings
    Companies {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Recent ingestion runs
    Runs {
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("jobsdb-cli ready; run with --help to list commands");
        return Ok(());
    };

    let config = jobsdb_core::load_app_config()?;
    init_tracing(&config)?;

    match command {
        Commands::Db { command } => {
            let pool = jobsdb_db::connect_pool_from_config(&config).await?;
            match command {
                DbCommands::Ping => {
                    jobsdb_db::health_check(&pool).await?;
                    println!("database connection ok");
                }
                DbCommands::Migrate => {
                    let applied = jobsdb_db::run_migrations(&pool).await?;
                    println!("applied {applied} migration(s)");
                }
            }
        }
        Commands::Ingest {
            text,
            city,
            dry_run,
            json,
        } => {
            ingest::run_ingest(&config, &SourceQuery::new(text, city), dry_run, json).await?;
        }
        Commands::Count {
            text,
            city,
            location,
            company,
        } => {
            let store = connect_store(&config).await?;
            let filter = ListingFilter {
                query_text: text,
                query_city: city,
                location,
                company,
            };
            query::run_count(&store, &filter).await?;
        }
        Commands::Locations => {
            let store = connect_store(&config).await?;
            query::run_locations(&store).await?;
        }
        Commands::City { name } => {
            let store = connect_store(&config).await?;
            query::run_city(&store, &name).await?;
        }
        Commands::Companies { limit } => {
            let store = connect_store(&config).await?;
            query::run_companies(&store, limit).await?;
        }
        Commands::Runs { limit } => {
            let pool = jobsdb_db::connect_pool_from_config(&config).await?;
            query::run_runs(&pool, limit).await?;
        }
    }

    Ok(())
}

/// `RUST_LOG` wins over `JOBSDB_LOG_LEVEL` when both are set.
fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn connect_store(config: &AppConfig) -> anyhow::Result<PgListingStore> {
    let pool = jobsdb_db::connect_pool_from_config(config).await?;
    Ok(PgListingStore::new(pool))
}

/// Attempt to mark an ingestion run as failed, logging any secondary error.
pub(crate) async fn fail_run_best_effort(
    pool: &sqlx::PgPool,
    run_id: i64,
    counts: &RunCounts,
    message: String,
) {
    if let Err(mark_err) = jobsdb_db::fail_ingestion_run(pool, run_id, counts, &message).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark ingestion run as failed"
        );
    }
}
