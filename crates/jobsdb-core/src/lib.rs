pub mod app_config;
pub mod config;
pub mod listings;
pub mod memory;
pub mod store;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use listings::{Listing, NormalizedListing, SourceQuery};
pub use memory::MemoryListingStore;
pub use store::{
    CompanyCount, ListingFilter, ListingStore, LocationCount, StoreError, UpsertOutcome,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
