pub mod client;
pub mod error;
pub mod normalize;
pub mod retry;
pub mod types;
pub mod walker;

pub use client::DiceClient;
pub use error::{FetchError, NormalizationError, WalkError};
pub use normalize::normalize_listing;
pub use retry::RetryPolicy;
pub use types::Envelope;
pub use walker::{CursorWalker, Page, PageCursor, WalkOptions};
