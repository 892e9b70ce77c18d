// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod feed;
pub mod logging;
pub mod notify;
pub mod run;
pub mod source;
pub mod store;
pub mod timeparse;

// ---- Re-exports for stable public API ----
pub use crate::feed::types::{ContentLink, NormalizedFeedItem, RawFeedItem};
pub use crate::feed::{filter_fresh, FilterOutcome, FreshnessFilter};
pub use crate::run::{run_once, RunSummary};
pub use crate::timeparse::{normalize, NormalizationFailure};
