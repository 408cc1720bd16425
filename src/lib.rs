// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod community_weights;
pub mod config;
pub mod error;
pub mod market;
pub mod metrics;
pub mod news;
pub mod providers;
pub mod record;
pub mod report;
pub mod store;

// Download path (platform client, retry, orchestration)
pub mod ingest;

// Relevance/popularity scoring, ranking, digests
pub mod analyze;

// ---- Re-exports for stable public API ----
pub use crate::analyze::{AnalysisResult, AnalyzeOptions, PopularityAnalyzer};
pub use crate::api::create_router;
pub use crate::config::{Credentials, Settings};
pub use crate::error::{CollectorError, ConfigError};
pub use crate::ingest::{Collector, Downloader, DownloadOptions};
pub use crate::record::Record;
pub use crate::store::{CollectionStore, MergeStats};

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str =
    "stock_buzz=info,collector=info,store=info,analyzer=info,ranking=info,news=info,warn";
