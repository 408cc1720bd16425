// src/metrics.rs
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Only one recorder may exist per process.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_described();
        Ok(Self { handle })
    }

    /// `GET /metrics` in the Prometheus text format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("collector_items_total", "Items normalized from community listings.");
        describe_counter!(
            "collector_item_errors_total",
            "Listing items skipped because normalization failed."
        );
        describe_counter!(
            "collector_community_failures_total",
            "Communities whose download yielded nothing or could not be saved."
        );
        describe_histogram!("collector_fetch_ms", "Listing page fetch time in milliseconds.");
        describe_counter!("store_merge_new_total", "Records inserted by collection merges.");
        describe_counter!(
            "store_merge_updated_total",
            "Stored records overlaid because a volatile field changed."
        );
        describe_counter!(
            "store_merge_skipped_total",
            "Incoming records identical to the stored copy."
        );
        describe_counter!(
            "store_corrupt_lines_total",
            "Collection lines skipped because they did not parse."
        );
        describe_counter!(
            "analyzer_records_scanned_total",
            "Records read from collections during analysis."
        );
        describe_gauge!("ranking_last_run_ts", "Unix ts when a ranking was last produced.");
        describe_counter!("news_pages_fetched_total", "News pages fetched successfully.");
    });
}
