// src/ingest/mod.rs
//! # Collector
//!
//! Pulls community listings page by page, normalizes every item into a
//! [`Record`] and hands the batch to the [`CollectionStore`] merge.
//!
//! - One await at a time: communities, pages and items are processed in order.
//! - A small pause after every item, a longer one between communities.
//! - An item that does not normalize is logged and skipped.
//! - An auth failure aborts the whole run; any other failure only fails the
//!   community it happened in.

pub mod reddit;
pub mod retry;
pub mod types;

use metrics::{counter, histogram};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::config::{CollectorSettings, Settings};
use crate::error::{CollectorError, ConfigError};
use crate::ingest::retry::{with_retry, RetryPolicy};
use crate::ingest::types::{ListingMode, ListingRequest, ListingSource, TimeFilter};
use crate::record::Record;
use crate::store::{CollectionStore, MergeStats};

/// Category used for ad-hoc community lists.
pub const CUSTOM_CATEGORY: &str = "custom";

/// Platform's per-page maximum.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Consecutive pages without a single usable item before a listing is abandoned.
pub const MAX_IDLE_PAGES: u32 = 3;

const DELETED_AUTHOR: &str = "[deleted]";
const PERMALINK_HOST: &str = "https://reddit.com";

/// Knobs of one download run.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOptions {
    pub limit: u32,
    pub mode: ListingMode,
    pub time_filter: TimeFilter,
    /// Merge is already incremental; this is carried for logging only.
    pub force_refresh: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            limit: 100,
            mode: ListingMode::Hot,
            time_filter: TimeFilter::Week,
            force_refresh: false,
        }
    }
}

impl DownloadOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "limit",
                value: "0".into(),
            });
        }
        Ok(())
    }
}

/// Outcome for one community of a run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommunityStatus {
    pub ok: bool,
    pub collected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommunityStatus {
    fn failed(collected: usize, error: impl Into<String>) -> Self {
        counter!("collector_community_failures_total").increment(1);
        Self {
            ok: false,
            collected,
            merge: None,
            error: Some(error.into()),
        }
    }
}

/// Per-community outcome of downloading one category.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryReport {
    pub category: String,
    pub communities: BTreeMap<String, CommunityStatus>,
}

impl CategoryReport {
    /// A category succeeds when at least one community did.
    pub fn success(&self) -> bool {
        self.communities.values().any(|s| s.ok)
    }

    pub fn succeeded(&self) -> usize {
        self.communities.values().filter(|s| s.ok).count()
    }
}

pub struct Collector {
    source: Arc<dyn ListingSource>,
    store: CollectionStore,
    settings: CollectorSettings,
    retry: RetryPolicy,
}

impl Collector {
    pub fn new(source: Arc<dyn ListingSource>, store: CollectionStore, settings: CollectorSettings) -> Self {
        crate::metrics::ensure_described();
        let retry = RetryPolicy::from(&settings.retry);
        Self {
            source,
            store,
            settings,
            retry,
        }
    }

    pub fn store(&self) -> &CollectionStore {
        &self.store
    }

    /// Fetch up to `limit` normalized records from one community.
    ///
    /// Pages are requested until the limit is reached or the listing runs out.
    /// A failing first page fails the community; a failing later page keeps
    /// what was already collected. A cursor seen before, or
    /// [`MAX_IDLE_PAGES`] pages in a row with nothing usable, ends the listing.
    pub async fn collect(
        &self,
        community: &str,
        mode: ListingMode,
        limit: u32,
        time_filter: TimeFilter,
    ) -> Result<Vec<Record>, CollectorError> {
        let community = community.trim();
        if community.is_empty() {
            return Err(CollectorError::Decode("empty community name".into()));
        }
        let limit = limit as usize;
        tracing::info!(target: "collector", community, %mode, limit, "downloading");

        let mut out: Vec<Record> = Vec::with_capacity(limit.min(1_000));
        let mut after: Option<String> = None;
        let mut seen_cursors: HashSet<String> = HashSet::new();
        let mut idle_pages = 0u32;
        let mut first = true;

        while out.len() < limit {
            let remaining = (limit - out.len()) as u32;
            let req = ListingRequest {
                community: community.to_string(),
                mode,
                time_filter,
                page_size: remaining.min(self.settings.page_size).min(MAX_PAGE_SIZE).max(1),
                after: after.clone(),
            };

            let started = Instant::now();
            let page = match with_retry(&self.retry, community, || self.source.fetch_page(&req)).await {
                Ok(p) => p,
                Err(e) if e.is_fatal() || first => return Err(e),
                Err(e) => {
                    tracing::warn!(target: "collector", error = %e, community, kept = out.len(), "page failed, keeping earlier pages");
                    break;
                }
            };
            histogram!("collector_fetch_ms").record(started.elapsed().as_secs_f64() * 1000.0);
            first = false;

            if page.items.is_empty() {
                break;
            }
            let before = out.len();
            for item in &page.items {
                if out.len() >= limit {
                    break;
                }
                match normalize_item(item, community) {
                    Ok(r) => {
                        counter!("collector_items_total").increment(1);
                        out.push(r);
                    }
                    Err(reason) => {
                        counter!("collector_item_errors_total").increment(1);
                        tracing::warn!(target: "collector", community, reason = %reason, "skipping item");
                    }
                }
                pause(self.settings.item_delay()).await;
            }

            if out.len() == before {
                idle_pages += 1;
                if idle_pages >= MAX_IDLE_PAGES {
                    tracing::warn!(target: "collector", community, pages = idle_pages, "no usable items on recent pages, stopping");
                    break;
                }
            } else {
                idle_pages = 0;
            }

            match page.after {
                Some(cursor) if seen_cursors.insert(cursor.clone()) => after = Some(cursor),
                Some(cursor) => {
                    tracing::warn!(target: "collector", community, %cursor, "listing cursor repeated, stopping");
                    break;
                }
                None => break,
            }
        }

        tracing::info!(target: "collector", community, count = out.len(), "downloaded");
        Ok(out)
    }

    /// Download and merge every community in `communities` under `category`.
    /// Only an auth failure is returned as an error.
    pub async fn download_category(
        &self,
        category: &str,
        communities: &[String],
        opts: &DownloadOptions,
    ) -> Result<CategoryReport, CollectorError> {
        tracing::info!(
            target: "collector",
            category,
            communities = communities.len(),
            force_refresh = opts.force_refresh,
            "category download started"
        );

        let mut report = CategoryReport {
            category: category.to_string(),
            communities: BTreeMap::new(),
        };

        for (i, community) in communities.iter().enumerate() {
            if i > 0 {
                pause(self.settings.community_delay()).await;
            }
            let status = self.download_community(category, community, opts).await?;
            report.communities.insert(community.clone(), status);
        }

        tracing::info!(
            target: "collector",
            category,
            succeeded = report.succeeded(),
            total = report.communities.len(),
            "category download finished"
        );
        Ok(report)
    }

    async fn download_community(
        &self,
        category: &str,
        community: &str,
        opts: &DownloadOptions,
    ) -> Result<CommunityStatus, CollectorError> {
        let batch = match self.collect(community, opts.mode, opts.limit, opts.time_filter).await {
            Ok(b) => b,
            Err(e) if e.is_fatal() => {
                tracing::error!(target: "collector", error = %e, community, "authentication failed, aborting run");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(target: "collector", error = %e, community, "community download failed");
                return Ok(CommunityStatus::failed(0, e.to_string()));
            }
        };

        if batch.is_empty() {
            tracing::warn!(target: "collector", community, "no items collected");
            return Ok(CommunityStatus::failed(0, "no items collected"));
        }

        let collected = batch.len();
        match self.store.merge(category, community, batch) {
            Ok(stats) => Ok(CommunityStatus {
                ok: true,
                collected,
                merge: Some(stats),
                error: None,
            }),
            Err(e) => {
                tracing::warn!(target: "collector", error = ?e, community, "saving collection failed");
                Ok(CommunityStatus::failed(collected, format!("{e:#}")))
            }
        }
    }
}

/// Orchestrates runs over the configured categories.
pub struct Downloader {
    collector: Collector,
    settings: Arc<Settings>,
}

impl Downloader {
    pub fn new(collector: Collector, settings: Arc<Settings>) -> Self {
        Self { collector, settings }
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    /// One configured category, or an explicit list of its communities.
    pub async fn download_category(
        &self,
        category: &str,
        communities: Option<&[String]>,
        opts: &DownloadOptions,
    ) -> Result<CategoryReport, CollectorError> {
        let list: Vec<String> = match communities {
            Some(c) => c.to_vec(),
            None => match self.settings.communities_for(category) {
                Some(c) => c.to_vec(),
                None => {
                    tracing::error!(target: "collector", category, "unknown category");
                    Vec::new()
                }
            },
        };
        self.collector.download_category(category, &list, opts).await
    }

    /// Every configured category, in name order. Stops at the first auth failure.
    pub async fn download_all(&self, opts: &DownloadOptions) -> Result<Vec<CategoryReport>, CollectorError> {
        let mut reports = Vec::with_capacity(self.settings.categories.len());
        for (category, communities) in &self.settings.categories {
            reports.push(self.collector.download_category(category, communities, opts).await?);
        }
        let ok = reports.iter().filter(|r| r.success()).count();
        tracing::info!(target: "collector", ok, total = reports.len(), "all categories finished");
        Ok(reports)
    }

    /// Ad-hoc community list, stored under the `custom` category.
    pub async fn download_custom(
        &self,
        communities: &[String],
        opts: &DownloadOptions,
    ) -> Result<CategoryReport, CollectorError> {
        self.collector
            .download_category(CUSTOM_CATEGORY, communities, opts)
            .await
    }
}

async fn pause(d: std::time::Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}

/// Turn one raw listing item into a [`Record`].
///
/// Requires a non-empty string `id` and a string `title`. Titles are
/// entity-decoded and whitespace-collapsed, bodies only entity-decoded.
pub fn normalize_item(item: &Value, community: &str) -> Result<Record, String> {
    let obj = item.as_object().ok_or("item is not an object")?;

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or("missing id")?;
    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| format!("item {id} has no title"))?;

    let mut r = Record::new(id, normalize_title(title));
    r.body = obj
        .get("selftext")
        .and_then(Value::as_str)
        .map(|s| html_escape::decode_html_entities(s).to_string())
        .unwrap_or_default();
    r.url = obj.get("url").and_then(Value::as_str).map(str::to_string);
    r.source_community = obj
        .get("subreddit")
        .and_then(Value::as_str)
        .unwrap_or(community)
        .to_string();
    r.upvotes = int_field(obj, "ups");
    r.downvotes = int_field(obj, "downs");
    r.score = int_field(obj, "score");
    r.upvote_ratio = obj.get("upvote_ratio").and_then(Value::as_f64);
    r.comment_count = int_field(obj, "num_comments");
    r.created_at = obj.get("created_utc").and_then(Value::as_f64).unwrap_or(0.0);
    r.author = obj
        .get("author")
        .and_then(Value::as_str)
        .filter(|a| !a.is_empty())
        .unwrap_or(DELETED_AUTHOR)
        .to_string();
    r.permalink = match obj.get("permalink").and_then(Value::as_str) {
        Some(p) if p.starts_with('/') => format!("{PERMALINK_HOST}{p}"),
        Some(p) => p.to_string(),
        None => String::new(),
    };
    r.domain = str_field(obj, "domain");
    r.is_self = bool_field(obj, "is_self");
    r.nsfw = bool_field(obj, "over_18");
    r.spoiler = bool_field(obj, "spoiler");
    r.locked = bool_field(obj, "locked");
    r.stickied = bool_field(obj, "stickied");
    Ok(r)
}

/// Entity-decode and collapse whitespace.
pub fn normalize_title(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn int_field(obj: &serde_json::Map<String, Value>, key: &str) -> i64 {
    match obj.get(key) {
        Some(v) => v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)).unwrap_or(0),
        None => 0,
    }
}

fn str_field(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    obj.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn bool_field(obj: &serde_json::Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_full_item() {
        let item = json!({
            "id": "abc",
            "title": "  Apple &amp; Nvidia\n earnings  ",
            "selftext": "Q&amp;A inside",
            "url": "https://example.com/x",
            "ups": 120,
            "score": 118,
            "upvote_ratio": 0.97,
            "num_comments": 45,
            "created_utc": 1_700_000_000.0,
            "author": null,
            "subreddit": "stocks",
            "permalink": "/r/stocks/comments/abc/apple/",
            "is_self": true,
            "over_18": false,
            "stickied": true
        });
        let r = normalize_item(&item, "fallback").unwrap();
        assert_eq!(r.id, "abc");
        assert_eq!(r.title, "Apple & Nvidia earnings");
        assert_eq!(r.body, "Q&A inside");
        assert_eq!(r.source_community, "stocks");
        assert_eq!(r.author, "[deleted]");
        assert_eq!(r.permalink, "https://reddit.com/r/stocks/comments/abc/apple/");
        assert_eq!(r.upvote_ratio, Some(0.97));
        assert_eq!(r.comment_count, 45);
        assert_eq!(r.downvotes, 0);
        assert!(r.is_self && r.stickied && !r.nsfw);
        assert!(r.extra.is_empty());
    }

    #[test]
    fn missing_id_or_title_fails() {
        assert!(normalize_item(&json!({ "title": "x" }), "c").is_err());
        assert!(normalize_item(&json!({ "id": "  ", "title": "x" }), "c").is_err());
        assert!(normalize_item(&json!({ "id": "a" }), "c").is_err());
        assert!(normalize_item(&json!("nope"), "c").is_err());
    }

    #[test]
    fn community_falls_back_to_requested_name() {
        let r = normalize_item(&json!({ "id": "a", "title": "t" }), "investing").unwrap();
        assert_eq!(r.source_community, "investing");
        assert_eq!(r.author, "[deleted]");
    }

    #[test]
    fn zero_limit_is_rejected() {
        let opts = DownloadOptions {
            limit: 0,
            ..DownloadOptions::default()
        };
        assert!(opts.validate().is_err());
        assert!(DownloadOptions::default().validate().is_ok());
    }

    #[test]
    fn category_success_needs_one_ok_community() {
        let mut report = CategoryReport {
            category: "c".into(),
            communities: BTreeMap::new(),
        };
        assert!(!report.success());
        report.communities.insert(
            "a".into(),
            CommunityStatus {
                ok: false,
                collected: 0,
                merge: None,
                error: Some("x".into()),
            },
        );
        assert!(!report.success());
        report.communities.insert(
            "b".into(),
            CommunityStatus {
                ok: true,
                collected: 1,
                merge: None,
                error: None,
            },
        );
        assert!(report.success());
        assert_eq!(report.succeeded(), 1);
    }
}
