// src/analyze/mod.rs
//! # Popularity analysis
//!
//! For one entity: stream every configured community collection, keep the
//! records inside the lookback window whose relevance clears the threshold,
//! score them and aggregate per community and overall.
//!
//! No index; each call rescans the files.

pub mod digest;
pub mod ranking;
pub mod scoring;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::config::Settings;
use crate::record::Record;
use crate::store::{self, CollectionStore};

pub use crate::analyze::ranking::{RankingEntry, RankingResult, SummaryStats, TrendLabel};
pub use crate::analyze::scoring::{popularity, relevance, time_decay, KeywordSet};

/// Number of records kept in [`AnalysisResult::top_posts`].
pub const TOP_POSTS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeOptions {
    /// Communities to scan; `None` means the configured stock communities.
    pub communities: Option<Vec<String>>,
    pub min_relevance: f64,
    pub days_back: u32,
}

impl AnalyzeOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            communities: None,
            min_relevance: settings.analysis.min_relevance,
            days_back: settings.analysis.days_back,
        }
    }

    pub fn with_days(mut self, days: u32) -> Self {
        self.days_back = days;
        self
    }

    pub fn with_min_relevance(mut self, min_relevance: f64) -> Self {
        self.min_relevance = min_relevance;
        self
    }
}

/// One record that passed the window and relevance filters.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoredPost {
    pub id: String,
    pub title: String,
    pub community: String,
    pub score: i64,
    pub comments: i64,
    pub upvotes: i64,
    pub relevance: f64,
    pub popularity: f64,
    /// Permalink of the post.
    pub url: String,
    pub created_at: f64,
}

impl ScoredPost {
    fn from_record(r: &Record, community: &str, relevance: f64, popularity: f64) -> Self {
        Self {
            id: r.id.clone(),
            title: r.title.clone(),
            community: community.to_string(),
            score: r.score,
            comments: r.comment_count,
            upvotes: r.upvotes,
            relevance,
            popularity,
            url: r.permalink.clone(),
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommunityBreakdown {
    pub name: String,
    pub weight: f64,
    pub mentions: usize,
    pub popularity: f64,
    pub posts: Vec<ScoredPost>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnalysisResult {
    pub symbol: String,
    pub keywords: Vec<String>,
    pub days_back: u32,
    pub total_mentions: usize,
    pub total_popularity: f64,
    pub average_popularity: f64,
    /// Communities whose collection file existed, in scan order.
    pub breakdown: Vec<CommunityBreakdown>,
    pub top_posts: Vec<ScoredPost>,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// Community with the most mentions; the first one wins a tie.
    /// Empty when nothing was scanned.
    pub fn top_community(&self) -> &str {
        let mut best: Option<&CommunityBreakdown> = None;
        for c in &self.breakdown {
            if best.map_or(true, |b| c.mentions > b.mentions) {
                best = Some(c);
            }
        }
        best.map(|c| c.name.as_str()).unwrap_or("")
    }
}

/// Descending by popularity.
pub(crate) fn by_popularity_desc(a: &ScoredPost, b: &ScoredPost) -> Ordering {
    b.popularity.total_cmp(&a.popularity)
}

#[derive(Debug, Clone)]
pub struct PopularityAnalyzer {
    settings: Arc<Settings>,
    store: CollectionStore,
}

impl PopularityAnalyzer {
    pub fn new(settings: Arc<Settings>) -> Self {
        let store = CollectionStore::new(settings.data_root.clone());
        Self { settings, store }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &CollectionStore {
        &self.store
    }

    pub fn default_options(&self) -> AnalyzeOptions {
        AnalyzeOptions::from_settings(&self.settings)
    }

    pub fn keywords_for(&self, symbol: &str) -> KeywordSet {
        KeywordSet::for_entity(symbol, self.settings.aliases(symbol))
    }

    pub fn analyze(&self, symbol: &str, opts: &AnalyzeOptions) -> AnalysisResult {
        self.analyze_at(symbol, opts, Utc::now())
    }

    /// Same as [`analyze`](Self::analyze) with an explicit clock.
    pub fn analyze_at(&self, symbol: &str, opts: &AnalyzeOptions, now: DateTime<Utc>) -> AnalysisResult {
        let keywords = self.keywords_for(symbol);
        let now_secs = now.timestamp() as f64 + f64::from(now.timestamp_subsec_millis()) / 1000.0;
        let cutoff = now_secs - f64::from(opts.days_back) * 86_400.0;
        let communities: &[String] = opts
            .communities
            .as_deref()
            .unwrap_or(self.settings.stock_communities.as_slice());

        let mut breakdown = Vec::with_capacity(communities.len());
        let mut all: Vec<ScoredPost> = Vec::new();
        let mut scanned = 0u64;

        for name in communities {
            let path = self.store.path_for(&self.settings.analysis_category, name);
            if !path.exists() {
                tracing::warn!(target: "analyzer", community = %name, path = %path.display(), "collection missing, skipping");
                continue;
            }
            let records = match store::read_records(&path) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(target: "analyzer", error = ?e, community = %name, "collection unreadable, skipping");
                    continue;
                }
            };

            let weights = &self.settings.community_weights;
            let weight = weights.weight_for(name);
            if !weights.is_weighted(name) {
                tracing::debug!(target: "analyzer", community = %name, weight, "no explicit weight, using default");
            }
            let mut bucket = CommunityBreakdown {
                name: name.clone(),
                weight,
                mentions: 0,
                popularity: 0.0,
                posts: Vec::new(),
            };

            for r in records {
                scanned += 1;
                if r.created_at < cutoff {
                    continue;
                }
                let rel = relevance(&r, &keywords);
                if rel < opts.min_relevance {
                    continue;
                }
                let pop = popularity(&r, weight, now_secs);
                let post = ScoredPost::from_record(&r, name, rel, pop);
                bucket.mentions += 1;
                bucket.popularity += pop;
                bucket.posts.push(post.clone());
                all.push(post);
            }
            breakdown.push(bucket);
        }
        counter!("analyzer_records_scanned_total").increment(scanned);

        let total_mentions = all.len();
        let total_popularity = all.iter().fold(0.0, |acc, p| acc + p.popularity);
        let average_popularity = if total_mentions > 0 {
            total_popularity / total_mentions as f64
        } else {
            0.0
        };
        all.sort_by(by_popularity_desc);
        all.truncate(TOP_POSTS);

        tracing::info!(
            target: "analyzer",
            symbol,
            mentions = total_mentions,
            total = total_popularity,
            "analysis finished"
        );

        AnalysisResult {
            symbol: symbol.to_string(),
            keywords: keywords.terms().into_iter().map(str::to_string).collect(),
            days_back: opts.days_back,
            total_mentions,
            total_popularity,
            average_popularity,
            breakdown,
            top_posts: all,
            generated_at: now,
        }
    }
}
