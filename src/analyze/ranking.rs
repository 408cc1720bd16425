// src/analyze/ranking.rs
//! Leaderboards over many entities: ranking, trending and head-to-head
//! comparison. The ordering logic is pure; [`PopularityAnalyzer`] methods
//! only feed it analyses.

use chrono::{DateTime, Utc};
use metrics::gauge;
use serde::Serialize;

use super::{AnalysisResult, AnalyzeOptions, PopularityAnalyzer, ScoredPost};

/// Sample posts carried by each ranking entry.
pub const SAMPLE_POSTS: usize = 3;
/// Candidate pool size for [`PopularityAnalyzer::trending`].
pub const TRENDING_POOL: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendLabel {
    None,
    Light,
    Moderate,
    Active,
    Hot,
}

impl TrendLabel {
    pub fn from_mentions(mentions: usize) -> Self {
        match mentions {
            0 => TrendLabel::None,
            1..=4 => TrendLabel::Light,
            5..=19 => TrendLabel::Moderate,
            20..=49 => TrendLabel::Active,
            _ => TrendLabel::Hot,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendLabel::None => "none",
            TrendLabel::Light => "light",
            TrendLabel::Moderate => "moderate",
            TrendLabel::Active => "active",
            TrendLabel::Hot => "hot",
        }
    }
}

impl std::fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankingEntry {
    /// 1-based; 0 for entries outside the top N.
    pub rank: usize,
    pub symbol: String,
    pub display_name: String,
    pub total_mentions: usize,
    pub total_popularity: f64,
    pub average_popularity: f64,
    pub top_community: String,
    pub trend: TrendLabel,
    pub sample_posts: Vec<ScoredPost>,
}

impl RankingEntry {
    pub fn from_analysis(a: &AnalysisResult, display_name: &str) -> Self {
        Self {
            rank: 0,
            symbol: a.symbol.clone(),
            display_name: display_name.to_string(),
            total_mentions: a.total_mentions,
            total_popularity: a.total_popularity,
            average_popularity: a.average_popularity,
            top_community: a.top_community().to_string(),
            trend: TrendLabel::from_mentions(a.total_mentions),
            sample_posts: a.top_posts.iter().take(SAMPLE_POSTS).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SummaryStats {
    pub total_mentions: usize,
    pub total_popularity: f64,
    pub average_mentions: f64,
    /// Highest total popularity, i.e. rank 1.
    pub most_discussed: String,
    /// Highest average popularity per mention.
    pub hottest: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankingResult {
    pub generated_at: DateTime<Utc>,
    pub days_back: u32,
    pub total_analyzed: usize,
    pub with_mentions: usize,
    pub top: Vec<RankingEntry>,
    pub summary: Option<SummaryStats>,
}

/// Drop zero-mention entries, sort by total popularity (descending, stable)
/// and number the first `top_n`. Entries past `top_n` keep rank 0.
pub fn rank_entries(entries: Vec<RankingEntry>, top_n: usize) -> Vec<RankingEntry> {
    let mut kept: Vec<RankingEntry> = entries
        .into_iter()
        .filter(|e| e.total_mentions > 0)
        .collect();
    kept.sort_by(|a, b| b.total_popularity.total_cmp(&a.total_popularity));
    for (i, e) in kept.iter_mut().enumerate() {
        e.rank = if i < top_n { i + 1 } else { 0 };
    }
    kept
}

/// Aggregates over an already ranked (and truncated) list.
pub fn summarize(top: &[RankingEntry]) -> Option<SummaryStats> {
    let first = top.first()?;
    let total_mentions: usize = top.iter().map(|e| e.total_mentions).sum();
    let total_popularity = top.iter().fold(0.0, |acc, e| acc + e.total_popularity);

    let mut hottest = first;
    for e in &top[1..] {
        if e.average_popularity > hottest.average_popularity {
            hottest = e;
        }
    }

    Some(SummaryStats {
        total_mentions,
        total_popularity,
        average_mentions: total_mentions as f64 / top.len() as f64,
        most_discussed: first.symbol.clone(),
        hottest: hottest.symbol.clone(),
    })
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComparisonEntry {
    pub symbol: String,
    pub display_name: String,
    pub mentions: usize,
    pub total_popularity: f64,
    pub average_popularity: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Comparison {
    pub generated_at: DateTime<Utc>,
    pub days_back: u32,
    pub symbols: Vec<String>,
    /// Sorted by total popularity, descending.
    pub rankings: Vec<ComparisonEntry>,
    pub winner: Option<String>,
}

impl PopularityAnalyzer {
    /// Analyze `symbols` (all configured entities when `None`) and build the
    /// top-`top_n` leaderboard.
    pub fn rank(&self, symbols: Option<&[String]>, opts: &AnalyzeOptions, top_n: usize) -> RankingResult {
        self.rank_at(symbols, opts, top_n, Utc::now())
    }

    pub fn rank_at(
        &self,
        symbols: Option<&[String]>,
        opts: &AnalyzeOptions,
        top_n: usize,
        now: DateTime<Utc>,
    ) -> RankingResult {
        let universe: Vec<String> = match symbols {
            Some(s) => s.to_vec(),
            None => self.settings().entities.keys().cloned().collect(),
        };
        tracing::info!(target: "ranking", symbols = universe.len(), top_n, "ranking started");

        let entries: Vec<RankingEntry> = universe
            .iter()
            .map(|sym| {
                let a = self.analyze_at(sym, opts, now);
                RankingEntry::from_analysis(&a, self.settings().display_name(sym))
            })
            .collect();

        let ranked = rank_entries(entries, top_n);
        let with_mentions = ranked.len();
        let top: Vec<RankingEntry> = ranked.into_iter().take(top_n).collect();
        let summary = summarize(&top);

        gauge!("ranking_last_run_ts").set(now.timestamp() as f64);
        tracing::info!(target: "ranking", with_mentions, shown = top.len(), "ranking finished");

        RankingResult {
            generated_at: now,
            days_back: opts.days_back,
            total_analyzed: universe.len(),
            with_mentions,
            top,
            summary,
        }
    }

    /// Entities from a wide leaderboard with at least `min_mentions` mentions.
    pub fn trending(&self, days: u32, min_mentions: usize) -> Vec<RankingEntry> {
        let opts = self.default_options().with_days(days);
        self.rank(None, &opts, TRENDING_POOL)
            .top
            .into_iter()
            .filter(|e| e.total_mentions >= min_mentions)
            .collect()
    }

    pub fn compare(&self, symbols: &[String], days: u32) -> Comparison {
        let opts = self.default_options().with_days(days);
        let now = Utc::now();
        let mut rankings: Vec<ComparisonEntry> = symbols
            .iter()
            .map(|sym| {
                let a = self.analyze_at(sym, &opts, now);
                ComparisonEntry {
                    symbol: sym.clone(),
                    display_name: self.settings().display_name(sym).to_string(),
                    mentions: a.total_mentions,
                    total_popularity: a.total_popularity,
                    average_popularity: a.average_popularity,
                }
            })
            .collect();
        rankings.sort_by(|a, b| b.total_popularity.total_cmp(&a.total_popularity));
        let winner = rankings.first().map(|e| e.symbol.clone());

        Comparison {
            generated_at: now,
            days_back: days,
            symbols: symbols.to_vec(),
            rankings,
            winner,
        }
    }
}
