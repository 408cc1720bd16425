// src/providers.rs
//! Report providers and the ordered fallback chain over them.
//!
//! A provider turns `(symbol, date, window_days)` into a text blob. The chain
//! asks providers in order and stops at the first one that succeeds; every
//! failure before it is kept so the caller can say what was tried.

use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate};
use std::sync::Arc;

use crate::analyze::digest::{top_from_category, DigestPost};
use crate::analyze::PopularityAnalyzer;
use crate::config::{Settings, COMPANY_NEWS};
use crate::error::CollectorError;
use crate::ingest::retry::RetryPolicy;
use crate::market::Market;
use crate::news::{fetch_with_fallback, Page, PageSource, PagerConfig};
use crate::report::format_digest;

/// Posts per day pulled into the social report.
pub const DIGEST_POSTS_PER_DAY: usize = 20;

#[async_trait::async_trait]
pub trait ReportProvider: Send + Sync {
    async fn report(&self, symbol: &str, date: NaiveDate, window_days: u32) -> Result<String>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFailure {
    pub provider: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutcome {
    /// `(provider, text)` of the first success.
    pub success: Option<(&'static str, String)>,
    pub failures: Vec<ProviderFailure>,
}

impl ChainOutcome {
    pub fn text(&self) -> Option<&str> {
        self.success.as_ref().map(|(_, t)| t.as_str())
    }
}

#[derive(Default)]
pub struct ProviderChain {
    providers: Vec<Box<dyn ReportProvider>>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, p: impl ReportProvider + 'static) -> Self {
        self.providers.push(Box::new(p));
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub async fn first_success(&self, symbol: &str, date: NaiveDate, window_days: u32) -> ChainOutcome {
        let mut failures = Vec::new();
        for p in &self.providers {
            match p.report(symbol, date, window_days).await {
                Ok(text) => {
                    return ChainOutcome {
                        success: Some((p.name(), text)),
                        failures,
                    }
                }
                Err(e) => {
                    tracing::warn!(error = ?e, provider = p.name(), symbol, "provider failed, trying next");
                    failures.push(ProviderFailure {
                        provider: p.name(),
                        error: format!("{e:#}"),
                    });
                }
            }
        }
        ChainOutcome {
            success: None,
            failures,
        }
    }
}

/// Local social-media report: popularity summary plus the daily digests of
/// the lookback window. US listings only.
pub struct SocialBuzzProvider {
    settings: Arc<Settings>,
    analyzer: PopularityAnalyzer,
}

impl SocialBuzzProvider {
    pub fn new(settings: Arc<Settings>) -> Self {
        let analyzer = PopularityAnalyzer::new(settings.clone());
        Self { settings, analyzer }
    }
}

/// One digest day per page, oldest first. Each page holds exactly one entry
/// so a quiet day never reads as the end of the window.
struct DigestDays {
    settings: Arc<Settings>,
    symbol: String,
    start: NaiveDate,
    days: u32,
}

#[async_trait::async_trait]
impl PageSource for DigestDays {
    type Item = (NaiveDate, Vec<DigestPost>);

    async fn fetch_page(&self, n: u32) -> Result<Page<Self::Item>, CollectorError> {
        if n >= self.days {
            return Ok(Page {
                items: vec![],
                has_next: false,
            });
        }
        let day = self.start + Duration::days(i64::from(n));
        let settings = self.settings.clone();
        let symbol = self.symbol.clone();
        let posts = tokio::task::spawn_blocking(move || {
            top_from_category(&settings, COMPANY_NEWS, day, DIGEST_POSTS_PER_DAY, Some(&symbol))
        })
        .await
        .map_err(|e| CollectorError::Storage(e.to_string()))?
        .map_err(|e| CollectorError::Storage(format!("{e:#}")))?;
        Ok(Page {
            items: vec![(day, posts)],
            has_next: n + 1 < self.days,
        })
    }
}

#[async_trait::async_trait]
impl ReportProvider for SocialBuzzProvider {
    async fn report(&self, symbol: &str, date: NaiveDate, window_days: u32) -> Result<String> {
        match Market::classify(symbol) {
            Market::PrimaryMarket => {}
            m @ (Market::Domestic | Market::AltMarket) => {
                bail!("no social coverage for {} listings ({symbol})", m.display_name())
            }
        }

        let cfg = PagerConfig::from_settings(
            &self.settings.news,
            RetryPolicy::from(&self.settings.collector.retry),
        );
        let window = window_days.clamp(1, cfg.max_pages);
        if window < window_days {
            tracing::warn!(target: "news", requested = window_days, window, "report window capped by news.max_pages");
        }
        let start = date - Duration::days(i64::from(window - 1));
        // Stats count back from the last second of `date`, like the digests.
        let until = date
            .and_hms_opt(23, 59, 59)
            .context("report date out of range")?
            .and_utc();

        let days = Arc::new(DigestDays {
            settings: self.settings.clone(),
            symbol: symbol.to_string(),
            start,
            days: window,
        });
        let sections: Vec<String> = fetch_with_fallback(days, &cfg)
            .await
            .into_iter()
            .filter(|(_, posts)| !posts.is_empty())
            .map(|(day, posts)| format!("## {day}\n\n{}", format_digest(&posts)))
            .collect();

        let analyzer = self.analyzer.clone();
        let opts = analyzer.default_options().with_days(window);
        let sym = symbol.to_string();
        let a = tokio::task::spawn_blocking(move || analyzer.analyze_at(&sym, &opts, until))
            .await
            .context("analysis task failed")?;
        if sections.is_empty() && a.total_mentions == 0 {
            bail!("no social posts for {symbol} in the last {window} days");
        }

        let mut text = format!(
            "# {symbol} ({}) social discussion, {start} to {date}\n\nMentions: {}  Total score: {:.1}  Average: {:.1}  Main community: r/{}\n",
            self.settings.display_name(symbol),
            a.total_mentions,
            a.total_popularity,
            a.average_popularity,
            a.top_community(),
        );
        for s in sections {
            text.push('\n');
            text.push_str(&s);
            text.push('\n');
        }
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "social_buzz"
    }
}
