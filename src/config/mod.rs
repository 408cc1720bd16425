// src/config/mod.rs
//! Immutable runtime settings.
//!
//! `Settings` is built once at startup (TOML file + env overrides + built-in
//! defaults) and handed to every component by `Arc`/reference. Nothing mutates
//! it afterwards.

pub mod credentials;

pub use credentials::Credentials;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::community_weights::CommunityWeights;

pub const DEFAULT_CONFIG_PATH: &str = "config/stock_buzz.toml";
pub const ENV_CONFIG_PATH: &str = "STOCK_BUZZ_CONFIG";
pub const ENV_DATA_DIR: &str = "REDDIT_DATA_DIR";

/// Category that holds the communities scanned by the analyzer.
pub const COMPANY_NEWS: &str = "company_news";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of `<data_root>/<category>/<community>.jsonl`.
    pub data_root: PathBuf,
    /// Category directory the analyzer reads from.
    pub analysis_category: String,
    /// Category name -> communities downloaded for it.
    pub categories: BTreeMap<String, Vec<String>>,
    /// Communities scanned by the analyzer when no explicit list is given.
    pub stock_communities: Vec<String>,
    pub community_weights: CommunityWeights,
    /// Symbol -> aliases (several names joined by " OR ").
    pub entities: BTreeMap<String, String>,
    pub collector: CollectorSettings,
    pub analysis: AnalysisSettings,
    pub news: NewsSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorSettings {
    pub item_delay_ms: u64,
    pub community_delay_ms: u64,
    /// Items requested per listing page (platform maximum is 100).
    pub page_size: u32,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub min_relevance: f64,
    pub days_back: u32,
    pub top_n: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsSettings {
    pub workers: usize,
    pub max_pages: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data/reddit_data"),
            analysis_category: COMPANY_NEWS.to_string(),
            categories: default_categories(),
            stock_communities: [
                "wallstreetbets",
                "stocks",
                "investing",
                "StockMarket",
                "SecurityAnalysis",
                "ValueInvesting",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            community_weights: CommunityWeights::default(),
            entities: default_entities(),
            collector: CollectorSettings::default(),
            analysis: AnalysisSettings::default(),
            news: NewsSettings::default(),
        }
    }
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            item_delay_ms: 100,
            community_delay_ms: 1_000,
            page_size: 100,
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            retry: RetrySettings::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 4_000,
            max_delay_ms: 60_000,
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            min_relevance: 0.1,
            days_back: 7,
            top_n: 20,
        }
    }
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            workers: 3,
            max_pages: 10,
        }
    }
}

impl CollectorSettings {
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    pub fn community_delay(&self) -> Duration {
        Duration::from_millis(self.community_delay_ms)
    }

    /// Zero delays everywhere; used by tests and dry runs against fixtures.
    pub fn without_delays(mut self) -> Self {
        self.item_delay_ms = 0;
        self.community_delay_ms = 0;
        self.retry.base_delay_ms = 0;
        self.retry.max_delay_ms = 0;
        self
    }
}

impl Settings {
    /// Resolve settings using env var + fallbacks:
    /// 1) $STOCK_BUZZ_CONFIG (must exist)
    /// 2) config/stock_buzz.toml
    /// 3) built-in defaults
    ///
    /// `$REDDIT_DATA_DIR` overrides `data_root` in every case.
    pub fn load() -> Result<Self> {
        let mut settings = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let path = PathBuf::from(p);
                if !path.exists() {
                    anyhow::bail!("{ENV_CONFIG_PATH} points to non-existent path {}", path.display());
                }
                Self::from_path(&path)?
            }
            Err(_) => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::from_path(&path)?
                } else {
                    Self::default()
                }
            }
        };

        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            if !dir.trim().is_empty() {
                settings.data_root = PathBuf::from(dir);
            }
        }
        Ok(settings)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing settings in {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut settings: Settings = toml::from_str(s)?;
        settings.sanitize();
        Ok(settings)
    }

    /// Override the data root (CLI `--data-dir`).
    pub fn with_data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.data_root = root.into();
        self
    }

    /// Aliases configured for a symbol, if any.
    pub fn aliases(&self, symbol: &str) -> Option<&str> {
        self.entities.get(symbol).map(String::as_str)
    }

    /// Human-readable name for a symbol: its alias string, or the symbol itself.
    pub fn display_name<'a>(&'a self, symbol: &'a str) -> &'a str {
        self.aliases(symbol).map(str::trim).unwrap_or(symbol)
    }

    /// Communities configured for a category, if it exists.
    pub fn communities_for(&self, category: &str) -> Option<&[String]> {
        self.categories.get(category).map(Vec::as_slice)
    }

    fn sanitize(&mut self) {
        if !self.analysis.min_relevance.is_finite() {
            self.analysis.min_relevance = AnalysisSettings::default().min_relevance;
        }
        self.analysis.min_relevance = self.analysis.min_relevance.clamp(0.0, 1.0);
        self.collector.page_size = self.collector.page_size.clamp(1, 100);
        self.collector.retry.max_attempts = self.collector.retry.max_attempts.max(1);
        self.news.workers = self.news.workers.max(1);
        for list in self.categories.values_mut() {
            list.retain(|c| !c.trim().is_empty());
        }
    }
}

fn default_categories() -> BTreeMap<String, Vec<String>> {
    let mut m = BTreeMap::new();
    for (category, communities) in [
        (
            "global_news",
            &[
                "worldnews",
                "news",
                "business",
                "economy",
                "finance",
                "markets",
                "investing",
            ][..],
        ),
        (
            COMPANY_NEWS,
            &[
                "stocks",
                "investing",
                "SecurityAnalysis",
                "ValueInvesting",
                "StockMarket",
                "wallstreetbets",
                "financialindependence",
            ][..],
        ),
        (
            "crypto_news",
            &[
                "CryptoCurrency",
                "Bitcoin",
                "ethereum",
                "CryptoMarkets",
                "altcoin",
            ][..],
        ),
    ] {
        m.insert(
            category.to_string(),
            communities.iter().map(|s| s.to_string()).collect(),
        );
    }
    m
}

fn default_entities() -> BTreeMap<String, String> {
    [
        ("AAPL", "Apple"),
        ("MSFT", "Microsoft"),
        ("GOOGL", "Google"),
        ("AMZN", "Amazon"),
        ("TSLA", "Tesla"),
        ("NVDA", "Nvidia"),
        ("TSM", "Taiwan Semiconductor Manufacturing Company OR TSMC"),
        ("JPM", "JPMorgan Chase OR JP Morgan"),
        ("JNJ", "Johnson & Johnson OR JNJ"),
        ("V", "Visa"),
        ("WMT", "Walmart"),
        ("META", "Meta OR Facebook"),
        ("AMD", "AMD"),
        ("INTC", "Intel"),
        ("QCOM", "Qualcomm"),
        ("BABA", "Alibaba"),
        ("ADBE", "Adobe"),
        ("NFLX", "Netflix"),
        ("CRM", "Salesforce"),
        ("PYPL", "PayPal"),
        ("PLTR", "Palantir"),
        ("MU", "Micron"),
        ("SQ", "Block OR Square"),
        ("ZM", "Zoom"),
        ("CSCO", "Cisco"),
        ("SHOP", "Shopify"),
        ("ORCL", "Oracle"),
        ("X", "Twitter OR X"),
        ("SPOT", "Spotify"),
        ("AVGO", "Broadcom"),
        ("ASML", "ASML"),
        ("TWLO", "Twilio"),
        ("SNAP", "Snap Inc."),
        ("TEAM", "Atlassian"),
        ("SQSP", "Squarespace"),
        ("UBER", "Uber"),
        ("ROKU", "Roku"),
        ("PINS", "Pinterest"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn empty_toml_gives_defaults() {
        let s = Settings::from_toml_str("").unwrap();
        assert_eq!(s.data_root, PathBuf::from("data/reddit_data"));
        assert_eq!(s.analysis_category, "company_news");
        assert_eq!(s.stock_communities.len(), 6);
        assert_eq!(s.collector.retry.max_attempts, 3);
        assert_eq!(s.news.workers, 3);
        assert!((s.analysis.min_relevance - 0.1).abs() < 1e-9);
        assert_eq!(s.categories.len(), 3);
        assert_eq!(s.display_name("META"), "Meta OR Facebook");
        assert_eq!(s.display_name("ZZZZ"), "ZZZZ");
    }

    #[test]
    fn partial_toml_overrides_only_given_fields() {
        let toml = r#"
            data_root = "/tmp/buzz"
            stock_communities = ["pennystocks"]

            [collector]
            item_delay_ms = 0
            page_size = 500

            [community_weights]
            default_weight = 0.3
            weights = { pennystocks = 0.9 }

            [entities]
            GME = "GameStop OR Game Stop"
        "#;
        let s = Settings::from_toml_str(toml).unwrap();
        assert_eq!(s.data_root, PathBuf::from("/tmp/buzz"));
        assert_eq!(s.stock_communities, vec!["pennystocks".to_string()]);
        assert_eq!(s.collector.item_delay_ms, 0);
        assert_eq!(s.collector.community_delay_ms, 1_000);
        // clamped to the platform maximum
        assert_eq!(s.collector.page_size, 100);
        assert!((s.community_weights.weight_for("PennyStocks") - 0.9).abs() < 1e-9);
        assert!((s.community_weights.weight_for("other") - 0.3).abs() < 1e-9);
        assert_eq!(s.aliases("GME"), Some("GameStop OR Game Stop"));
        assert!(s.aliases("AAPL").is_none());
    }

    #[serial_test::serial]
    #[test]
    fn load_uses_env_path_then_data_dir_override() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("buzz.toml");
        fs::write(&p, "analysis_category = \"custom\"\n").unwrap();

        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        env::set_var(ENV_DATA_DIR, tmp.path().join("data").display().to_string());
        let s = Settings::load().unwrap();
        assert_eq!(s.analysis_category, "custom");
        assert_eq!(s.data_root, tmp.path().join("data"));

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(Settings::load().is_err());

        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_DATA_DIR);
    }
}
