//! # Community Weights
//!
//! Maps a community (subreddit) name to the weight its posts carry in the
//! popularity score, in the range `(0.0, 1.0]`.
//!
//! - Loads from the `[community_weights]` table of the settings file.
//! - Case-insensitive lookup (`r/WallStreetBets`, `wallstreetbets` and
//!   `WALLSTREETBETS` resolve to the same entry).
//! - Unknown communities fall back to `default_weight` (0.5).

use serde::Deserialize;
use std::collections::BTreeMap;

/// Weight table for communities, loaded from settings or defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct CommunityWeights {
    /// Weight used when a community has no explicit entry.
    #[serde(default = "default_default_weight")]
    pub default_weight: f64,
    /// Explicit weights keyed by community name (any case).
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

fn default_default_weight() -> f64 {
    0.5
}

impl Default for CommunityWeights {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl CommunityWeights {
    /// Get the weight for a community.
    ///
    /// Steps:
    /// 1. Exact match on the normalized name.
    /// 2. Default weight.
    pub fn weight_for(&self, community: &str) -> f64 {
        let c = normalize(community);
        for (k, &w) in &self.weights {
            if normalize(k) == c {
                return clamp_weight(w);
            }
        }
        clamp_weight(self.default_weight)
    }

    /// True when the community has an explicit weight entry.
    pub fn is_weighted(&self, community: &str) -> bool {
        let c = normalize(community);
        self.weights.keys().any(|k| normalize(k) == c)
    }

    /// Built-in seed for the stock-focused communities, most influential first.
    pub(crate) fn default_seed() -> Self {
        let mut weights = BTreeMap::new();
        for (k, v) in [
            ("wallstreetbets", 1.0),
            ("stocks", 0.8),
            ("investing", 0.7),
            ("StockMarket", 0.6),
            ("SecurityAnalysis", 0.5),
            ("ValueInvesting", 0.4),
        ] {
            weights.insert(k.to_string(), v);
        }
        Self {
            default_weight: 0.5,
            weights,
        }
    }
}

/// Lowercase, drop an `r/` prefix and surrounding whitespace.
fn normalize(s: &str) -> String {
    let t = s.trim().to_ascii_lowercase();
    let t = t.strip_prefix("/").unwrap_or(&t);
    t.strip_prefix("r/").unwrap_or(t).to_string()
}

/// Weights live in (0, 1]; a zero or negative entry would silence a community
/// entirely, so it is lifted to a small positive floor.
fn clamp_weight(x: f64) -> f64 {
    if !x.is_finite() {
        0.5
    } else {
        x.clamp(0.01, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CommunityWeights {
        CommunityWeights::default_seed()
    }

    #[test]
    fn exact_match() {
        let c = cfg();
        assert!((c.weight_for("wallstreetbets") - 1.0).abs() < 1e-9);
        assert!((c.weight_for("ValueInvesting") - 0.4).abs() < 1e-9);
    }

    #[test]
    fn case_and_prefix_insensitive() {
        let c = cfg();
        assert!((c.weight_for("STOCKMARKET") - 0.6).abs() < 1e-9);
        assert!((c.weight_for("r/stocks") - 0.8).abs() < 1e-9);
        assert!((c.weight_for(" /r/Investing ") - 0.7).abs() < 1e-9);
    }

    #[test]
    fn default_weight_used() {
        let c = cfg();
        assert!((c.weight_for("pennystocks") - 0.5).abs() < 1e-9);
        assert!(!c.is_weighted("pennystocks"));
        assert!(c.is_weighted("Stocks"));
    }

    #[test]
    fn out_of_range_weights_are_clamped() {
        let mut c = cfg();
        c.weights.insert("loud".into(), 3.0);
        c.weights.insert("muted".into(), 0.0);
        assert!((c.weight_for("loud") - 1.0).abs() < 1e-9);
        assert!((c.weight_for("muted") - 0.01).abs() < 1e-9);
    }
}
