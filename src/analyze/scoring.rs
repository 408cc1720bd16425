// src/analyze/scoring.rs
//! Relevance and popularity scoring for single records.
//!
//! Both are pure: relevance depends only on the record text and a
//! [`KeywordSet`], popularity only on engagement, community weight and the
//! `now` passed in.
//!
//! Relevance:
//! - title: +1 per keyword found as a substring, +2 more when it is a whole word
//! - body:  +1 substring, +1 whole word
//! - `min(title * 0.3, 1.0) + min(body * 0.1, 0.7)`, capped at 1.0
//!
//! Popularity:
//! `(ups + 0.8 * comments + 0.6 * score + 0.5 * upvote_ratio) * weight * decay`
//! with `decay = max(0.1, 1 / (1 + age_hours / 24))`.

use regex::Regex;
use std::collections::BTreeSet;

use crate::record::Record;

const TITLE_SUBSTRING_HIT: u32 = 1;
const TITLE_WORD_HIT: u32 = 2;
const BODY_SUBSTRING_HIT: u32 = 1;
const BODY_WORD_HIT: u32 = 1;

const TITLE_FACTOR: f64 = 0.3;
const TITLE_CAP: f64 = 1.0;
const BODY_FACTOR: f64 = 0.1;
const BODY_CAP: f64 = 0.7;

const W_UPVOTES: f64 = 1.0;
const W_COMMENTS: f64 = 0.8;
const W_SCORE: f64 = 0.6;
const W_RATIO: f64 = 0.5;

/// Floor of the recency multiplier.
pub const MIN_TIME_DECAY: f64 = 0.1;

#[derive(Debug, Clone)]
struct Keyword {
    text: String,
    lower: String,
    word: Option<Regex>,
}

/// Precompiled lexicon for one entity.
#[derive(Debug, Clone)]
pub struct KeywordSet {
    keywords: Vec<Keyword>,
}

impl KeywordSet {
    /// Build the lexicon from a symbol and an optional alias string
    /// (`"Meta OR Facebook"`). The symbol contributes itself, its upper and
    /// lower case forms and a `$`-prefixed cashtag.
    pub fn for_entity(symbol: &str, aliases: Option<&str>) -> Self {
        let symbol = symbol.trim();
        let mut terms: BTreeSet<String> = BTreeSet::new();
        if !symbol.is_empty() {
            terms.insert(symbol.to_string());
            terms.insert(symbol.to_uppercase());
            terms.insert(symbol.to_lowercase());
            terms.insert(format!("${symbol}"));
            terms.insert(format!("${}", symbol.to_uppercase()));
        }
        if let Some(aliases) = aliases {
            for name in aliases.split(" OR ") {
                let name = name.trim();
                if !name.is_empty() {
                    terms.insert(name.to_string());
                }
            }
        }
        Self::from_terms(terms)
    }

    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = BTreeSet::new();
        let mut keywords = Vec::new();
        for t in terms {
            let text: String = t.into();
            let text = text.trim().to_string();
            if text.is_empty() || !seen.insert(text.clone()) {
                continue;
            }
            let lower = text.to_lowercase();
            let word = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&lower))).ok();
            keywords.push(Keyword { text, lower, word });
        }
        Self { keywords }
    }

    pub fn terms(&self) -> Vec<&str> {
        self.keywords.iter().map(|k| k.text.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

/// Relevance of a record to an entity in `[0, 1]`.
pub fn relevance(record: &Record, keywords: &KeywordSet) -> f64 {
    relevance_of(&record.title, &record.body, keywords)
}

pub fn relevance_of(title: &str, body: &str, keywords: &KeywordSet) -> f64 {
    let title_lc = title.to_lowercase();
    let body_lc = body.to_lowercase();

    let mut title_hits = 0u32;
    let mut body_hits = 0u32;
    for k in &keywords.keywords {
        if title_lc.contains(&k.lower) {
            title_hits += TITLE_SUBSTRING_HIT;
        }
        if body_lc.contains(&k.lower) {
            body_hits += BODY_SUBSTRING_HIT;
        }
        if let Some(re) = &k.word {
            if re.is_match(&title_lc) {
                title_hits += TITLE_WORD_HIT;
            }
            if re.is_match(&body_lc) {
                body_hits += BODY_WORD_HIT;
            }
        }
    }

    let title_score = (f64::from(title_hits) * TITLE_FACTOR).min(TITLE_CAP);
    let body_score = (f64::from(body_hits) * BODY_FACTOR).min(BODY_CAP);
    (title_score + body_score).min(1.0)
}

/// Recency multiplier: 1.0 when fresh, 0.5 at one day, never below 0.1.
/// Future timestamps count as fresh.
pub fn time_decay(age_hours: f64) -> f64 {
    if !age_hours.is_finite() {
        return MIN_TIME_DECAY;
    }
    let age = age_hours.max(0.0);
    (1.0 / (1.0 + age / 24.0)).max(MIN_TIME_DECAY)
}

/// Time-decayed popularity of a record for a community weight, as of `now`
/// (seconds since epoch).
pub fn popularity(record: &Record, weight: f64, now: f64) -> f64 {
    let engagement = record.upvotes as f64 * W_UPVOTES
        + record.comment_count as f64 * W_COMMENTS
        + record.score as f64 * W_SCORE;
    let quality = record.upvote_ratio_or_default() * W_RATIO;
    let age_hours = (now - record.created_at) / 3600.0;
    (engagement + quality) * weight * time_decay(age_hours)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: &str, body: &str) -> Record {
        let mut r = Record::new("p", title);
        r.body = body.to_string();
        r
    }

    #[test]
    fn lexicon_contains_symbol_forms_and_aliases() {
        let k = KeywordSet::for_entity("META", Some("Meta OR Facebook"));
        let terms = k.terms();
        for t in ["META", "meta", "$META", "Meta", "Facebook"] {
            assert!(terms.contains(&t), "missing {t}");
        }
        // exact duplicates collapse
        assert_eq!(terms.iter().filter(|t| **t == "META").count(), 1);
    }

    #[test]
    fn whole_word_title_match_saturates_at_least_point_three() {
        let k = KeywordSet::for_entity("TSLA", Some("Tesla"));
        let r = relevance(&post("Thoughts on Tesla deliveries", ""), &k);
        assert!(r >= 0.3, "got {r}");
        assert!(r <= 1.0);
    }

    #[test]
    fn substring_only_is_weaker_than_whole_word() {
        let k = KeywordSet::from_terms(["intel"]);
        let sub = relevance(&post("intelligence report", ""), &k);
        let word = relevance(&post("intel report", ""), &k);
        assert!((sub - 0.3).abs() < 1e-9);
        assert!((word - 0.9).abs() < 1e-9);
    }

    #[test]
    fn body_contribution_is_capped() {
        let k = KeywordSet::from_terms(["a1", "a2", "a3", "a4", "a5"]);
        let r = relevance(&post("", "a1 a2 a3 a4 a5"), &k);
        assert!((r - 0.7).abs() < 1e-9);
        let none = relevance(&post("nothing", "here"), &k);
        assert_eq!(none, 0.0);
    }

    #[test]
    fn relevance_never_exceeds_one() {
        let k = KeywordSet::for_entity("AAPL", Some("Apple"));
        let r = relevance(
            &post("AAPL Apple $AAPL aapl", "AAPL Apple $AAPL aapl and more apple"),
            &k,
        );
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn time_decay_boundaries() {
        assert!((time_decay(0.0) - 1.0).abs() < 1e-9);
        assert!((time_decay(24.0) - 0.5).abs() < 1e-9);
        assert!((time_decay(24.0 * 1000.0) - MIN_TIME_DECAY).abs() < 1e-9);
        assert!((time_decay(-5.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn popularity_formula() {
        let now = 1_700_000_000.0;
        let mut r = post("x", "");
        r.upvotes = 100;
        r.comment_count = 10;
        r.score = 90;
        r.upvote_ratio = Some(0.9);
        r.created_at = now;
        let expected = (100.0 + 8.0 + 54.0 + 0.45) * 0.8;
        assert!((popularity(&r, 0.8, now) - expected).abs() < 1e-9);

        // a day old halves it
        r.created_at = now - 86_400.0;
        assert!((popularity(&r, 0.8, now) - expected / 2.0).abs() < 1e-9);
    }

    #[test]
    fn missing_engagement_defaults() {
        let now = 1_000.0;
        let mut r = post("x", "");
        r.created_at = now;
        // only quality: 0.5 * 0.5
        assert!((popularity(&r, 1.0, now) - 0.25).abs() < 1e-9);
    }
}
