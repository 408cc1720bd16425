// src/analyze/digest.rs
//! Daily digest: the most upvoted posts a category's communities produced on
//! one calendar day (UTC), optionally narrowed to one entity.

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;

use crate::config::Settings;
use crate::store::{self, CollectionStore};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DigestPost {
    pub community: String,
    pub title: String,
    pub content: String,
    pub url: Option<String>,
    pub upvotes: i64,
    pub posted_date: NaiveDate,
}

/// Posts per community so the whole digest stays near `max_limit`; at least one.
pub fn per_community_limit(max_limit: usize, files: usize) -> usize {
    if files == 0 {
        return 0;
    }
    (max_limit / files).max(1)
}

/// Terms an entity filter looks for: its aliases plus the symbol itself.
fn entity_terms(settings: &Settings, symbol: &str) -> Vec<String> {
    let mut terms: Vec<String> = settings
        .aliases(symbol)
        .map(|a| {
            a.split(" OR ")
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_lowercase)
                .collect()
        })
        .unwrap_or_default();
    terms.push(symbol.to_lowercase());
    terms
}

/// Collect the day's posts from every collection file in `category`.
///
/// The entity filter only applies to categories whose name contains
/// `company`; matching is case-insensitive containment in title or body.
/// Each community contributes its top posts by upvotes.
pub fn top_from_category(
    settings: &Settings,
    category: &str,
    date: NaiveDate,
    max_limit: usize,
    entity: Option<&str>,
) -> Result<Vec<DigestPost>> {
    let store = CollectionStore::new(settings.data_root.clone());
    let files = store.collection_files(category)?;
    if files.is_empty() {
        tracing::warn!(target: "analyzer", category, "no collections for digest");
        return Ok(Vec::new());
    }
    let per_community = per_community_limit(max_limit, files.len());
    if max_limit < files.len() {
        tracing::warn!(
            target: "analyzer",
            max_limit,
            files = files.len(),
            "limit below community count, one post each"
        );
    }

    let terms = match entity {
        Some(sym) if category.contains("company") => Some(entity_terms(settings, sym)),
        _ => None,
    };

    let mut out = Vec::new();
    for path in &files {
        let mut posts = day_posts(path, date, terms.as_deref())?;
        posts.sort_by(|a, b| b.upvotes.cmp(&a.upvotes));
        posts.truncate(per_community);
        out.extend(posts);
    }
    Ok(out)
}

fn day_posts(path: &Path, date: NaiveDate, terms: Option<&[String]>) -> Result<Vec<DigestPost>> {
    let community = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let mut posts = Vec::new();
    for r in store::read_records(path)? {
        let Some(created) = r.created_datetime() else {
            continue;
        };
        if created.date_naive() != date {
            continue;
        }
        if let Some(terms) = terms {
            let title = r.title.to_lowercase();
            let body = r.body.to_lowercase();
            if !terms.iter().any(|t| title.contains(t) || body.contains(t)) {
                continue;
            }
        }
        posts.push(DigestPost {
            community: community.clone(),
            title: r.title,
            content: r.body,
            url: r.url,
            upvotes: r.upvotes,
            posted_date: date,
        });
    }
    Ok(posts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_community_limit_floor_is_one() {
        assert_eq!(per_community_limit(10, 3), 3);
        assert_eq!(per_community_limit(2, 5), 1);
        assert_eq!(per_community_limit(10, 0), 0);
    }

    #[test]
    fn entity_terms_include_aliases_and_symbol() {
        let s = Settings::default();
        let t = entity_terms(&s, "META");
        assert_eq!(t, vec!["meta", "facebook", "meta"]);
        assert_eq!(entity_terms(&s, "ZZZ"), vec!["zzz"]);
    }
}
