// src/report.rs
//! Plain-text rendering of analyses, leaderboards, comparisons and digests.
//! Output depends only on the input values.

use std::fmt::Write as _;

use crate::analyze::digest::DigestPost;
use crate::analyze::ranking::{Comparison, RankingEntry, RankingResult};
use crate::analyze::AnalysisResult;

const RULE_WIDTH: usize = 60;
/// Entries that get a details section.
const DETAIL_ENTRIES: usize = 5;
const NAME_WIDTH: usize = 18;
const SHORT_TITLE: usize = 80;

fn rule(c: char) -> String {
    std::iter::repeat(c).take(RULE_WIDTH).collect()
}

/// First `n` characters (not bytes).
fn clip(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Leaderboard text. `details` adds a section for the first five entries;
/// `full_posts` lists every sample post in full and, for the leader, its
/// spread across communities.
pub fn format_ranking(r: &RankingResult, details: bool, full_posts: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Reddit stock popularity ranking");
    let _ = writeln!(out, "{}", rule('='));
    let _ = writeln!(out, "Period: last {} days", r.days_back);
    let _ = writeln!(out, "Entities analyzed: {}", r.total_analyzed);
    let _ = writeln!(out, "Entities with mentions: {}", r.with_mentions);
    let _ = writeln!(out, "Generated at: {}", r.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out);

    let _ = writeln!(out, "Leaderboard:");
    let _ = writeln!(out, "{}", rule('-'));
    let _ = writeln!(
        out,
        "{:<4} {:<6} {:<20} {:<8} {:<10} {:<8}",
        "Rank", "Symbol", "Name", "Mentions", "Score", "Trend"
    );
    let _ = writeln!(out, "{}", rule('-'));
    for e in &r.top {
        let _ = writeln!(
            out,
            "{:<4} {:<6} {:<20} {:<8} {:<10.1} {:<8}",
            e.rank,
            e.symbol,
            clip(&e.display_name, NAME_WIDTH),
            e.total_mentions,
            e.total_popularity,
            e.trend.as_str()
        );
    }

    if details && !r.top.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Details:");
        let _ = writeln!(out, "{}", rule('-'));
        for (i, e) in r.top.iter().take(DETAIL_ENTRIES).enumerate() {
            write_entry_details(&mut out, e, full_posts, full_posts && i == 0);
        }
    }

    if let Some(s) = &r.summary {
        let _ = writeln!(out);
        let _ = writeln!(out, "Summary:");
        let _ = writeln!(out, "   Most discussed: {}", s.most_discussed);
        let _ = writeln!(out, "   Hottest: {}", s.hottest);
        let _ = writeln!(out, "   Average mentions: {:.1} per entity", s.average_mentions);
        let _ = writeln!(out, "   Total mentions: {}", s.total_mentions);
        let _ = writeln!(out, "   Total score: {:.1}", s.total_popularity);
    }

    out.trim_end().to_string()
}

fn write_entry_details(out: &mut String, e: &RankingEntry, full_posts: bool, spread: bool) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{}. {} - {}", e.rank, e.symbol, e.display_name);
    let _ = writeln!(out, "   Mentions: {}", e.total_mentions);
    let _ = writeln!(out, "   Total score: {:.1}", e.total_popularity);
    let _ = writeln!(out, "   Main community: r/{}", e.top_community);

    if spread {
        // (community, count, score) in first-seen order, then by count
        let mut dist: Vec<(&str, usize, f64)> = Vec::new();
        for p in &e.sample_posts {
            match dist.iter_mut().find(|(c, _, _)| *c == p.community) {
                Some(d) => {
                    d.1 += 1;
                    d.2 += p.popularity;
                }
                None => dist.push((p.community.as_str(), 1, p.popularity)),
            }
        }
        if !dist.is_empty() {
            dist.sort_by(|a, b| b.1.cmp(&a.1));
            let _ = writeln!(out, "   Community spread:");
            for (c, n, score) in dist {
                let _ = writeln!(out, "      r/{c}: {n} mentions, score {score:.1}");
            }
        }
    }

    if e.sample_posts.is_empty() {
        return;
    }
    let _ = writeln!(out, "   Top posts:");
    for (j, p) in e.sample_posts.iter().enumerate() {
        if full_posts {
            let _ = writeln!(out, "      {}. {}", j + 1, p.title);
            let _ = writeln!(out, "         Source: r/{}", p.community);
            let _ = writeln!(
                out,
                "         Engagement: {} upvotes, {} comments, score {}",
                p.upvotes, p.comments, p.score
            );
            let _ = writeln!(out, "         Relevance: {:.2}", p.relevance);
            let _ = writeln!(out, "         Popularity: {:.1}", p.popularity);
            if !p.url.is_empty() {
                let _ = writeln!(out, "         Link: {}", p.url);
            }
        } else {
            let _ = writeln!(out, "      {}. {}...", j + 1, clip(&p.title, SHORT_TITLE));
            let _ = writeln!(
                out,
                "         ({} upvotes, {} comments, relevance {:.2}, popularity {:.1})",
                p.upvotes, p.comments, p.relevance, p.popularity
            );
        }
    }
}

/// Single-entity report.
pub fn format_analysis(a: &AnalysisResult, display_name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({}) on Reddit, last {} days", a.symbol, display_name, a.days_back);
    let _ = writeln!(out, "{}", rule('='));
    let _ = writeln!(out, "Mentions: {}", a.total_mentions);
    let _ = writeln!(out, "Total score: {:.1}", a.total_popularity);
    let _ = writeln!(out, "Average score: {:.1}", a.average_popularity);
    if a.total_mentions == 0 {
        return out.trim_end().to_string();
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "By community:");
    for c in a.breakdown.iter().filter(|c| c.mentions > 0) {
        let _ = writeln!(
            out,
            "   r/{:<20} {:>5} mentions  score {:>10.1}  weight {:.2}",
            c.name, c.mentions, c.popularity, c.weight
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Top posts:");
    for (i, p) in a.top_posts.iter().enumerate() {
        let _ = writeln!(
            out,
            "   {:>2}. [{:.1}] {} (r/{}, relevance {:.2})",
            i + 1,
            p.popularity,
            clip(&p.title, SHORT_TITLE),
            p.community,
            p.relevance
        );
    }
    out.trim_end().to_string()
}

pub fn format_trending(entries: &[RankingEntry], days: u32, min_mentions: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Trending over the last {days} days (at least {min_mentions} mentions)");
    let _ = writeln!(out, "{}", rule('-'));
    if entries.is_empty() {
        let _ = writeln!(out, "Nothing qualifies.");
    }
    for e in entries {
        let _ = writeln!(
            out,
            "{:<4} {:<6} {:<20} {:<8} {:<10.1} {}",
            e.rank,
            e.symbol,
            clip(&e.display_name, NAME_WIDTH),
            e.total_mentions,
            e.total_popularity,
            e.trend.as_str()
        );
    }
    out.trim_end().to_string()
}

pub fn format_comparison(c: &Comparison) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Comparison over the last {} days", c.days_back);
    let _ = writeln!(out, "{}", rule('-'));
    let _ = writeln!(
        out,
        "{:<6} {:<20} {:<8} {:<10} {:<10}",
        "Symbol", "Name", "Mentions", "Score", "Average"
    );
    for e in &c.rankings {
        let _ = writeln!(
            out,
            "{:<6} {:<20} {:<8} {:<10.1} {:<10.1}",
            e.symbol,
            clip(&e.display_name, NAME_WIDTH),
            e.mentions,
            e.total_popularity,
            e.average_popularity
        );
    }
    let _ = writeln!(out);
    match &c.winner {
        Some(w) => {
            let _ = writeln!(out, "Winner: {w}");
        }
        None => {
            let _ = writeln!(out, "Winner: n/a");
        }
    }
    out.trim_end().to_string()
}

pub fn format_digest(posts: &[DigestPost]) -> String {
    let mut out = String::new();
    for p in posts {
        let _ = writeln!(out, "### {} (r/{}, {} upvotes)", p.title, p.community, p.upvotes);
        if !p.content.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", p.content);
        }
        let _ = writeln!(out);
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::ranking::{summarize, SummaryStats, TrendLabel};
    use crate::analyze::ScoredPost;
    use chrono::{TimeZone, Utc};

    fn sample_post(id: &str, community: &str, pop: f64) -> ScoredPost {
        ScoredPost {
            id: id.into(),
            title: format!("Post {id} about Apple"),
            community: community.into(),
            score: 10,
            comments: 4,
            upvotes: 12,
            relevance: 0.9,
            popularity: pop,
            url: format!("https://reddit.com/r/{community}/{id}"),
            created_at: 0.0,
        }
    }

    fn ranking() -> RankingResult {
        let top = vec![RankingEntry {
            rank: 1,
            symbol: "AAPL".into(),
            display_name: "Apple Incorporated Holdings Group".into(),
            total_mentions: 3,
            total_popularity: 123.456,
            average_popularity: 41.152,
            top_community: "stocks".into(),
            trend: TrendLabel::Light,
            sample_posts: vec![
                sample_post("a", "stocks", 60.0),
                sample_post("b", "investing", 40.0),
                sample_post("c", "stocks", 23.456),
            ],
        }];
        let summary = summarize(&top);
        RankingResult {
            generated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            days_back: 7,
            total_analyzed: 38,
            with_mentions: 1,
            top,
            summary,
        }
    }

    #[test]
    fn table_row_is_fixed_width() {
        let text = format_ranking(&ranking(), false, false);
        assert!(text.contains("1    AAPL   Apple Incorporated   3        123.5      light"));
        assert!(text.contains("Generated at: 2024-05-01 12:00:00 UTC"));
        assert!(!text.contains("Details:"));
        assert!(text.contains("Hottest: AAPL"));
    }

    #[test]
    fn full_posts_include_links_and_spread() {
        let text = format_ranking(&ranking(), true, true);
        assert!(text.contains("Community spread:"));
        assert!(text.contains("r/stocks: 2 mentions, score 83.5"));
        assert!(text.contains("Link: https://reddit.com/r/investing/b"));

        let short = format_ranking(&ranking(), true, false);
        assert!(!short.contains("Community spread:"));
        assert!(short.contains("1. Post a about Apple..."));
    }

    #[test]
    fn rendering_is_deterministic() {
        let r = ranking();
        assert_eq!(format_ranking(&r, true, true), format_ranking(&r, true, true));
    }

    #[test]
    fn empty_ranking_has_no_summary() {
        let r = RankingResult {
            generated_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            days_back: 1,
            total_analyzed: 0,
            with_mentions: 0,
            top: vec![],
            summary: None::<SummaryStats>,
        };
        let text = format_ranking(&r, true, true);
        assert!(!text.contains("Summary:"));
        assert!(!text.contains("Details:"));
    }

    #[test]
    fn comparison_names_winner() {
        let c = Comparison {
            generated_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            days_back: 7,
            symbols: vec![],
            rankings: vec![],
            winner: None,
        };
        assert!(format_comparison(&c).ends_with("Winner: n/a"));
    }
}
