// tests/analyzer_scenarios.rs
//
// Analyzer and ranking over real collection files written to a temp dir.

use chrono::{DateTime, NaiveDate, Utc};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use stock_buzz::analyze::digest::top_from_category;
use stock_buzz::analyze::ranking::TrendLabel;
use stock_buzz::record::Record;
use stock_buzz::store::merge_at;
use stock_buzz::{PopularityAnalyzer, Settings};

const NOW: i64 = 1_714_564_800; // 2024-05-01T12:00:00Z

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(NOW, 0).unwrap()
}

fn settings(root: &Path) -> Arc<Settings> {
    Arc::new(Settings::default().with_data_root(root))
}

fn post(id: &str, title: &str, ups: i64, hours_ago: f64) -> Record {
    let mut r = Record::new(id, title);
    r.upvotes = ups;
    r.score = ups;
    r.comment_count = ups / 10;
    r.upvote_ratio = Some(0.9);
    r.created_at = NOW as f64 - hours_ago * 3600.0;
    r
}

fn write(root: &Path, community: &str, records: Vec<Record>) {
    let path = root.join("company_news").join(format!("{community}.jsonl"));
    merge_at(&path, records, now()).unwrap();
}

#[test]
fn single_matching_post_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "stocks", vec![post("p1", "AAPL earnings beat", 100, 2.0)]);

    let analyzer = PopularityAnalyzer::new(settings(tmp.path()));
    let opts = analyzer.default_options();
    let a = analyzer.analyze_at("AAPL", &opts, now());

    assert_eq!(a.total_mentions, 1);
    assert!(a.total_popularity > 0.0);
    assert!((a.average_popularity - a.total_popularity).abs() < 1e-9);
    assert_eq!(a.top_posts[0].id, "p1");
    assert_eq!(a.top_posts[0].community, "stocks");
    assert_eq!(a.top_community(), "stocks");
    assert!(a.keywords.contains(&"Apple".to_string()));
}

#[test]
fn empty_data_dir_gives_zero_result() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("company_news")).unwrap();

    let analyzer = PopularityAnalyzer::new(settings(tmp.path()));
    let a = analyzer.analyze_at("AAPL", &analyzer.default_options(), now());
    assert_eq!(a.total_mentions, 0);
    assert_eq!(a.total_popularity, 0.0);
    assert_eq!(a.average_popularity, 0.0);
    assert!(a.top_posts.is_empty());
    assert!(a.breakdown.is_empty());
}

#[test]
fn missing_community_file_only_drops_that_community() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "stocks",
        vec![
            post("s1", "AAPL guidance raised", 80, 1.0),
            post("s2", "Apple buyback", 20, 3.0),
        ],
    );

    let analyzer = PopularityAnalyzer::new(settings(tmp.path()));
    let mut opts = analyzer.default_options();
    opts.communities = Some(vec!["wallstreetbets".to_string(), "stocks".to_string()]);
    let a = analyzer.analyze_at("AAPL", &opts, now());

    assert_eq!(a.total_mentions, 2);
    assert_eq!(a.breakdown.len(), 1);
    assert_eq!(a.breakdown[0].name, "stocks");
    assert_eq!(a.breakdown[0].mentions, 2);
    assert_eq!(a.top_community(), "stocks");
}

#[test]
fn hand_written_platform_lines_are_analyzed() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("company_news");
    fs::create_dir_all(&dir).unwrap();
    // one hour and two hours before NOW; the second line carries loose types
    fs::write(
        dir.join("wallstreetbets.jsonl"),
        concat!(
            r#"{"id":"abc123","title":"AAPL to the moon","selftext":"Apple earnings next week","ups":250,"num_comments":40,"created_utc":1714561200.0}"#,
            "\n",
            r#"{"id":"def456","title":"Apple buyback","selftext":null,"ups":12.0,"num_comments":null,"created_utc":1714557600}"#,
            "\n",
        ),
    )
    .unwrap();

    let analyzer = PopularityAnalyzer::new(settings(tmp.path()));
    let a = analyzer.analyze_at("AAPL", &analyzer.default_options(), now());

    assert_eq!(a.total_mentions, 2);
    assert_eq!(a.top_community(), "wallstreetbets");
    let top = &a.top_posts[0];
    assert_eq!(top.id, "abc123");
    assert_eq!(top.upvotes, 250);
    assert_eq!(top.comments, 40);
    assert_eq!(top.community, "wallstreetbets");
    assert!(top.popularity > a.top_posts[1].popularity);
    assert_eq!(a.top_posts[1].upvotes, 12);
}

#[test]
fn old_and_irrelevant_posts_are_filtered() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "investing",
        vec![
            post("fresh", "Tesla deliveries", 50, 1.0),
            post("stale", "Tesla deliveries last month", 500, 24.0 * 30.0),
            post("other", "Bond yields and the Fed", 900, 1.0),
        ],
    );

    let analyzer = PopularityAnalyzer::new(settings(tmp.path()));
    let a = analyzer.analyze_at("TSLA", &analyzer.default_options(), now());
    assert_eq!(a.total_mentions, 1);
    assert_eq!(a.top_posts[0].id, "fresh");

    // a wider window picks up the stale one too
    let wide = analyzer.default_options().with_days(60);
    assert_eq!(analyzer.analyze_at("TSLA", &wide, now()).total_mentions, 2);
}

#[test]
fn community_weight_scales_popularity() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "wallstreetbets", vec![post("w", "NVDA calls", 100, 0.0)]);
    write(tmp.path(), "ValueInvesting", vec![post("v", "NVDA valuation", 100, 0.0)]);

    let analyzer = PopularityAnalyzer::new(settings(tmp.path()));
    let a = analyzer.analyze_at("NVDA", &analyzer.default_options(), now());
    assert_eq!(a.total_mentions, 2);
    let w = a.breakdown.iter().find(|b| b.name == "wallstreetbets").unwrap();
    let v = a.breakdown.iter().find(|b| b.name == "ValueInvesting").unwrap();
    assert!((w.popularity / v.popularity - 1.0 / 0.4).abs() < 1e-6);
    assert_eq!(a.top_posts[0].id, "w");
}

#[test]
fn top_posts_are_capped_and_sorted() {
    let tmp = tempfile::tempdir().unwrap();
    let records = (0..15)
        .map(|i| post(&format!("m{i:02}"), "MSFT cloud growth", 10 * (i + 1), 1.0))
        .collect();
    write(tmp.path(), "stocks", records);

    let analyzer = PopularityAnalyzer::new(settings(tmp.path()));
    let a = analyzer.analyze_at("MSFT", &analyzer.default_options(), now());
    assert_eq!(a.total_mentions, 15);
    assert_eq!(a.top_posts.len(), 10);
    assert_eq!(a.top_posts[0].id, "m14");
    assert!(a
        .top_posts
        .windows(2)
        .all(|w| w[0].popularity >= w[1].popularity));
}

#[test]
fn ranking_excludes_silent_entities_and_fills_entries() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "stocks",
        vec![
            post("a1", "AAPL new iPhone", 300, 1.0),
            post("a2", "Apple services revenue", 200, 2.0),
            post("t1", "TSLA recall", 50, 1.0),
        ],
    );

    let analyzer = PopularityAnalyzer::new(settings(tmp.path()));
    let universe = vec!["AAPL".to_string(), "TSLA".to_string(), "ORCL".to_string()];
    let r = analyzer.rank_at(Some(universe.as_slice()), &analyzer.default_options(), 10, now());

    assert_eq!(r.total_analyzed, 3);
    assert_eq!(r.with_mentions, 2);
    let symbols: Vec<_> = r.top.iter().map(|e| e.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["AAPL", "TSLA"]);
    assert_eq!(r.top[0].rank, 1);
    assert_eq!(r.top[0].display_name, "Apple");
    assert_eq!(r.top[0].trend, TrendLabel::Light);
    assert_eq!(r.top[0].top_community, "stocks");
    assert_eq!(r.top[0].sample_posts.len(), 2);
    let s = r.summary.unwrap();
    assert_eq!(s.most_discussed, "AAPL");
    assert_eq!(s.total_mentions, 3);
}

#[test]
fn ranking_truncates_to_top_n() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "stocks",
        vec![
            post("a", "AAPL", 300, 1.0),
            post("b", "TSLA", 200, 1.0),
            post("c", "NVDA", 100, 1.0),
        ],
    );
    let analyzer = PopularityAnalyzer::new(settings(tmp.path()));
    let universe: Vec<String> = ["AAPL", "TSLA", "NVDA"].iter().map(|s| s.to_string()).collect();
    let r = analyzer.rank_at(Some(universe.as_slice()), &analyzer.default_options(), 2, now());
    assert_eq!(r.with_mentions, 3);
    assert_eq!(r.top.len(), 2);
    assert_eq!(r.top[1].rank, 2);
}

#[test]
fn compare_picks_winner_by_total() {
    let tmp = tempfile::tempdir().unwrap();
    // relative to the real clock since compare() has no clock parameter
    let fresh = |id: &str, title: &str, ups: i64| {
        let mut r = Record::new(id, title);
        r.upvotes = ups;
        r.created_at = Utc::now().timestamp() as f64;
        r
    };
    let path = tmp.path().join("company_news/stocks.jsonl");
    merge_at(&path, vec![fresh("x", "AMD launch", 10), fresh("y", "INTC fab news", 90)], Utc::now()).unwrap();

    let analyzer = PopularityAnalyzer::new(settings(tmp.path()));
    let c = analyzer.compare(&["AMD".to_string(), "INTC".to_string()], 7);
    assert_eq!(c.winner.as_deref(), Some("INTC"));
    assert_eq!(c.rankings.len(), 2);
    assert_eq!(c.rankings[1].symbol, "AMD");
}

#[test]
fn digest_filters_by_day_and_entity() {
    let tmp = tempfile::tempdir().unwrap();
    let may1 = 1_714_521_600.0; // 2024-05-01T00:00:00Z
    let at = |id: &str, title: &str, ups: i64, created: f64| {
        let mut r = Record::new(id, title);
        r.upvotes = ups;
        r.created_at = created;
        r
    };
    write(
        tmp.path(),
        "stocks",
        vec![
            at("s1", "Apple event recap", 10, may1 + 3600.0),
            at("s2", "Apple supplier news", 30, may1 + 7200.0),
            at("s3", "Banks rally", 99, may1 + 7200.0),
            at("s4", "Apple yesterday", 500, may1 - 3600.0),
        ],
    );
    write(tmp.path(), "investing", vec![at("i1", "aapl dividends", 5, may1 + 60.0)]);

    let s = Settings::default().with_data_root(tmp.path());
    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

    let all = top_from_category(&s, "company_news", date, 10, None).unwrap();
    assert_eq!(all.len(), 4);

    let apple = top_from_category(&s, "company_news", date, 10, Some("AAPL")).unwrap();
    let titles: Vec<_> = apple.iter().map(|p| p.title.as_str()).collect();
    // files in name order, each sorted by upvotes
    assert_eq!(titles, vec!["aapl dividends", "Apple supplier news", "Apple event recap"]);

    // one per community when the limit is below the file count
    let tight = top_from_category(&s, "company_news", date, 1, None).unwrap();
    assert_eq!(tight.len(), 2);
    assert_eq!(tight[1].title, "Banks rally");

    assert!(top_from_category(&s, "nope", date, 10, None).unwrap().is_empty());
}
