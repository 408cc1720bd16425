// tests/news_pager.rs
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use stock_buzz::config::NewsSettings;
use stock_buzz::ingest::retry::RetryPolicy;
use stock_buzz::news::{fetch_concurrent, fetch_serial, fetch_with_fallback, Page, PageSource, PagerConfig};
use stock_buzz::CollectorError;

/// Three items per page, `pages` pages. Pages listed in `broken` always fail;
/// pages in `flaky` fail on their first request only.
struct Headlines {
    pages: u32,
    broken: Vec<u32>,
    flaky: Vec<u32>,
    calls: Mutex<HashMap<u32, u32>>,
}

impl Headlines {
    fn new(pages: u32) -> Self {
        Self {
            pages,
            broken: vec![],
            flaky: vec![],
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn calls(&self, n: u32) -> u32 {
        self.calls.lock().unwrap().get(&n).copied().unwrap_or(0)
    }
}

#[async_trait]
impl PageSource for Headlines {
    type Item = String;

    async fn fetch_page(&self, n: u32) -> Result<Page<String>, CollectorError> {
        let seen = {
            let mut calls = self.calls.lock().unwrap();
            let c = calls.entry(n).or_insert(0);
            *c += 1;
            *c
        };
        if self.broken.contains(&n) || (self.flaky.contains(&n) && seen == 1) {
            return Err(CollectorError::Http {
                status: 502,
                endpoint: format!("/news?page={n}"),
            });
        }
        if n >= self.pages {
            return Ok(Page { items: vec![], has_next: false });
        }
        Ok(Page {
            items: (0..3).map(|i| format!("p{n}-{i}")).collect(),
            has_next: n + 1 < self.pages,
        })
    }
}

fn cfg(workers: usize, max_pages: u32, attempts: u32) -> PagerConfig {
    PagerConfig {
        workers,
        max_pages,
        retry: RetryPolicy::immediate(attempts),
    }
}

#[tokio::test]
async fn flaky_pages_are_retried() {
    let mut src = Headlines::new(4);
    src.flaky = vec![0, 2];
    let src = Arc::new(src);

    let got = fetch_concurrent(src.clone(), &cfg(2, 10, 2)).await;
    assert_eq!(got.len(), 12);
    assert_eq!(got.first().map(String::as_str), Some("p0-0"));
    assert_eq!(got.last().map(String::as_str), Some("p3-2"));
    assert_eq!(src.calls(2), 2);
}

#[tokio::test]
async fn broken_page_is_skipped_without_reordering() {
    let mut src = Headlines::new(4);
    src.broken = vec![1];
    let src = Arc::new(src);

    let got = fetch_concurrent(src, &cfg(3, 10, 1)).await;
    let pages: Vec<_> = got.iter().map(|s| &s[..2]).collect();
    assert_eq!(pages, vec!["p0", "p0", "p0", "p2", "p2", "p2", "p3", "p3", "p3"]);
}

#[tokio::test]
async fn serial_gives_up_after_repeated_failures() {
    let mut src = Headlines::new(10);
    src.broken = vec![1, 2, 3, 4];
    let got = fetch_serial(&src, &cfg(1, 10, 1)).await;
    assert_eq!(got.len(), 3);
    // stopped at the third failure, page 4 never requested
    assert_eq!(src.calls(3), 1);
    assert_eq!(src.calls(4), 0);
}

#[tokio::test]
async fn fallback_runs_serial_when_first_page_fails() {
    let mut src = Headlines::new(2);
    src.flaky = vec![0];
    let src = Arc::new(src);

    // one attempt: the concurrent pass loses page 0, the serial pass sees page 0 succeed
    let got = fetch_with_fallback(src.clone(), &cfg(4, 10, 1)).await;
    assert_eq!(got.len(), 6);
    assert_eq!(src.calls(0), 2);
}

#[test]
fn config_from_settings_has_floors() {
    let news = NewsSettings {
        workers: 0,
        max_pages: 0,
    };
    let c = PagerConfig::from_settings(&news, RetryPolicy::immediate(1));
    assert_eq!(c.workers, 1);
    assert_eq!(c.max_pages, 1);
}
