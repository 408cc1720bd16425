// src/news.rs
//! Paged news fetching.
//!
//! Any paged endpoint implements [`PageSource`]. Two strategies sit on top:
//!
//! - [`fetch_serial`]: page after page until an empty or last page.
//! - [`fetch_concurrent`]: read page 0 alone, then fetch pages `1..max_pages` with a
//!   fixed pool of workers and keep them in page order up to the first
//!   terminal page.
//!
//! Both retry each page, tolerate a few failed pages and give up after
//! [`MAX_PAGE_FAILURES`]. [`fetch_with_fallback`] runs the concurrent path and
//! falls back to the serial one when it comes back empty.

use metrics::counter;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::NewsSettings;
use crate::error::CollectorError;
use crate::ingest::retry::{with_retry, RetryPolicy};

/// Failed pages tolerated before a fetch gives up.
pub const MAX_PAGE_FAILURES: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next: bool,
}

impl<T> Page<T> {
    /// No more pages after this one.
    pub fn is_terminal(&self) -> bool {
        self.items.is_empty() || !self.has_next
    }
}

#[async_trait::async_trait]
pub trait PageSource: Send + Sync + 'static {
    type Item: Send + 'static;

    /// Fetch page `n` (0-based).
    async fn fetch_page(&self, n: u32) -> Result<Page<Self::Item>, CollectorError>;
}

#[derive(Debug, Clone)]
pub struct PagerConfig {
    pub workers: usize,
    pub max_pages: u32,
    pub retry: RetryPolicy,
}

impl PagerConfig {
    pub fn from_settings(news: &NewsSettings, retry: RetryPolicy) -> Self {
        Self {
            workers: news.workers.max(1),
            max_pages: news.max_pages.max(1),
            retry,
        }
    }
}

async fn fetch_one<S: PageSource>(source: &S, n: u32, retry: &RetryPolicy) -> Result<Page<S::Item>, CollectorError> {
    let what = format!("news page {n}");
    let page = with_retry(retry, &what, || source.fetch_page(n)).await?;
    counter!("news_pages_fetched_total").increment(1);
    Ok(page)
}

pub async fn fetch_serial<S: PageSource>(source: &S, cfg: &PagerConfig) -> Vec<S::Item> {
    let mut out = Vec::new();
    let mut failures = 0u32;
    for n in 0..cfg.max_pages {
        match fetch_one(source, n, &cfg.retry).await {
            Ok(page) => {
                let terminal = page.is_terminal();
                out.extend(page.items);
                if terminal {
                    break;
                }
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(target: "news", error = %e, page = n, failures, "page failed");
                if failures >= MAX_PAGE_FAILURES {
                    break;
                }
            }
        }
    }
    tracing::info!(target: "news", items = out.len(), "serial fetch finished");
    out
}

pub async fn fetch_concurrent<S: PageSource>(source: Arc<S>, cfg: &PagerConfig) -> Vec<S::Item> {
    let first = match fetch_one(source.as_ref(), 0, &cfg.retry).await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(target: "news", error = %e, "first page failed");
            return Vec::new();
        }
    };
    let mut out = Vec::new();
    let terminal = first.is_terminal();
    out.extend(first.items);
    if terminal || cfg.max_pages <= 1 {
        return out;
    }

    // Lowest page index known to be terminal; later pages are not requested.
    let stop_at = Arc::new(AtomicU32::new(cfg.max_pages));
    let permits = Arc::new(Semaphore::new(cfg.workers.max(1)));
    let mut tasks = JoinSet::new();

    for n in 1..cfg.max_pages {
        let source = source.clone();
        let stop_at = stop_at.clone();
        let permits = permits.clone();
        let retry = cfg.retry;
        tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return (n, None);
            };
            if n > stop_at.load(Ordering::SeqCst) {
                return (n, None);
            }
            let res = fetch_one(source.as_ref(), n, &retry).await;
            if let Ok(page) = &res {
                if page.is_terminal() {
                    stop_at.fetch_min(n, Ordering::SeqCst);
                }
            }
            (n, Some(res))
        });
    }

    let mut results: BTreeMap<u32, Result<Page<S::Item>, CollectorError>> = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((n, Some(res))) => {
                results.insert(n, res);
            }
            Ok((_, None)) => {}
            Err(e) => tracing::warn!(target: "news", error = %e, "page task aborted"),
        }
    }

    let mut failures = 0u32;
    for n in 1..cfg.max_pages {
        let Some(res) = results.remove(&n) else {
            break;
        };
        match res {
            Ok(page) => {
                let terminal = page.is_terminal();
                out.extend(page.items);
                if terminal {
                    break;
                }
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(target: "news", error = %e, page = n, failures, "page failed");
                if failures >= MAX_PAGE_FAILURES {
                    break;
                }
            }
        }
    }
    tracing::info!(target: "news", items = out.len(), workers = cfg.workers, "concurrent fetch finished");
    out
}

pub async fn fetch_with_fallback<S: PageSource>(source: Arc<S>, cfg: &PagerConfig) -> Vec<S::Item> {
    let items = fetch_concurrent(source.clone(), cfg).await;
    if !items.is_empty() {
        return items;
    }
    tracing::info!(target: "news", "concurrent fetch empty, retrying serially");
    fetch_serial(source.as_ref(), cfg).await
}
