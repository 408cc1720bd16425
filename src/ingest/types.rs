// src/ingest/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CollectorError;

/// Listing order requested from a community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingMode {
    #[default]
    Hot,
    New,
    Top,
    Rising,
}

impl ListingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingMode::Hot => "hot",
            ListingMode::New => "new",
            ListingMode::Top => "top",
            ListingMode::Rising => "rising",
        }
    }

    /// Unknown names fall back to `hot` with a warning.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "hot" => ListingMode::Hot,
            "new" => ListingMode::New,
            "top" => ListingMode::Top,
            "rising" => ListingMode::Rising,
            other => {
                tracing::warn!(target: "collector", mode = other, "unknown listing mode, using hot");
                ListingMode::Hot
            }
        }
    }
}

impl fmt::Display for ListingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time window for `top` listings; ignored by every other mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFilter {
    All,
    Day,
    #[default]
    Week,
    Month,
    Year,
}

impl TimeFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFilter::All => "all",
            TimeFilter::Day => "day",
            TimeFilter::Week => "week",
            TimeFilter::Month => "month",
            TimeFilter::Year => "year",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Some(TimeFilter::All),
            "day" => Some(TimeFilter::Day),
            "week" => Some(TimeFilter::Week),
            "month" => Some(TimeFilter::Month),
            "year" => Some(TimeFilter::Year),
            _ => None,
        }
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One page request against a community listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRequest {
    pub community: String,
    pub mode: ListingMode,
    pub time_filter: TimeFilter,
    /// Items wanted on this page (1..=100).
    pub page_size: u32,
    /// Platform cursor from the previous page.
    pub after: Option<String>,
}

/// Raw items of one page plus the cursor to the next one.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub items: Vec<serde_json::Value>,
    pub after: Option<String>,
}

/// Anything that can serve community listing pages: the live platform client
/// or an in-memory fake.
#[async_trait::async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_page(&self, req: &ListingRequest) -> Result<ListingPage, CollectorError>;
    fn name(&self) -> &'static str;
}
