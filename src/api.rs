// src/api.rs
//! Read-only HTTP surface over the stored collections.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::analyze::{AnalyzeOptions, PopularityAnalyzer};
use crate::config::Settings;
use crate::report;

#[derive(Clone)]
pub struct AppState {
    analyzer: Arc<PopularityAnalyzer>,
}

impl AppState {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            analyzer: Arc::new(PopularityAnalyzer::new(settings)),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/analyze/{symbol}", get(analyze))
        .route("/ranking", get(ranking))
        .route("/ranking/text", get(ranking_text))
        .route("/trending", get(trending))
        .route("/compare", get(compare))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

fn bad_request(msg: impl Into<String>) -> ApiError {
    ApiError(StatusCode::BAD_REQUEST, msg.into())
}

/// Collections are read with blocking file I/O.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::warn!(error = ?e, "analysis task failed");
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, "analysis failed".into())
    })
}

#[derive(Debug, Default, Deserialize)]
struct WindowQuery {
    days: Option<u32>,
    min_relevance: Option<f64>,
    top_n: Option<usize>,
    #[serde(default)]
    details: bool,
    #[serde(default)]
    full_posts: bool,
}

impl WindowQuery {
    fn options(&self, analyzer: &PopularityAnalyzer) -> Result<AnalyzeOptions, ApiError> {
        let mut opts = analyzer.default_options();
        if let Some(d) = self.days {
            opts = opts.with_days(d);
        }
        if let Some(m) = self.min_relevance {
            if !(0.0..=1.0).contains(&m) {
                return Err(bad_request("min_relevance must be within 0..=1"));
            }
            opts = opts.with_min_relevance(m);
        }
        Ok(opts)
    }

    fn top_n(&self, analyzer: &PopularityAnalyzer) -> Result<usize, ApiError> {
        match self.top_n {
            Some(0) => Err(bad_request("top_n must be positive")),
            Some(n) => Ok(n),
            None => Ok(analyzer.settings().analysis.top_n),
        }
    }
}

async fn analyze(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(q): Query<WindowQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let symbol = symbol.trim().to_ascii_uppercase();
    if symbol.is_empty() {
        return Err(bad_request("symbol required"));
    }
    let opts = q.options(&state.analyzer)?;
    let analyzer = state.analyzer.clone();
    let result = blocking(move || analyzer.analyze(&symbol, &opts)).await?;
    Ok(Json(result))
}

async fn ranking(
    State(state): State<AppState>,
    Query(q): Query<WindowQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let opts = q.options(&state.analyzer)?;
    let top_n = q.top_n(&state.analyzer)?;
    let analyzer = state.analyzer.clone();
    let result = blocking(move || analyzer.rank(None, &opts, top_n)).await?;
    Ok(Json(result))
}

async fn ranking_text(
    State(state): State<AppState>,
    Query(q): Query<WindowQuery>,
) -> Result<String, ApiError> {
    let opts = q.options(&state.analyzer)?;
    let top_n = q.top_n(&state.analyzer)?;
    let (details, full_posts) = (q.details, q.full_posts);
    let analyzer = state.analyzer.clone();
    let result = blocking(move || analyzer.rank(None, &opts, top_n)).await?;
    Ok(report::format_ranking(&result, details, full_posts))
}

#[derive(Debug, Deserialize)]
struct TrendingQuery {
    days: Option<u32>,
    min_mentions: Option<usize>,
}

async fn trending(
    State(state): State<AppState>,
    Query(q): Query<TrendingQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let days = q.days.unwrap_or(1);
    let min_mentions = q.min_mentions.unwrap_or(5);
    let analyzer = state.analyzer.clone();
    let entries = blocking(move || analyzer.trending(days, min_mentions)).await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
struct CompareQuery {
    /// Comma-separated symbols.
    symbols: String,
    days: Option<u32>,
}

async fn compare(
    State(state): State<AppState>,
    Query(q): Query<CompareQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let symbols: Vec<String> = q
        .symbols
        .split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    if symbols.is_empty() {
        return Err(bad_request("symbols required"));
    }
    let days = q.days.unwrap_or(state.analyzer.settings().analysis.days_back);
    let analyzer = state.analyzer.clone();
    let result = blocking(move || analyzer.compare(&symbols, days)).await?;
    Ok(Json(result))
}
