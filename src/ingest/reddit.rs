// src/ingest/reddit.rs
//! Live listing source backed by the platform's OAuth API.
//!
//! Application-only auth: client-credentials grant against the token
//! endpoint, bearer token cached until shortly before expiry.

use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::{CollectorSettings, Credentials};
use crate::error::CollectorError;
use crate::ingest::types::{ListingMode, ListingPage, ListingRequest, ListingSource};

pub const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const API_BASE: &str = "https://oauth.reddit.com";

/// Refresh this long before the advertised expiry.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct RedditSource {
    client: Client,
    credentials: Credentials,
    token_url: String,
    api_base: String,
    token: RwLock<Option<CachedToken>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
    #[serde(default)]
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Child {
    #[serde(default)]
    data: serde_json::Value,
}

impl RedditSource {
    pub fn new(credentials: Credentials, settings: &CollectorSettings) -> Result<Self, CollectorError> {
        let client = Client::builder()
            .user_agent(credentials.user_agent.clone())
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.read_timeout_secs))
            .build()
            .map_err(|e| CollectorError::Network {
                message: e.to_string(),
                transient: false,
            })?;
        Ok(Self {
            client,
            credentials,
            token_url: TOKEN_URL.to_string(),
            api_base: API_BASE.to_string(),
            token: RwLock::new(None),
        })
    }

    /// Point at another host pair (staging proxy, local mock).
    pub fn with_endpoints(mut self, token_url: impl Into<String>, api_base: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn bearer(&self) -> Result<String, CollectorError> {
        {
            let guard = self.token.read().await;
            if let Some(t) = guard.as_ref() {
                if Instant::now() < t.expires_at {
                    return Ok(t.value.clone());
                }
            }
        }
        let fresh = self.request_token().await?;
        let value = fresh.value.clone();
        *self.token.write().await = Some(fresh);
        Ok(value)
    }

    async fn request_token(&self) -> Result<CachedToken, CollectorError> {
        let rsp = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = rsp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN || status == StatusCode::BAD_REQUEST {
            return Err(CollectorError::Auth(format!("token endpoint answered {status}")));
        }
        if let Some(e) = classify_status(status, "/api/v1/access_token", &rsp) {
            return Err(e);
        }

        let body: TokenResponse = rsp.json().await?;
        match body.access_token {
            Some(value) if !value.is_empty() => {
                let ttl = Duration::from_secs(body.expires_in.unwrap_or(3600));
                tracing::debug!(target: "collector", ttl_secs = ttl.as_secs(), "obtained access token");
                Ok(CachedToken {
                    value,
                    expires_at: Instant::now() + ttl.saturating_sub(TOKEN_SLACK),
                })
            }
            _ => Err(CollectorError::Auth(
                body.error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no access token in response".to_string()),
            )),
        }
    }

    async fn get_listing(&self, req: &ListingRequest, token: &str) -> Result<reqwest::Response, CollectorError> {
        let url = format!("{}/r/{}/{}", self.api_base, req.community, req.mode.as_str());
        let mut query: Vec<(&str, String)> = vec![
            ("limit", req.page_size.clamp(1, 100).to_string()),
            ("raw_json", "1".to_string()),
        ];
        if req.mode == ListingMode::Top {
            query.push(("t", req.time_filter.as_str().to_string()));
        }
        if let Some(after) = &req.after {
            query.push(("after", after.clone()));
        }
        Ok(self
            .client
            .get(url)
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?)
    }
}

#[async_trait::async_trait]
impl ListingSource for RedditSource {
    async fn fetch_page(&self, req: &ListingRequest) -> Result<ListingPage, CollectorError> {
        let token = self.bearer().await?;
        let mut rsp = self.get_listing(req, &token).await?;

        // A stale token gets one refresh before giving up.
        if rsp.status() == StatusCode::UNAUTHORIZED {
            *self.token.write().await = None;
            let token = self.bearer().await?;
            rsp = self.get_listing(req, &token).await?;
            if rsp.status() == StatusCode::UNAUTHORIZED {
                return Err(CollectorError::Auth("listing request rejected after token refresh".into()));
            }
        }

        let endpoint = format!("/r/{}/{}", req.community, req.mode.as_str());
        if let Some(e) = classify_status(rsp.status(), &endpoint, &rsp) {
            return Err(e);
        }

        let listing: Listing = rsp.json().await?;
        Ok(ListingPage {
            items: listing.data.children.into_iter().map(|c| c.data).collect(),
            after: listing.data.after.filter(|a| !a.is_empty()),
        })
    }

    fn name(&self) -> &'static str {
        "reddit"
    }
}

/// Map a non-success status to an error; `None` for 2xx.
fn classify_status(status: StatusCode, endpoint: &str, rsp: &reqwest::Response) -> Option<CollectorError> {
    if status.is_success() {
        return None;
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = rsp
            .headers()
            .get(header::RETRY_AFTER)
            .or_else(|| rsp.headers().get("x-ratelimit-reset"))
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<f64>().ok())
            .map(|secs| secs.max(0.0).ceil() as u64);
        return Some(CollectorError::RateLimited { retry_after });
    }
    Some(CollectorError::Http {
        status: status.as_u16(),
        endpoint: endpoint.to_string(),
    })
}
