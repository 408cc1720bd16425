// src/error.rs
//! Error taxonomy for the download path.
//!
//! `CollectorError` is what the platform client and the pagers return; the retry
//! layer only looks at [`CollectorError::is_retryable`], the download run only at
//! [`CollectorError::is_fatal`]. Everything file- or config-shaped goes through
//! `anyhow` with context instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    /// Credentials rejected or token endpoint unusable. Aborts the whole run.
    #[error("authentication with the platform failed: {0}")]
    Auth(String),

    #[error("rate limited by the platform (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("HTTP {status} from {endpoint}")]
    Http { status: u16, endpoint: String },

    #[error("request timed out")]
    Timeout,

    /// Connection reset, TLS handshake failure, DNS hiccup...
    #[error("network error: {message}")]
    Network { message: String, transient: bool },

    #[error("malformed response: {0}")]
    Decode(String),

    /// A local collection could not be read while paging over it.
    #[error("reading stored collections failed: {0}")]
    Storage(String),
}

impl CollectorError {
    pub fn is_retryable(&self) -> bool {
        match self {
            CollectorError::RateLimited { .. } | CollectorError::Timeout => true,
            CollectorError::Network { transient, .. } => *transient,
            CollectorError::Http { status, .. } => *status >= 500,
            CollectorError::Auth(_) | CollectorError::Decode(_) | CollectorError::Storage(_) => false,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, CollectorError::Auth(_))
    }
}

impl From<reqwest::Error> for CollectorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CollectorError::Timeout
        } else if e.is_decode() {
            CollectorError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            CollectorError::Http {
                status: status.as_u16(),
                endpoint: e.url().map(|u| u.path().to_string()).unwrap_or_default(),
            }
        } else {
            CollectorError::Network {
                message: e.to_string(),
                transient: e.is_connect() || e.is_request() || e.is_body(),
            }
        }
    }
}

/// Fatal configuration problems, raised before any network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(&'static str),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(CollectorError::RateLimited { retry_after: None }.is_retryable());
        assert!(CollectorError::Timeout.is_retryable());
        assert!(CollectorError::Http {
            status: 503,
            endpoint: "/r/stocks/hot".into()
        }
        .is_retryable());
        assert!(!CollectorError::Http {
            status: 404,
            endpoint: "/r/nope/hot".into()
        }
        .is_retryable());
        assert!(!CollectorError::Auth("401".into()).is_retryable());
        assert!(!CollectorError::Network {
            message: "bad cert".into(),
            transient: false
        }
        .is_retryable());
    }

    #[test]
    fn only_auth_is_fatal() {
        assert!(CollectorError::Auth("bad secret".into()).is_fatal());
        assert!(!CollectorError::Timeout.is_fatal());
        assert!(!CollectorError::Decode("eof".into()).is_fatal());
        assert!(!CollectorError::Storage("denied".into()).is_fatal());
        assert!(!CollectorError::Storage("denied".into()).is_retryable());
    }
}
