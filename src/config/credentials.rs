// src/config/credentials.rs
//! Platform credentials, read from the environment (after `.env` is loaded).

use crate::error::ConfigError;

pub const ENV_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const ENV_USER_AGENT: &str = "REDDIT_USER_AGENT";
pub const DEFAULT_USER_AGENT: &str = "stock-buzz/0.1";

#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

// Keep the secret out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Credentials {
    /// Missing id or secret is a configuration error; nothing touches the network
    /// before this succeeds.
    pub fn from_env() -> Result<Self, ConfigError> {
        let client_id = non_empty_env(ENV_CLIENT_ID)
            .ok_or(ConfigError::MissingCredential(ENV_CLIENT_ID))?;
        let client_secret = non_empty_env(ENV_CLIENT_SECRET)
            .ok_or(ConfigError::MissingCredential(ENV_CLIENT_SECRET))?;
        let user_agent =
            non_empty_env(ENV_USER_AGENT).unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        Ok(Self {
            client_id,
            client_secret,
            user_agent,
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
