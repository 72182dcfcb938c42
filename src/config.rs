// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup; the resulting `Config` is cloned into
//! the services that need it.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default page size for the recent-activities call.
pub const DEFAULT_ACTIVITY_LIMIT: u32 = 5;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Strava OAuth application ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Redirect URI registered with Strava for `/callback`
    pub strava_redirect_uri: String,
    /// Base URL for `/oauth/authorize` and `/oauth/token`
    pub strava_oauth_url: String,
    /// Base URL for the REST API
    pub strava_api_url: String,
    /// Scope requested by `/auth`
    pub strava_scope: String,

    // --- Server ---
    /// Server port
    pub port: u16,
    /// GCP project ID. When unset, credentials are kept in memory only.
    pub gcp_project_id: Option<String>,
    /// Bearer token protecting the administrative `/users` listing
    pub admin_token: Option<String>,

    // --- Token lifecycle and upstream calls ---
    /// Timeout applied to every upstream HTTP call
    pub upstream_timeout: Duration,
    /// Tokens are treated as expired this long before their expiry instant
    pub token_refresh_margin: chrono::Duration,
    /// Number of recent activities fetched per request
    pub activity_limit: u32,

    // --- Feedback generation ---
    /// LLM summarizer settings; template feedback is used when absent
    pub llm: Option<LlmConfig>,
    /// Upper bound on a single summarize call
    pub summarize_timeout: Duration,
}

/// OpenAI-compatible chat completion endpoint used for feedback.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl Config {
    /// Offline configuration for tests.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            strava_redirect_uri: "http://localhost:8080/callback".to_string(),
            strava_oauth_url: "http://127.0.0.1:9".to_string(),
            strava_api_url: "http://127.0.0.1:9/api/v3".to_string(),
            strava_scope: "read,activity:read_all".to_string(),
            port: 8080,
            gcp_project_id: None,
            admin_token: None,
            upstream_timeout: Duration::from_secs(5),
            token_refresh_margin: chrono::Duration::zero(),
            activity_limit: DEFAULT_ACTIVITY_LIMIT,
            llm: None,
            summarize_timeout: Duration::from_secs(5),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let llm = optional("LLM_API_KEY").map(|api_key| LlmConfig {
            api_key,
            base_url: env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        });

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            strava_redirect_uri: env::var("STRAVA_REDIRECT_URI")
                .unwrap_or_else(|_| "http://localhost:8080/callback".to_string()),
            strava_oauth_url: env::var("STRAVA_OAUTH_URL")
                .unwrap_or_else(|_| "https://www.strava.com".to_string()),
            strava_api_url: env::var("STRAVA_API_URL")
                .unwrap_or_else(|_| "https://www.strava.com/api/v3".to_string()),
            strava_scope: env::var("STRAVA_SCOPE")
                .unwrap_or_else(|_| "read,activity:read_all".to_string()),
            port: parse_or("PORT", 8080)?,
            gcp_project_id: optional("GCP_PROJECT_ID"),
            admin_token: optional("ADMIN_TOKEN"),
            upstream_timeout: Duration::from_secs(parse_or("UPSTREAM_TIMEOUT_SECS", 10)?),
            token_refresh_margin: chrono::Duration::seconds(parse_or(
                "TOKEN_REFRESH_MARGIN_SECS",
                60,
            )?),
            activity_limit: parse_or("ACTIVITY_LIMIT", DEFAULT_ACTIVITY_LIMIT)?,
            llm,
            summarize_timeout: Duration::from_secs(parse_or("SUMMARIZE_TIMEOUT_SECS", 30)?),
        })
    }
}

/// Read a variable, treating an empty value as unset.
fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid(name, raw)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
