// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava HTTP client.
//!
//! Handles:
//! - Authorization-code and refresh-token grants against `/oauth/token`
//! - The recent-activities listing
//! - Mapping every non-success, timeout or undecodable body to `UpstreamError`

use crate::config::Config;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Failure talking to Strava. The raw body is kept for diagnostics only.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl UpstreamError {
    /// Whether Strava rejected the request itself (4xx), as opposed to being
    /// unreachable, failing, or answering with garbage.
    pub fn is_rejection(&self) -> bool {
        matches!(self, UpstreamError::Status { status, .. } if (400..500).contains(status))
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else if e.is_decode() {
            UpstreamError::Malformed(e.to_string())
        } else {
            UpstreamError::Transport(e.to_string())
        }
    }
}

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    oauth_url: String,
    api_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a client whose every request is bounded by `config.upstream_timeout`.
    pub fn new(config: &Config) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .map_err(|e| UpstreamError::Transport(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            oauth_url: config.strava_oauth_url.trim_end_matches('/').to_string(),
            api_url: config.strava_api_url.trim_end_matches('/').to_string(),
            client_id: config.strava_client_id.clone(),
            client_secret: config.strava_client_secret.clone(),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Base URL for the browser-facing authorization page.
    pub fn authorize_url(&self) -> String {
        format!("{}/oauth/authorize", self.oauth_url)
    }

    /// Exchange an authorization code for tokens and athlete info.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, UpstreamError> {
        self.token_grant(&[("code", code), ("grant_type", "authorization_code")])
            .await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, UpstreamError> {
        self.token_grant(&[
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    /// List the authenticated athlete's most recent activities (newest first).
    pub async fn list_recent_activities(
        &self,
        access_token: &str,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>, UpstreamError> {
        let url = format!("{}/athlete/activities", self.api_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("page", "1".to_string()), ("per_page", per_page.to_string())])
            .send()
            .await?;

        check_response_json(response).await
    }

    async fn token_grant<T: DeserializeOwned>(
        &self,
        grant: &[(&str, &str)],
    ) -> Result<T, UpstreamError> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend_from_slice(grant);

        let response = self
            .http
            .post(format!("{}/oauth/token", self.oauth_url))
            .form(&form)
            .send()
            .await?;

        check_response_json(response).await
    }
}

/// Check response status and parse the JSON body.
async fn check_response_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, UpstreamError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!("Strava rate limit hit (429)");
        }

        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Malformed(e.to_string()))
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds)
    pub expires_at: i64,
    pub athlete: StravaAthlete,
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds)
    pub expires_at: i64,
}

/// Athlete info from OAuth token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
}

/// Summary activity for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub name: String,
    /// Meters
    pub distance: f64,
    /// Seconds
    pub moving_time: u64,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub start_date: chrono::DateTime<chrono::Utc>,
}
