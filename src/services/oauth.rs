// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth exchanges with Strava.
//!
//! The exchanger is stateless: it turns a code or refresh token into a new
//! `TokenSet` and never touches the credential store.

use super::strava::{StravaClient, UpstreamError};
use crate::models::TokenSet;
use crate::time_utils::from_unix_seconds;
use chrono::Utc;

/// Result of an authorization-code exchange.
#[derive(Debug, Clone)]
pub struct CodeExchange {
    pub account_id: u64,
    pub first_name: String,
    pub last_name: String,
    pub tokens: TokenSet,
}

/// Performs authorization-code and refresh-token grants.
#[derive(Clone)]
pub struct OAuthExchanger {
    client: StravaClient,
    redirect_uri: String,
    scope: String,
}

impl OAuthExchanger {
    pub fn new(client: StravaClient, redirect_uri: String, scope: String) -> Self {
        Self {
            client,
            redirect_uri,
            scope,
        }
    }

    /// URL of the Strava consent page with our fixed scope and redirect URI.
    pub fn authorization_url(&self) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&approval_prompt=auto&scope={}",
            self.client.authorize_url(),
            urlencoding::encode(self.client.client_id()),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scope),
        )
    }

    /// Exchange an authorization code for the athlete's identity and tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<CodeExchange, UpstreamError> {
        let response = self.client.exchange_code(code).await.inspect_err(|e| {
            tracing::warn!(error = %e, "Strava token exchange failed");
        })?;

        let tokens = token_set(
            response.access_token,
            response.refresh_token,
            response.expires_at,
        )?;

        Ok(CodeExchange {
            account_id: response.athlete.id,
            first_name: response.athlete.firstname.unwrap_or_default(),
            last_name: response.athlete.lastname.unwrap_or_default(),
            tokens,
        })
    }

    /// Trade a refresh token for a new token set.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, UpstreamError> {
        let response = self.client.refresh_token(refresh_token).await?;
        token_set(
            response.access_token,
            response.refresh_token,
            response.expires_at,
        )
    }
}

/// Validate a grant response into a `TokenSet`.
///
/// An expiry that is not in the future would be unusable immediately, so it
/// is rejected before anything can be persisted.
fn token_set(
    access_token: String,
    refresh_token: String,
    expires_at: i64,
) -> Result<TokenSet, UpstreamError> {
    if access_token.is_empty() || refresh_token.is_empty() {
        return Err(UpstreamError::Malformed("empty token in grant".to_string()));
    }

    let expires_at = from_unix_seconds(expires_at)
        .ok_or_else(|| UpstreamError::Malformed(format!("bad expires_at {}", expires_at)))?;

    if expires_at <= Utc::now() {
        tracing::warn!(%expires_at, "Strava returned an already-expired token");
        return Err(UpstreamError::Malformed(format!(
            "token already expired at {}",
            expires_at
        )));
    }

    Ok(TokenSet {
        access_token,
        refresh_token,
        expires_at,
    })
}
