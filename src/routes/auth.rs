// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava OAuth linking routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth", get(auth_start))
        .route("/callback", get(auth_callback))
}

/// Start OAuth flow - redirect to Strava authorization.
async fn auth_start(State(state): State<Arc<AppState>>) -> Redirect {
    tracing::info!(
        client_id = %state.config.strava_client_id,
        redirect_uri = %state.config.strava_redirect_uri,
        "Starting OAuth flow, redirecting to Strava"
    );

    Redirect::temporary(&state.oauth.authorization_url())
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    /// Set by Strava when the athlete denies access.
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens and store the credential.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<String> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Strava");
        return Err(AppError::BadRequest(format!(
            "Strava authorization was not granted: {}",
            error
        )));
    }

    let code = params
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing code".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");
    let credential = state.linker.link_account(&code).await?;

    Ok(format!(
        "Strava account linked for {} {} (athlete {}). You can close this window.",
        credential.first_name, credential.last_name, credential.account_id
    ))
}
