// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity and coaching routes.

use crate::error::{AppError, Result};
use crate::models::NormalizedActivity;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/activities", get(get_activities))
        .route("/coach", get(get_coaching))
}

#[derive(Deserialize)]
struct AccountQuery {
    /// Strava athlete ID (`strava_id` is accepted for older clients)
    #[serde(default, rename = "accountId", alias = "strava_id")]
    account_id: Option<String>,
}

impl AccountQuery {
    /// Validate the account id before anything touches the network.
    fn account_id(&self) -> Result<u64> {
        let raw = self
            .account_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::BadRequest("Missing accountId".to_string()))?;

        raw.parse()
            .map_err(|_| AppError::BadRequest("Invalid accountId: must be a number".to_string()))
    }
}

// ─── Activities ──────────────────────────────────────────────

/// Recent activities for a linked athlete.
async fn get_activities(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AccountQuery>,
) -> Result<Json<Vec<NormalizedActivity>>> {
    let account_id = query.account_id()?;
    let activities = state.pipeline.get_activities(account_id).await?;

    tracing::debug!(account_id, count = activities.len(), "Served activities");
    Ok(Json(activities))
}

// ─── Coaching ────────────────────────────────────────────────

/// Coaching feedback response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FeedbackResponse {
    pub feedback: String,
}

/// Feedback on a linked athlete's recent activities.
async fn get_coaching(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AccountQuery>,
) -> Result<Json<FeedbackResponse>> {
    let account_id = query.account_id()?;
    let feedback = state.pipeline.get_feedback(account_id).await?;

    tracing::info!(account_id, "Coaching feedback generated");
    Ok(Json(FeedbackResponse { feedback }))
}
