// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Administrative routes. The admin guard is applied in routes/mod.rs.

use crate::error::Result;
use crate::models::TokenState;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/users", get(list_users))
}

/// One linked account in the admin listing. Tokens are never exposed.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct LinkedUser {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub account_id: u64,
    pub first_name: String,
    pub last_name: String,
    pub token_expires_at: String,
    pub token_state: TokenState,
}

/// List every linked account.
async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<LinkedUser>>> {
    let tokens = state.pipeline.tokens();
    let mut users: Vec<LinkedUser> = state
        .store
        .list_all()
        .await?
        .into_iter()
        .map(|c| LinkedUser {
            id: c.id,
            account_id: c.account_id,
            token_state: tokens.state_of(&c),
            token_expires_at: format_utc_rfc3339(c.tokens.expires_at),
            first_name: c.first_name,
            last_name: c.last_name,
        })
        .collect();
    users.sort_by_key(|u| u.id);

    Ok(Json(users))
}
