// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Duration, Utc};
use pacer_coach::config::Config;
use pacer_coach::db::{CredentialStore, InMemoryCredentialStore};
use pacer_coach::models::{AccountCredential, CredentialUpsert, TokenSet};
use pacer_coach::routes::create_router;
use pacer_coach::services::{Summarizer, TemplateSummarizer};
use pacer_coach::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Service under test, wired to a mock Strava server.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<InMemoryCredentialStore>,
    pub strava: MockServer,
}

/// Offline config pointing every Strava URL at `strava`.
#[allow(dead_code)]
pub fn test_config(strava: &MockServer) -> Config {
    let mut config = Config::test_default();
    config.strava_oauth_url = strava.uri();
    config.strava_api_url = format!("{}/api/v3", strava.uri());
    config
}

#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    create_test_app_with(|_| {}, Arc::new(TemplateSummarizer)).await
}

/// Create a test app, letting the caller adjust config and summarizer.
#[allow(dead_code)]
pub async fn create_test_app_with(
    configure: impl FnOnce(&mut Config),
    summarizer: Arc<dyn Summarizer>,
) -> TestApp {
    let strava = MockServer::start().await;
    let mut config = test_config(&strava);
    configure(&mut config);

    let store = Arc::new(InMemoryCredentialStore::new());
    let state = Arc::new(
        AppState::new(config, store.clone(), summarizer).expect("Failed to build app state"),
    );

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        strava,
    }
}

/// Fail the test if Strava is contacted at all.
#[allow(dead_code)]
pub async fn forbid_upstream_calls(strava: &MockServer) {
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .named("no upstream calls")
        .mount(strava)
        .await;
}

/// Store a credential directly, bypassing the OAuth flow.
#[allow(dead_code)]
pub async fn seed_credential(
    store: &dyn CredentialStore,
    account_id: u64,
    access_token: &str,
    refresh_token: &str,
    expires_at: DateTime<Utc>,
) -> AccountCredential {
    store
        .upsert(CredentialUpsert {
            account_id,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            tokens: TokenSet {
                access_token: access_token.to_string(),
                refresh_token: refresh_token.to_string(),
                expires_at,
            },
        })
        .await
        .expect("Failed to seed credential")
}

/// A credential that expired an hour ago.
#[allow(dead_code)]
pub async fn seed_expired(store: &dyn CredentialStore, account_id: u64) -> AccountCredential {
    seed_credential(
        store,
        account_id,
        "stale_access",
        "old_refresh",
        Utc::now() - Duration::hours(1),
    )
    .await
}

/// A credential valid for another six hours.
#[allow(dead_code)]
pub async fn seed_valid(store: &dyn CredentialStore, account_id: u64) -> AccountCredential {
    seed_credential(
        store,
        account_id,
        "valid_access",
        "valid_refresh",
        Utc::now() + Duration::hours(6),
    )
    .await
}

/// Body of a successful refresh-token grant.
#[allow(dead_code)]
pub fn refresh_body(access_token: &str, refresh_token: &str, expires_at: i64) -> Value {
    json!({
        "token_type": "Bearer",
        "access_token": access_token,
        "refresh_token": refresh_token,
        "expires_at": expires_at,
        "expires_in": 21600
    })
}

/// Body of a successful authorization-code grant.
#[allow(dead_code)]
pub fn exchange_body(athlete_id: u64, firstname: &str, access_token: &str) -> Value {
    json!({
        "token_type": "Bearer",
        "access_token": access_token,
        "refresh_token": format!("{}_refresh", access_token),
        "expires_at": (Utc::now() + Duration::hours(6)).timestamp(),
        "expires_in": 21600,
        "athlete": {
            "id": athlete_id,
            "firstname": firstname,
            "lastname": "Lovelace",
            "profile": "https://example.com/avatar.jpg"
        }
    })
}

/// Raw Strava activity summary as returned by `/athlete/activities`.
#[allow(dead_code)]
pub fn strava_activity(name: &str, distance: f64, moving_time: u64, kind: &str) -> Value {
    json!({
        "id": 1000,
        "name": name,
        "distance": distance,
        "moving_time": moving_time,
        "elapsed_time": moving_time + 120,
        "type": kind,
        "sport_type": kind,
        "start_date": "2026-03-01T15:30:00Z",
        "start_date_local": "2026-03-01T07:30:00Z"
    })
}

/// Issue a GET against the router and decode the body (JSON or text).
#[allow(dead_code)]
pub async fn get(router: &axum::Router, uri: &str) -> (StatusCode, Value) {
    get_with_headers(router, uri, &[]).await
}

#[allow(dead_code)]
pub async fn get_with_headers(
    router: &axum::Router,
    uri: &str,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut request = Request::builder().method("GET").uri(uri);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let response = router
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

    (status, body)
}
