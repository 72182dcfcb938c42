// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token lifecycle tests: fast path, refresh, single-flight and failure handling.

use chrono::{Duration, Utc};
use futures_util::future::join_all;
use pacer_coach::db::CredentialStore;
use pacer_coach::models::TokenState;
use pacer_coach::services::{LifecycleError, TemplateSummarizer, UpstreamError};
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

mod common;
use common::{
    create_test_app, create_test_app_with, exchange_body, refresh_body, seed_expired, seed_valid,
};

const CONCURRENT_CALLERS: usize = 8;

#[tokio::test]
async fn test_unlinked_account_makes_no_network_call() {
    let app = create_test_app().await;
    common::forbid_upstream_calls(&app.strava).await;

    let result = app.state.pipeline.tokens().ensure_valid(42).await;

    assert!(matches!(result, Err(LifecycleError::AccountNotLinked(42))));
}

#[tokio::test]
async fn test_valid_token_is_returned_without_refresh() {
    let app = create_test_app().await;
    common::forbid_upstream_calls(&app.strava).await;
    seed_valid(app.store.as_ref(), 42).await;

    let token = app.state.pipeline.tokens().ensure_valid(42).await.unwrap();

    assert_eq!(token, "valid_access");
    assert_eq!(
        app.state.pipeline.tokens().status(42).await.unwrap(),
        TokenState::Valid
    );
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_stored() {
    let app = create_test_app().await;
    let before = seed_expired(app.store.as_ref(), 42).await;
    let new_expiry = (Utc::now() + Duration::hours(6)).timestamp();

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old_refresh"))
        .and(body_string_contains("client_id=test_client_id"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(refresh_body(
                "fresh_access",
                "rotated_refresh",
                new_expiry,
            )),
        )
        .expect(1)
        .mount(&app.strava)
        .await;

    let token = app.state.pipeline.tokens().ensure_valid(42).await.unwrap();
    assert_eq!(token, "fresh_access");

    let stored = app.store.get(42).await.unwrap().unwrap();
    assert_eq!(stored.tokens.access_token, "fresh_access");
    assert_eq!(stored.tokens.refresh_token, "rotated_refresh");
    assert_eq!(stored.tokens.expires_at.timestamp(), new_expiry);
    assert!(stored.tokens.expires_at > before.tokens.expires_at);
    assert_eq!(stored.id, before.id);
    assert_eq!(stored.first_name, before.first_name);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_refresh() {
    let app = create_test_app().await;
    seed_expired(app.store.as_ref(), 42).await;
    let new_expiry = (Utc::now() + Duration::hours(6)).timestamp();

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(refresh_body("fresh_access", "rotated_refresh", new_expiry))
                .set_delay(std::time::Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&app.strava)
        .await;

    let tokens = app.state.pipeline.tokens();
    let results = join_all((0..CONCURRENT_CALLERS).map(|_| tokens.ensure_valid(42))).await;

    assert_eq!(results.len(), CONCURRENT_CALLERS);
    for result in results {
        assert_eq!(result.unwrap(), "fresh_access");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_refresh_is_shared_and_leaves_credential_untouched() {
    let app = create_test_app().await;
    let before = seed_expired(app.store.as_ref(), 42).await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({
                    "message": "Bad Request",
                    "errors": [{"resource": "RefreshToken", "field": "refresh_token", "code": "invalid"}]
                }))
                .set_delay(std::time::Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&app.strava)
        .await;

    let tokens = app.state.pipeline.tokens();
    let results = join_all((0..CONCURRENT_CALLERS).map(|_| tokens.ensure_valid(42))).await;

    for result in results {
        match result {
            Err(LifecycleError::RefreshFailed(UpstreamError::Status { status, body })) => {
                assert_eq!(status, 400);
                assert!(body.contains("RefreshToken"));
            }
            other => panic!("expected shared refresh failure, got {:?}", other),
        }
    }

    let after = app.store.get(42).await.unwrap().unwrap();
    assert_eq!(after, before);
    assert_eq!(tokens.status(42).await.unwrap(), TokenState::Unavailable);
}

#[tokio::test]
async fn test_failed_refresh_is_retried_on_next_request() {
    let app = create_test_app().await;
    seed_expired(app.store.as_ref(), 42).await;
    let new_expiry = (Utc::now() + Duration::hours(6)).timestamp();

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&app.strava)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body(
            "fresh_access",
            "rotated_refresh",
            new_expiry,
        )))
        .expect(1)
        .mount(&app.strava)
        .await;

    let tokens = app.state.pipeline.tokens();
    assert!(matches!(
        tokens.ensure_valid(42).await,
        Err(LifecycleError::RefreshFailed(UpstreamError::Status { status: 503, .. }))
    ));
    assert_eq!(tokens.ensure_valid(42).await.unwrap(), "fresh_access");
    assert_eq!(tokens.status(42).await.unwrap(), TokenState::Valid);
}

#[tokio::test]
async fn test_already_expired_refresh_response_is_not_stored() {
    let app = create_test_app().await;
    let before = seed_expired(app.store.as_ref(), 42).await;
    let past = (Utc::now() - Duration::minutes(5)).timestamp();

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(refresh_body("bad_access", "bad_refresh", past)),
        )
        .expect(1)
        .mount(&app.strava)
        .await;

    let result = app.state.pipeline.tokens().ensure_valid(42).await;

    assert!(matches!(
        result,
        Err(LifecycleError::RefreshFailed(UpstreamError::Malformed(_)))
    ));
    assert_eq!(app.store.get(42).await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn test_malformed_refresh_response_is_not_stored() {
    let app = create_test_app().await;
    let before = seed_expired(app.store.as_ref(), 42).await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"access_token": "only_half"})),
        )
        .expect(1)
        .mount(&app.strava)
        .await;

    let result = app.state.pipeline.tokens().ensure_valid(42).await;

    assert!(matches!(
        result,
        Err(LifecycleError::RefreshFailed(UpstreamError::Malformed(_)))
    ));
    assert_eq!(app.store.get(42).await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn test_refresh_timeout_is_a_failure() {
    let app = create_test_app_with(
        |config| config.upstream_timeout = std::time::Duration::from_millis(100),
        Arc::new(TemplateSummarizer),
    )
    .await;
    let before = seed_expired(app.store.as_ref(), 42).await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(refresh_body(
                    "late_access",
                    "late_refresh",
                    (Utc::now() + Duration::hours(6)).timestamp(),
                ))
                .set_delay(std::time::Duration::from_secs(2)),
        )
        .mount(&app.strava)
        .await;

    let result = app.state.pipeline.tokens().ensure_valid(42).await;

    assert!(matches!(
        result,
        Err(LifecycleError::RefreshFailed(UpstreamError::Timeout))
    ));
    assert_eq!(app.store.get(42).await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn test_refresh_margin_treats_nearly_expired_token_as_stale() {
    let app = create_test_app_with(
        |config| config.token_refresh_margin = Duration::seconds(60),
        Arc::new(TemplateSummarizer),
    )
    .await;
    common::seed_credential(
        app.store.as_ref(),
        42,
        "expiring_access",
        "old_refresh",
        Utc::now() + Duration::seconds(30),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body(
            "fresh_access",
            "rotated_refresh",
            (Utc::now() + Duration::hours(6)).timestamp(),
        )))
        .expect(1)
        .mount(&app.strava)
        .await;

    let token = app.state.pipeline.tokens().ensure_valid(42).await.unwrap();
    assert_eq!(token, "fresh_access");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_relink_during_refresh_is_not_overwritten() {
    let app = create_test_app().await;
    seed_expired(app.store.as_ref(), 42).await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(refresh_body(
                    "refreshed_access",
                    "refreshed_refresh",
                    (Utc::now() + Duration::hours(6)).timestamp(),
                ))
                .set_delay(std::time::Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&app.strava)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(exchange_body(
            42,
            "Grace",
            "relinked_access",
        )))
        .expect(1)
        .mount(&app.strava)
        .await;

    let tokens = app.state.pipeline.tokens().clone();
    let refresh = tokio::spawn(async move { tokens.ensure_valid(42).await });

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let relinked = app.state.linker.link_account("relink_code").await.unwrap();
    assert_eq!(relinked.first_name, "Grace");

    assert!(refresh.await.unwrap().is_ok());

    let stored = app.store.get(42).await.unwrap().unwrap();
    assert_eq!(stored.first_name, "Grace");
    assert_eq!(stored.tokens.access_token, "relinked_access");
    assert_eq!(stored.tokens.refresh_token, "relinked_access_refresh");
    assert_eq!(
        app.state.pipeline.tokens().ensure_valid(42).await.unwrap(),
        "relinked_access"
    );
}
