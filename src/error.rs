// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::db::StoreError;
use crate::services::{LinkError, PipelineError, UpstreamError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// Strava failure; 4xx rejections are the client's problem, anything else is ours.
    #[error("{context}: {source}")]
    Upstream {
        context: &'static str,
        source: UpstreamError,
    },

    #[error("Feedback generation failed: {0}")]
    Summarizer(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", self.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Upstream { context, source } if source.is_rejection() => {
                tracing::warn!(error = %self, "Strava rejected request");
                (
                    StatusCode::BAD_REQUEST,
                    "strava_rejected",
                    context.to_string(),
                )
            }
            AppError::Upstream { context, .. } => {
                tracing::error!(error = %self, "Strava request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "strava_error",
                    context.to_string(),
                )
            }
            AppError::Summarizer(msg) => {
                tracing::error!(error = %msg, "Summarizer error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "summarizer_error",
                    "Feedback generation failed".to_string(),
                )
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "Database error".to_string(),
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            code,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::AccountNotLinked(_) => AppError::NotFound("User not found".to_string()),
            PipelineError::RefreshFailed(source) => AppError::Upstream {
                context: "Token refresh failed",
                source,
            },
            PipelineError::FetchFailed(source) => AppError::Upstream {
                context: "Activity fetch failed",
                source,
            },
            PipelineError::SummarizeFailed(e) => AppError::Summarizer(e.to_string()),
            PipelineError::Store(e) => e.into(),
        }
    }
}

impl From<LinkError> for AppError {
    fn from(e: LinkError) -> Self {
        match e {
            LinkError::MissingCode => AppError::BadRequest("Missing code".to_string()),
            // The callback reports every exchange failure as a bad request.
            LinkError::ExchangeFailed(source) => {
                tracing::warn!(error = %source, "Authorization code exchange failed");
                AppError::BadRequest("Authorization failed".to_string())
            }
            LinkError::Store(e) => e.into(),
        }
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_pipeline_error_status_mapping() {
        assert_eq!(
            status_of(PipelineError::AccountNotLinked(42).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(
                PipelineError::RefreshFailed(UpstreamError::Status {
                    status: 400,
                    body: "invalid_grant".to_string(),
                })
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(PipelineError::FetchFailed(UpstreamError::Timeout).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(PipelineError::Store(StoreError::Offline).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_upstream_body_is_not_sent_to_client() {
        let rejected = AppError::from(PipelineError::FetchFailed(UpstreamError::Status {
            status: 401,
            body: r#"{"message":"Authorization Error","secret":"raw"}"#.to_string(),
        }));
        let response = rejected.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Activity fetch failed");
        assert_eq!(body["code"], "strava_rejected");
        assert!(!body.to_string().contains("raw"));
    }

    #[test]
    fn test_link_error_status_mapping() {
        assert_eq!(
            status_of(LinkError::MissingCode.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(
                LinkError::ExchangeFailed(UpstreamError::Status {
                    status: 500,
                    body: String::new(),
                })
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
    }
}
