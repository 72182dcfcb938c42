// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pacer Coach API Server
//!
//! Links Strava accounts and serves coaching feedback on recent activities.

use anyhow::Context;
use pacer_coach::{
    config::Config,
    db::{CredentialStore, FirestoreCredentialStore, InMemoryCredentialStore},
    services::{LlmSummarizer, Summarizer, TemplateSummarizer},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(port = config.port, "Starting Pacer Coach API");

    // Credential store: Firestore when a project is configured
    let store: Arc<dyn CredentialStore> = match &config.gcp_project_id {
        Some(project_id) => Arc::new(
            FirestoreCredentialStore::new(project_id)
                .await
                .context("Failed to connect to Firestore")?,
        ),
        None => {
            tracing::warn!("GCP_PROJECT_ID not set, credentials are kept in memory only");
            Arc::new(InMemoryCredentialStore::new())
        }
    };

    // Feedback generation
    let summarizer: Arc<dyn Summarizer> = match &config.llm {
        Some(llm) => {
            tracing::info!(model = %llm.model, "Using LLM summarizer");
            Arc::new(
                LlmSummarizer::new(llm.clone(), config.summarize_timeout)
                    .context("Failed to initialize LLM summarizer")?,
            )
        }
        None => {
            tracing::info!("Using template summarizer");
            Arc::new(TemplateSummarizer)
        }
    };

    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN not set, /users is unauthenticated");
    }

    let state = Arc::new(
        AppState::new(config.clone(), store, summarizer)
            .context("Failed to initialize Strava client")?,
    );

    // Build router
    let app = pacer_coach::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pacer_coach=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
