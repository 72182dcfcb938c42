// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Pacer Coach: Strava-linked training feedback
//!
//! This crate provides the backend API that links a Strava account via
//! OAuth, keeps its tokens fresh, and turns recent activities into
//! coaching feedback.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::CredentialStore;
use services::{
    AccountLinker, ActivityFetcher, CoachingPipeline, OAuthExchanger, StravaClient, Summarizer,
    TokenLifecycleManager, UpstreamError,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn CredentialStore>,
    pub oauth: OAuthExchanger,
    pub linker: AccountLinker,
    pub pipeline: CoachingPipeline,
}

impl AppState {
    /// Wire the services around an injected store and summarizer.
    pub fn new(
        config: Config,
        store: Arc<dyn CredentialStore>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Result<Self, UpstreamError> {
        let client = StravaClient::new(&config)?;
        let oauth = OAuthExchanger::new(
            client.clone(),
            config.strava_redirect_uri.clone(),
            config.strava_scope.clone(),
        );
        let tokens =
            TokenLifecycleManager::new(store.clone(), oauth.clone(), config.token_refresh_margin);
        let linker = AccountLinker::new(oauth.clone(), tokens.clone());
        let pipeline = CoachingPipeline::new(
            tokens,
            ActivityFetcher::new(client),
            summarizer,
            config.activity_limit,
            config.summarize_timeout,
        );

        Ok(Self {
            config,
            store,
            oauth,
            linker,
            pipeline,
        })
    }
}
