// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Coaching pipeline: valid token, recent activities, feedback.

use super::activity::ActivityFetcher;
use super::strava::UpstreamError;
use super::summarizer::{SummarizeError, Summarizer};
use super::tokens::{LifecycleError, TokenLifecycleManager};
use crate::db::StoreError;
use crate::models::NormalizedActivity;
use std::sync::Arc;
use std::time::Duration;

/// Pipeline failure, one kind per stage.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("account {0} is not linked")]
    AccountNotLinked(u64),

    #[error("token refresh failed: {0}")]
    RefreshFailed(UpstreamError),

    #[error("activity fetch failed: {0}")]
    FetchFailed(UpstreamError),

    #[error("feedback generation failed: {0}")]
    SummarizeFailed(SummarizeError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<LifecycleError> for PipelineError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::AccountNotLinked(id) => PipelineError::AccountNotLinked(id),
            LifecycleError::RefreshFailed(e) => PipelineError::RefreshFailed(e),
            LifecycleError::Store(e) => PipelineError::Store(e),
        }
    }
}

/// Orchestrates token lifecycle, activity fetch and summarization.
#[derive(Clone)]
pub struct CoachingPipeline {
    tokens: TokenLifecycleManager,
    fetcher: ActivityFetcher,
    summarizer: Arc<dyn Summarizer>,
    activity_limit: u32,
    summarize_timeout: Duration,
}

impl CoachingPipeline {
    pub fn new(
        tokens: TokenLifecycleManager,
        fetcher: ActivityFetcher,
        summarizer: Arc<dyn Summarizer>,
        activity_limit: u32,
        summarize_timeout: Duration,
    ) -> Self {
        Self {
            tokens,
            fetcher,
            summarizer,
            activity_limit,
            summarize_timeout,
        }
    }

    pub fn tokens(&self) -> &TokenLifecycleManager {
        &self.tokens
    }

    /// Recent activities for a linked athlete, refreshing the token if needed.
    pub async fn get_activities(
        &self,
        account_id: u64,
    ) -> Result<Vec<NormalizedActivity>, PipelineError> {
        let access_token = self.tokens.ensure_valid(account_id).await?;
        self.fetcher
            .fetch(&access_token, self.activity_limit)
            .await
            .map_err(PipelineError::FetchFailed)
    }

    /// Coaching feedback for a linked athlete. The summarizer's text is
    /// returned unchanged.
    pub async fn get_feedback(&self, account_id: u64) -> Result<String, PipelineError> {
        let activities = self.get_activities(account_id).await?;

        match tokio::time::timeout(self.summarize_timeout, self.summarizer.summarize(&activities))
            .await
        {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(PipelineError::SummarizeFailed(e)),
            Err(_) => Err(PipelineError::SummarizeFailed(SummarizeError::Timeout)),
        }
    }
}
