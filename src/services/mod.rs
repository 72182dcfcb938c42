// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod activity;
pub mod coaching;
pub mod linking;
pub mod oauth;
pub mod strava;
pub mod summarizer;
pub mod tokens;

pub use activity::ActivityFetcher;
pub use coaching::{CoachingPipeline, PipelineError};
pub use linking::{AccountLinker, LinkError};
pub use oauth::OAuthExchanger;
pub use strava::{StravaClient, UpstreamError};
pub use summarizer::{LlmSummarizer, SummarizeError, Summarizer, TemplateSummarizer};
pub use tokens::{LifecycleError, TokenLifecycleManager};
