// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Feedback generation from recent activities.
//!
//! The coaching pipeline only sees the `Summarizer` trait. Two
//! implementations ship: a deterministic template and an OpenAI-compatible
//! chat completion client.

use crate::config::LlmConfig;
use crate::models::NormalizedActivity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Feedback generation failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SummarizeError {
    #[error("summarizer timed out")]
    Timeout,

    #[error("summarizer request failed: {0}")]
    Request(String),

    #[error("summarizer returned no text")]
    Empty,
}

/// Turns a list of activities into coaching feedback text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, activities: &[NormalizedActivity]) -> Result<String, SummarizeError>;
}

/// Fixed-format encouragement built from activity totals.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSummarizer;

#[async_trait]
impl Summarizer for TemplateSummarizer {
    async fn summarize(&self, activities: &[NormalizedActivity]) -> Result<String, SummarizeError> {
        let Some(latest) = activities.first() else {
            return Ok("No recent activities yet. Get out there and log your first session, \
                       and I'll have feedback for you next time!"
                .to_string());
        };

        let total_km: f64 = activities.iter().map(|a| a.distance_km).sum();
        let total_min: f64 = activities.iter().map(|a| a.moving_time_min).sum();
        let sessions = if activities.len() == 1 {
            "activity"
        } else {
            "activities"
        };

        Ok(format!(
            "Great work! Across your last {} {} you covered {:.2} km in {:.1} minutes. \
             Your most recent was \"{}\" ({}, {:.2} km). \
             You're staying consistent. Keep up the strong training!",
            activities.len(),
            sessions,
            total_km,
            total_min,
            latest.name,
            latest.activity_type,
            latest.distance_km,
        ))
    }
}

const SYSTEM_PROMPT: &str = "You are an encouraging endurance coach. Given an athlete's \
    most recent activities, reply with two or three sentences of specific, positive \
    feedback and one concrete suggestion for the next session.";

/// OpenAI-compatible API request structure
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// OpenAI-compatible API response structure
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Feedback from a chat completion model.
#[derive(Clone)]
pub struct LlmSummarizer {
    http: reqwest::Client,
    config: LlmConfig,
}

impl LlmSummarizer {
    pub fn new(config: LlmConfig, timeout: Duration) -> Result<Self, SummarizeError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SummarizeError::Request(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn prompt(activities: &[NormalizedActivity]) -> String {
        if activities.is_empty() {
            return "The athlete has no recent activities.".to_string();
        }
        let lines: Vec<String> = activities
            .iter()
            .map(|a| {
                format!(
                    "- {}: {} ({}), {:.2} km in {:.1} min",
                    a.start_date.format("%Y-%m-%d"),
                    a.name,
                    a.activity_type,
                    a.distance_km,
                    a.moving_time_min
                )
            })
            .collect();
        format!("Recent activities, newest first:\n{}", lines.join("\n"))
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, activities: &[NormalizedActivity]) -> Result<String, SummarizeError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::prompt(activities),
                },
            ],
            temperature: 0.7,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SummarizeError::Timeout
                } else {
                    SummarizeError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "LLM request failed");
            return Err(SummarizeError::Request(format!("HTTP {}", status)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SummarizeError::Request(format!("JSON parse error: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(SummarizeError::Empty)
    }
}
