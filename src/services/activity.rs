// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Recent-activity retrieval and normalization.

use super::strava::{StravaActivitySummary, StravaClient, UpstreamError};
use crate::models::activity::{meters_to_km, seconds_to_minutes};
use crate::models::NormalizedActivity;

/// Fetches one page of recent activities and converts them to display units.
#[derive(Clone)]
pub struct ActivityFetcher {
    client: StravaClient,
}

impl ActivityFetcher {
    pub fn new(client: StravaClient) -> Self {
        Self { client }
    }

    /// Fetch the `limit` most recent activities, in the order Strava returns them.
    ///
    /// Any upstream failure fails the whole fetch; partial pages are never returned.
    pub async fn fetch(
        &self,
        access_token: &str,
        limit: u32,
    ) -> Result<Vec<NormalizedActivity>, UpstreamError> {
        let raw = self
            .client
            .list_recent_activities(access_token, limit)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Strava activity fetch failed"))?;

        tracing::debug!(count = raw.len(), "Fetched recent activities");
        Ok(normalize_activities(raw))
    }
}

/// Convert raw Strava summaries into normalized activities.
pub fn normalize_activities(raw: Vec<StravaActivitySummary>) -> Vec<NormalizedActivity> {
    raw.into_iter().map(normalize).collect()
}

fn normalize(raw: StravaActivitySummary) -> NormalizedActivity {
    NormalizedActivity {
        name: raw.name,
        distance_km: meters_to_km(raw.distance),
        moving_time_min: seconds_to_minutes(raw.moving_time),
        activity_type: raw.activity_type,
        start_date: raw.start_date,
    }
}
