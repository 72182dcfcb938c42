// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Normalized activity model returned by the API and fed to the summarizer.

use chrono::{DateTime, Utc};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A recent activity with display units. Built fresh per request, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct NormalizedActivity {
    /// Activity name/title
    pub name: String,
    /// Distance in kilometers, 2 decimal places
    pub distance_km: f64,
    /// Moving time in minutes, 1 decimal place
    pub moving_time_min: f64,
    /// Activity type (Ride, Run, Hike, etc.)
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Start date/time (UTC)
    pub start_date: DateTime<Utc>,
}

/// Convert meters to kilometers rounded to 2 decimal places.
pub fn meters_to_km(meters: f64) -> f64 {
    (meters / 10.0).round() / 100.0
}

/// Convert seconds to minutes rounded to 1 decimal place.
pub fn seconds_to_minutes(seconds: u64) -> f64 {
    (seconds as f64 / 6.0).round() / 10.0
}
