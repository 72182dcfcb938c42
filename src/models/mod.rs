// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod credential;

pub use activity::NormalizedActivity;
pub use credential::{AccountCredential, CredentialUpsert, TokenSet, TokenState};
