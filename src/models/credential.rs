// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Linked-account credential model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The token triple that is always written together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Bearer credential for API calls
    pub access_token: String,
    /// Credential used to mint the next access token (rotates on refresh)
    pub refresh_token: String,
    /// The access token is usable strictly before this instant
    pub expires_at: DateTime<Utc>,
}

impl TokenSet {
    /// Whether the access token can still be used at `now`, treating it as
    /// expired `margin` early.
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        now + margin < self.expires_at
    }
}

/// Stored credential for one linked Strava account (one per `account_id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountCredential {
    /// Store-assigned record id, stable across re-links
    pub id: u64,
    /// Strava athlete ID (also used as document ID)
    pub account_id: u64,
    pub first_name: String,
    pub last_name: String,
    pub tokens: TokenSet,
    /// When the account was first linked
    pub created_at: DateTime<Utc>,
    /// Last link or refresh
    pub updated_at: DateTime<Utc>,
}

/// Everything a link or refresh writes for one account.
///
/// `id` and `created_at` are owned by the store and survive every upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialUpsert {
    pub account_id: u64,
    pub first_name: String,
    pub last_name: String,
    pub tokens: TokenSet,
}

impl CredentialUpsert {
    /// Build the record that replaces `existing` (or the first record, with `id`).
    pub fn into_credential(
        self,
        existing: Option<&AccountCredential>,
        new_id: impl FnOnce() -> u64,
        now: DateTime<Utc>,
    ) -> AccountCredential {
        let (id, created_at) = match existing {
            Some(current) => (current.id, current.created_at),
            None => (new_id(), now),
        };
        AccountCredential {
            id,
            account_id: self.account_id,
            first_name: self.first_name,
            last_name: self.last_name,
            tokens: self.tokens,
            created_at,
            updated_at: now,
        }
    }
}

impl From<&AccountCredential> for CredentialUpsert {
    fn from(credential: &AccountCredential) -> Self {
        Self {
            account_id: credential.account_id,
            first_name: credential.first_name.clone(),
            last_name: credential.last_name.clone(),
            tokens: credential.tokens.clone(),
        }
    }
}

/// Token lifecycle state of one account, as seen by the lifecycle manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Valid,
    Expired,
    Refreshing,
    Unavailable,
}
