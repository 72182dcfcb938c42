// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential storage.
//!
//! `CredentialStore` is the only shared mutable state in the service. Two
//! backends implement it: Firestore for deployments and an in-process map
//! for local development and tests.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreCredentialStore;
pub use memory::InMemoryCredentialStore;

use crate::models::{AccountCredential, CredentialUpsert};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    /// One document per linked account, keyed by account id
    pub const CREDENTIALS: &str = "credentials";
    /// Counter documents for store-assigned ids
    pub const COUNTERS: &str = "counters";
}

/// Storage backend failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Database not connected (offline mode)")]
    Offline,

    #[error("Database error: {0}")]
    Backend(String),
}

/// Persistent mapping from account id to credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up the credential for an account.
    async fn get(&self, account_id: u64) -> Result<Option<AccountCredential>, StoreError>;

    /// Insert or replace the credential for `update.account_id` and return the
    /// stored record.
    ///
    /// Concurrent upserts for the same account are applied one at a time; the
    /// token triple is never written partially.
    async fn upsert(&self, update: CredentialUpsert) -> Result<AccountCredential, StoreError>;

    /// All stored credentials, in no particular order.
    async fn list_all(&self) -> Result<Vec<AccountCredential>, StoreError>;
}
