// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process credential store.

use super::{CredentialStore, StoreError};
use crate::models::{AccountCredential, CredentialUpsert};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Credential store backed by a concurrent map. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    credentials: DashMap<u64, AccountCredential>,
    next_id: AtomicU64,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, account_id: u64) -> Result<Option<AccountCredential>, StoreError> {
        Ok(self.credentials.get(&account_id).map(|c| c.value().clone()))
    }

    async fn upsert(&self, update: CredentialUpsert) -> Result<AccountCredential, StoreError> {
        let now = chrono::Utc::now();
        // The entry guard holds the shard lock, so same-account upserts are serialized.
        let mut entry = self.credentials.entry(update.account_id).or_insert_with(|| {
            update.clone().into_credential(
                None,
                || self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
                now,
            )
        });
        let stored = update.into_credential(Some(entry.value()), || entry.id, now);
        *entry.value_mut() = stored.clone();
        Ok(stored)
    }

    async fn list_all(&self) -> Result<Vec<AccountCredential>, StoreError> {
        Ok(self.credentials.iter().map(|c| c.value().clone()).collect())
    }
}
