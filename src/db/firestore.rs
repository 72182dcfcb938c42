// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed credential store.
//!
//! One document per linked account in the `credentials` collection, keyed by
//! the Strava athlete ID. Record ids come from a counter document that is
//! updated in the same transaction as the first insert.

use super::{collections, CredentialStore, StoreError};
use crate::models::{AccountCredential, CredentialUpsert};
use async_trait::async_trait;
use firestore::FirestoreConsistencySelector;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Counter document holding the last assigned credential id.
const CREDENTIAL_ID_COUNTER: &str = "credential_ids";

/// Commits attempted before a contended upsert gives up.
const MAX_COMMIT_ATTEMPTS: u64 = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IdCounter {
    last_id: u64,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreCredentialStore {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreCredentialStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Backend(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client for testing.
    ///
    /// All database operations will return `StoreError::Offline`.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, StoreError> {
        self.client.as_ref().ok_or(StoreError::Offline)
    }

    /// Stage the upsert for `update` in `transaction`, reading through `tx_db`
    /// so both documents take part in the commit's conflict check.
    async fn stage_upsert(
        client: &firestore::FirestoreDb,
        tx_db: &firestore::FirestoreDb,
        update: CredentialUpsert,
        transaction: &mut firestore::FirestoreTransaction<'_>,
    ) -> Result<AccountCredential, StoreError> {
        let account_id = update.account_id;
        let existing = read_credential(tx_db, account_id).await?;

        let mut allocated: Option<IdCounter> = None;
        if existing.is_none() {
            let mut counter = read_counter(tx_db).await?.unwrap_or_default();
            counter.last_id += 1;
            allocated = Some(counter);
        }

        let next_id = allocated.as_ref().map(|c| c.last_id).unwrap_or_default();
        let stored = update.into_credential(existing.as_ref(), || next_id, chrono::Utc::now());

        if let Some(counter) = &allocated {
            client
                .fluent()
                .update()
                .in_col(collections::COUNTERS)
                .document_id(CREDENTIAL_ID_COUNTER)
                .object(counter)
                .add_to_transaction(transaction)
                .map_err(|e| {
                    StoreError::Backend(format!("Failed to add counter to transaction: {}", e))
                })?;
        }

        client
            .fluent()
            .update()
            .in_col(collections::CREDENTIALS)
            .document_id(account_id.to_string())
            .object(&stored)
            .add_to_transaction(transaction)
            .map_err(|e| {
                StoreError::Backend(format!("Failed to add credential to transaction: {}", e))
            })?;

        Ok(stored)
    }
}

async fn read_credential(
    db: &firestore::FirestoreDb,
    account_id: u64,
) -> Result<Option<AccountCredential>, StoreError> {
    db.fluent()
        .select()
        .by_id_in(collections::CREDENTIALS)
        .obj()
        .one(&account_id.to_string())
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))
}

async fn read_counter(db: &firestore::FirestoreDb) -> Result<Option<IdCounter>, StoreError> {
    db.fluent()
        .select()
        .by_id_in(collections::COUNTERS)
        .obj()
        .one(CREDENTIAL_ID_COUNTER)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))
}

#[async_trait]
impl CredentialStore for FirestoreCredentialStore {
    async fn get(&self, account_id: u64) -> Result<Option<AccountCredential>, StoreError> {
        read_credential(self.get_client()?, account_id).await
    }

    /// Upsert inside a transaction so the token triple, the preserved id and
    /// the id counter are committed together. Both documents are read in the
    /// transaction; a commit that loses a race is retried from the reads.
    async fn upsert(&self, update: CredentialUpsert) -> Result<AccountCredential, StoreError> {
        let account_id = update.account_id;
        let client = self.get_client()?;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| StoreError::Backend(format!("Failed to begin transaction: {}", e)))?;
            let tx_db = client.clone_with_consistency_selector(
                FirestoreConsistencySelector::Transaction(transaction.transaction_id().clone()),
            );

            let stored =
                match Self::stage_upsert(client, &tx_db, update.clone(), &mut transaction).await {
                    Ok(stored) => stored,
                    Err(e) => {
                        let _ = transaction.rollback().await;
                        return Err(e);
                    }
                };

            match transaction.commit().await {
                Ok(_) => {
                    tracing::debug!(account_id, id = stored.id, attempt, "Credential stored");
                    return Ok(stored);
                }
                Err(e) if attempt < MAX_COMMIT_ATTEMPTS => {
                    tracing::warn!(
                        account_id,
                        attempt,
                        error = %e,
                        "Credential commit failed, retrying"
                    );
                    let jitter = account_id % 25;
                    tokio::time::sleep(Duration::from_millis(50 * attempt + jitter)).await;
                }
                Err(e) => {
                    return Err(StoreError::Backend(format!(
                        "Transaction commit failed: {}",
                        e
                    )))
                }
            }
        }
    }

    async fn list_all(&self) -> Result<Vec<AccountCredential>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::CREDENTIALS)
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}
