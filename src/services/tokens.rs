// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access-token lifecycle: staleness checks and single-flight refresh.
//!
//! Strava rotates the refresh token on every refresh, so two concurrent
//! refreshes for the same athlete would leave one of them holding a dead
//! token. At most one refresh per athlete is in flight at a time; every
//! other caller for that athlete awaits the same outcome.
//!
//! Every credential write (refresh or re-link) happens under a per-athlete
//! write lock, so a re-link is never overwritten by a refresh that read the
//! record before it.

use super::oauth::OAuthExchanger;
use super::strava::UpstreamError;
use crate::db::{CredentialStore, StoreError};
use crate::models::{AccountCredential, CredentialUpsert, TokenState};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

/// Token lifecycle failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LifecycleError {
    #[error("account {0} is not linked")]
    AccountNotLinked(u64),

    #[error("token refresh failed: {0}")]
    RefreshFailed(UpstreamError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of one refresh, awaitable by any number of callers.
type RefreshFlight = Shared<BoxFuture<'static, Result<String, LifecycleError>>>;

/// In-flight refreshes keyed by athlete ID.
pub type RefreshFlights = Arc<DashMap<u64, RefreshFlight>>;

/// Per-athlete write locks, held across read, exchange and write.
type WriteLocks = Arc<DashMap<u64, Arc<Mutex<()>>>>;

/// Removes the in-flight entry when the refresh task ends, even by panic.
struct FlightGuard {
    flights: RefreshFlights,
    account_id: u64,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flights.remove(&self.account_id);
    }
}

/// Hands out usable access tokens, refreshing them only when needed.
#[derive(Clone)]
pub struct TokenLifecycleManager {
    store: Arc<dyn CredentialStore>,
    exchanger: OAuthExchanger,
    /// Tokens are treated as expired this long before `expires_at`.
    margin: chrono::Duration,
    in_flight: RefreshFlights,
    write_locks: WriteLocks,
    /// When the last refresh attempt failed, per athlete.
    failures: Arc<DashMap<u64, DateTime<Utc>>>,
}

impl TokenLifecycleManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        exchanger: OAuthExchanger,
        margin: chrono::Duration,
    ) -> Self {
        Self {
            store,
            exchanger,
            margin,
            in_flight: Arc::new(DashMap::new()),
            write_locks: Arc::new(DashMap::new()),
            failures: Arc::new(DashMap::new()),
        }
    }

    /// Get an access token that is usable right now for `account_id`.
    ///
    /// 1. Unknown athlete: `AccountNotLinked`, no network call.
    /// 2. Stored token still valid: returned as is.
    /// 3. Otherwise join (or start) the athlete's single in-flight refresh.
    ///
    /// A failed refresh leaves the stored credential untouched and is not
    /// retried here; the next call tries again.
    pub async fn ensure_valid(&self, account_id: u64) -> Result<String, LifecycleError> {
        let credential = self
            .store
            .get(account_id)
            .await?
            .ok_or(LifecycleError::AccountNotLinked(account_id))?;

        if credential.tokens.is_valid_at(Utc::now(), self.margin) {
            return Ok(credential.tokens.access_token);
        }

        let flight = self.join_refresh(account_id);
        flight.await
    }

    /// Current lifecycle state of a linked athlete.
    pub async fn status(&self, account_id: u64) -> Result<TokenState, LifecycleError> {
        let credential = self
            .store
            .get(account_id)
            .await?
            .ok_or(LifecycleError::AccountNotLinked(account_id))?;
        Ok(self.state_of(&credential))
    }

    /// Lifecycle state derived from a credential already in hand.
    pub fn state_of(&self, credential: &AccountCredential) -> TokenState {
        if self.in_flight.contains_key(&credential.account_id) {
            return TokenState::Refreshing;
        }
        if credential.tokens.is_valid_at(Utc::now(), self.margin) {
            return TokenState::Valid;
        }
        match self.failures.get(&credential.account_id) {
            Some(failed_at) if *failed_at >= credential.updated_at => TokenState::Unavailable,
            _ => TokenState::Expired,
        }
    }

    /// Store a freshly linked credential, replacing the athlete's tokens.
    ///
    /// Waits for any refresh that is writing the same athlete, so the linked
    /// tokens are the ones left in the store.
    pub async fn store_linked(
        &self,
        update: CredentialUpsert,
    ) -> Result<AccountCredential, StoreError> {
        let account_id = update.account_id;
        let lock = self.write_lock(account_id);
        let _held = lock.lock().await;

        let stored = self.store.upsert(update).await?;
        self.failures.remove(&account_id);
        Ok(stored)
    }

    fn write_lock(&self, account_id: u64) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Return the athlete's in-flight refresh, starting one if there is none.
    fn join_refresh(&self, account_id: u64) -> RefreshFlight {
        let (tx, flight) = match self.in_flight.entry(account_id) {
            Entry::Occupied(existing) => return existing.get().clone(),
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                let flight = async move {
                    rx.await.unwrap_or_else(|_| {
                        Err(LifecycleError::RefreshFailed(UpstreamError::Transport(
                            "refresh task aborted".to_string(),
                        )))
                    })
                }
                .boxed()
                .shared();
                slot.insert(flight.clone());
                (tx, flight)
            }
        };

        // The refresh runs detached so a rotated refresh token is persisted
        // even if every waiting request goes away.
        let manager = self.clone();
        tokio::spawn(async move {
            let guard = FlightGuard {
                flights: manager.in_flight.clone(),
                account_id,
            };
            let outcome = manager.refresh(account_id).await;
            drop(guard);
            let _ = tx.send(outcome);
        });

        flight
    }

    async fn refresh(&self, account_id: u64) -> Result<String, LifecycleError> {
        let lock = self.write_lock(account_id);
        let _held = lock.lock().await;

        let credential = self
            .store
            .get(account_id)
            .await?
            .ok_or(LifecycleError::AccountNotLinked(account_id))?;

        // A refresh or re-link that finished just before this one already did the work.
        if credential.tokens.is_valid_at(Utc::now(), self.margin) {
            return Ok(credential.tokens.access_token);
        }

        tracing::info!(account_id, "Access token expired, refreshing");

        let tokens = match self.exchanger.refresh(&credential.tokens.refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(account_id, error = %e, "Token refresh failed");
                self.failures.insert(account_id, Utc::now());
                return Err(LifecycleError::RefreshFailed(e));
            }
        };

        let mut update = CredentialUpsert::from(&credential);
        update.tokens = tokens;
        let stored = self.store.upsert(update).await.inspect_err(|e| {
            tracing::error!(account_id, error = %e, "Failed to store refreshed token");
        })?;
        self.failures.remove(&account_id);

        tracing::info!(
            account_id,
            expires_at = %stored.tokens.expires_at,
            "Token refreshed and stored"
        );
        Ok(stored.tokens.access_token)
    }
}
