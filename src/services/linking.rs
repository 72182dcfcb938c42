// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account linking from the OAuth callback.

use super::oauth::OAuthExchanger;
use super::strava::UpstreamError;
use super::tokens::TokenLifecycleManager;
use crate::db::StoreError;
use crate::models::{AccountCredential, CredentialUpsert};

/// Linking failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LinkError {
    #[error("missing authorization code")]
    MissingCode,

    #[error("authorization code exchange failed: {0}")]
    ExchangeFailed(UpstreamError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Exchanges an authorization code and stores the resulting credential.
#[derive(Clone)]
pub struct AccountLinker {
    exchanger: OAuthExchanger,
    tokens: TokenLifecycleManager,
}

impl AccountLinker {
    pub fn new(exchanger: OAuthExchanger, tokens: TokenLifecycleManager) -> Self {
        Self { exchanger, tokens }
    }

    /// Link (or re-link) the athlete who granted `code`.
    ///
    /// Re-linking an athlete replaces their names and tokens in place, after
    /// any refresh already writing that athlete.
    pub async fn link_account(&self, code: &str) -> Result<AccountCredential, LinkError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(LinkError::MissingCode);
        }

        let exchange = self
            .exchanger
            .exchange_code(code)
            .await
            .map_err(LinkError::ExchangeFailed)?;

        let credential = self
            .tokens
            .store_linked(CredentialUpsert {
                account_id: exchange.account_id,
                first_name: exchange.first_name,
                last_name: exchange.last_name,
                tokens: exchange.tokens,
            })
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to store linked credential"))?;

        tracing::info!(
            account_id = credential.account_id,
            firstname = %credential.first_name,
            "Account linked, credential stored"
        );
        Ok(credential)
    }
}
