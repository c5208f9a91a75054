// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delegated key manager interface.

use crate::pup::PupId;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DkmError {
    #[error("key manager unavailable: {0}")]
    Unavailable(String),
    #[error("delegate creation rejected: {0}")]
    Rejected(String),
}

/// Per-pup key material issued by the external key manager.
#[derive(Debug, Clone)]
pub struct DelegateKeys {
    /// Extended private key, written to `delegated.extended.key`.
    pub extended_priv: String,
    /// WIF-encoded private key, written to `delegated.key`.
    pub wif: String,
}

/// External key manager issuing per-pup delegated keys.
#[async_trait]
pub trait DelegatedKeyManager: Send + Sync {
    async fn make_delegate(
        &self,
        pup_id: &PupId,
        session_token: &str,
    ) -> Result<DelegateKeys, DkmError>;
}
