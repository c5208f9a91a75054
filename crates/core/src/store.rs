// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State store interface: durable dogebox-wide configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store is closed")]
    Closed,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt store: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryCache {
    pub url: String,
    pub key: String,
}

/// Dogebox-wide configuration persisted in `dogebox.db`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DogeboxConfig {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub ssh_enabled: bool,
    #[serde(default)]
    pub ssh_keys: Vec<String>,
    #[serde(default)]
    pub binary_caches: Vec<BinaryCache>,
    #[serde(default)]
    pub storage_device: String,
    #[serde(default)]
    pub tailscale_auth: String,
    #[serde(default)]
    pub has_generated_key: bool,
    #[serde(default)]
    pub has_completed_initial_config: bool,
}

/// Durable key/value-backed store for [`DogeboxConfig`].
///
/// Single-writer; closed and reopened around a restore so the backing file
/// can be replaced wholesale.
pub trait StateStore: Send + Sync {
    fn get(&self) -> Result<DogeboxConfig, StoreError>;
    fn set_dogebox(&self, config: &DogeboxConfig) -> Result<(), StoreError>;
    fn close_db(&self) -> Result<(), StoreError>;
    fn open_db(&self) -> Result<(), StoreError>;
}
