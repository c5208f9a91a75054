// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-file state store backing `<data_dir>/dogebox.db`.
//!
//! Backup/restore treats the file as an opaque blob; this implementation
//! keeps dogebox-wide configuration in it as JSON. Closing drops the
//! in-memory copy so a restore can replace the file wholesale.

use dbx_core::{DogeboxConfig, StateStore, StoreError};
use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct JsonStateStore {
    path: PathBuf,
    /// `None` while the store is closed.
    inner: Mutex<Option<DogeboxConfig>>,
}

impl JsonStateStore {
    /// Open (creating an empty store if the file is absent).
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        let store = Self {
            path: data_dir.join("dogebox.db"),
            inner: Mutex::new(None),
        };
        store.open_db()?;
        Ok(store)
    }

    fn read_file(&self) -> Result<DogeboxConfig, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Corrupt(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(DogeboxConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_file(&self, config: &DogeboxConfig) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json =
            serde_json::to_vec_pretty(config).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let tmp = self.path.with_extension("db.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StateStore for JsonStateStore {
    fn get(&self) -> Result<DogeboxConfig, StoreError> {
        self.inner.lock().clone().ok_or(StoreError::Closed)
    }

    fn set_dogebox(&self, config: &DogeboxConfig) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.is_none() {
            return Err(StoreError::Closed);
        }
        self.write_file(config)?;
        *inner = Some(config.clone());
        Ok(())
    }

    fn close_db(&self) -> Result<(), StoreError> {
        *self.inner.lock() = None;
        tracing::info!("state store closed");
        Ok(())
    }

    fn open_db(&self) -> Result<(), StoreError> {
        let config = self.read_file()?;
        *self.inner.lock() = Some(config);
        tracing::info!("state store open");
        Ok(())
    }
}

#[cfg(test)]
#[path = "statestore_tests.rs"]
mod tests;
