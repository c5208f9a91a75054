// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host/container driver interface.
//!
//! Wraps the container runtime and privileged host operations. Calls to
//! this driver are the only way the core mutates things it doesn't own.

use crate::monitor::ProcStatus;
use crate::pup::PupId;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Owner of pup storage directories and key files.
pub const CONTAINER_UID: u32 = 420;
pub const CONTAINER_GID: u32 = 69;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{command} failed with {status}: {stderr}")]
    CommandFailed { command: String, status: i32, stderr: String },
}

/// Privileged host operations, implemented over the container runtime.
#[async_trait]
pub trait HostDriver: Send + Sync {
    /// Start a service by its full unit name.
    async fn start_service(&self, service: &str) -> Result<(), DriverError>;

    /// Stop a service by its full unit name.
    async fn stop_service(&self, service: &str) -> Result<(), DriverError>;

    /// Current observed state of a service.
    async fn service_status(&self, service: &str) -> Result<ProcStatus, DriverError>;

    /// Human-readable status and recent journal lines, for job logs.
    async fn service_status_text(&self, service: &str) -> Result<String, DriverError>;

    /// Create a pup storage directory owned by the container UID/GID.
    async fn create_storage_dir(&self, path: &Path) -> Result<(), DriverError>;

    /// Recursively delete a directory the daemon itself cannot own.
    async fn remove_tree(&self, path: &Path) -> Result<(), DriverError>;

    /// Write private key material, mode 0600, owned by the container user.
    async fn write_key_file(&self, path: &Path, contents: &str) -> Result<(), DriverError>;

    /// Write a pup's config.env, mode 0600, owned by the container user.
    async fn write_config_env(&self, path: &Path, contents: &str) -> Result<(), DriverError>;

    /// Remove the container runtime's cached state directory for a pup, so
    /// the next rebuild treats its container as newly created.
    async fn remove_container_state(&self, pup_id: &PupId) -> Result<(), DriverError>;

    /// Bulk copy with owner and permission fixups on the destination.
    async fn copy_tree(&self, src: &Path, dest: &Path) -> Result<(), DriverError>;
}
