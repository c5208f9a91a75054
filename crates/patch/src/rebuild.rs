// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External rebuild driver.
//!
//! The rebuild tool is a process-level collaborator identified by a command
//! name plus an optional target-directory override. The core never parses
//! its output for semantics, only success/failure and captured stream text
//! for the job log.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

/// How the rebuilt configuration takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildMode {
    /// Activate immediately.
    Switch,
    /// Activate on next boot.
    Boot,
}

dbx_core::simple_display! {
    RebuildMode {
        Switch => "switch",
        Boot => "boot",
    }
}

#[derive(Debug, Error)]
pub enum RebuildError {
    #[error("failed to spawn {command}: {source}")]
    Spawn { command: String, source: std::io::Error },
    #[error("{command} {mode} exited with {status}: {stderr}")]
    Failed { command: String, mode: RebuildMode, status: i32, stderr: String },
    #[error("configuration failed validation: {stderr}")]
    Validation { stderr: String },
}

/// Captured output of a completed rebuild, for the job log.
#[derive(Debug, Clone, Default)]
pub struct RebuildOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Drives the host's declarative rebuild tool.
#[async_trait]
pub trait RebuildDriver: Send + Sync {
    /// Rebuild the host against `nix_dir`. Blocks for as long as the tool
    /// runs, possibly minutes.
    async fn rebuild(&self, mode: RebuildMode, nix_dir: &Path)
        -> Result<RebuildOutput, RebuildError>;

    /// Syntactic validation of a single host-local configuration file.
    async fn validate_file(&self, path: &Path) -> Result<(), RebuildError>;
}

/// Rebuild driver invoking a named command, e.g. `nixos-rebuild`.
pub struct CommandRebuildDriver {
    command: String,
    /// Extra arguments inserted before the mode, e.g. `-I dogebox=<dir>`.
    flake_override: Option<PathBuf>,
}

impl CommandRebuildDriver {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into(), flake_override: None }
    }

    /// Point the tool at a configuration root other than its default.
    pub fn with_target_override(mut self, dir: PathBuf) -> Self {
        self.flake_override = Some(dir);
        self
    }
}

#[async_trait]
impl RebuildDriver for CommandRebuildDriver {
    async fn rebuild(
        &self,
        mode: RebuildMode,
        nix_dir: &Path,
    ) -> Result<RebuildOutput, RebuildError> {
        let mut cmd = Command::new(&self.command);
        cmd.arg(mode.to_string());
        let target = self.flake_override.as_deref().unwrap_or(nix_dir);
        cmd.arg("-I").arg(format!("dogebox={}", target.display()));

        tracing::info!(command = %self.command, mode = %mode, "invoking rebuild");
        let output = cmd.output().await.map_err(|source| RebuildError::Spawn {
            command: self.command.clone(),
            source,
        })?;

        let report = RebuildOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if output.status.success() {
            Ok(report)
        } else {
            Err(RebuildError::Failed {
                command: self.command.clone(),
                mode,
                status: output.status.code().unwrap_or(-1),
                stderr: report.stderr,
            })
        }
    }

    async fn validate_file(&self, path: &Path) -> Result<(), RebuildError> {
        let output = Command::new("nix-instantiate")
            .arg("--parse")
            .arg(path)
            .output()
            .await
            .map_err(|source| RebuildError::Spawn {
                command: "nix-instantiate".to_string(),
                source,
            })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(RebuildError::Validation {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

/// Scripted rebuild driver for tests: records invocations and fails on
/// request.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FakeRebuildDriver {
    pub rebuilds: parking_lot::Mutex<Vec<RebuildMode>>,
    fail_next: parking_lot::Mutex<usize>,
    fail_on: parking_lot::Mutex<std::collections::HashSet<usize>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeRebuildDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` rebuild invocations.
    pub fn fail_next(&self, count: usize) {
        *self.fail_next.lock() = count;
    }

    /// Fail the `n`-th rebuild invocation (1-based) whenever it happens.
    pub fn fail_on(&self, n: usize) {
        self.fail_on.lock().insert(n);
    }

    pub fn rebuild_count(&self) -> usize {
        self.rebuilds.lock().len()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl RebuildDriver for FakeRebuildDriver {
    async fn rebuild(
        &self,
        mode: RebuildMode,
        _nix_dir: &Path,
    ) -> Result<RebuildOutput, RebuildError> {
        self.rebuilds.lock().push(mode);
        let count = self.rebuilds.lock().len();
        let scripted = self.fail_on.lock().contains(&count);
        let mut fail = self.fail_next.lock();
        if scripted || *fail > 0 {
            if !scripted {
                *fail -= 1;
            }
            return Err(RebuildError::Failed {
                command: "fake-rebuild".to_string(),
                mode,
                status: 1,
                stderr: "simulated rebuild failure".to_string(),
            });
        }
        Ok(RebuildOutput::default())
    }

    async fn validate_file(&self, _path: &Path) -> Result<(), RebuildError> {
        Ok(())
    }
}
