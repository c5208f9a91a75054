// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transient per-pup runtime statistics.

use crate::monitor::ProcStatus;
use crate::pup::PupId;
use serde::{Deserialize, Serialize};

/// Number of samples retained per metric.
pub const STAT_BUFFER_LEN: usize = 30;

/// Observed run state of a pup's container service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PupStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
}

crate::simple_display! {
    PupStatus {
        Stopped => "stopped",
        Starting => "starting",
        Running => "running",
        Stopping => "stopping",
    }
}

/// Fixed-capacity rolling buffer of metric samples, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatBuffer {
    values: Vec<f32>,
}

impl StatBuffer {
    pub fn new() -> Self {
        Self { values: Vec::with_capacity(STAT_BUFFER_LEN) }
    }

    pub fn push(&mut self, value: f32) {
        if self.values.len() == STAT_BUFFER_LEN {
            self.values.remove(0);
        }
        self.values.push(value);
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn latest(&self) -> Option<f32> {
        self.values.last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for StatBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Conditions surfaced to the UI alongside raw metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PupIssues {
    #[serde(default)]
    pub deps_not_running: Vec<String>,
    #[serde(default)]
    pub health_warnings: Vec<String>,
    #[serde(default)]
    pub upgrade_available: bool,
}

/// Live statistics for one pup. Created with its state, destroyed on purge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PupStats {
    pub id: PupId,
    pub status: PupStatus,
    #[serde(default)]
    pub cpu_percent: StatBuffer,
    #[serde(default)]
    pub mem_mb: StatBuffer,
    #[serde(default)]
    pub mem_percent: StatBuffer,
    #[serde(default)]
    pub disk_mb: StatBuffer,
    #[serde(default)]
    pub issues: PupIssues,
}

impl PupStats {
    pub fn new(id: PupId) -> Self {
        Self {
            id,
            status: PupStatus::Stopped,
            cpu_percent: StatBuffer::new(),
            mem_mb: StatBuffer::new(),
            mem_percent: StatBuffer::new(),
            disk_mb: StatBuffer::new(),
            issues: PupIssues::default(),
        }
    }
}

/// Derive the displayed status from the service's observed state and the
/// pup's desired running bit.
pub fn derive_status(proc: &ProcStatus, enabled: bool) -> PupStatus {
    match proc.active_state.as_str() {
        "activating" => {
            if enabled {
                PupStatus::Starting
            } else {
                PupStatus::Stopping
            }
        }
        "deactivating" => PupStatus::Stopping,
        "active" => {
            if enabled {
                PupStatus::Running
            } else {
                PupStatus::Stopping
            }
        }
        _ => match (proc.running, enabled) {
            (true, true) => PupStatus::Running,
            (true, false) => PupStatus::Stopping,
            (false, true) => PupStatus::Starting,
            (false, false) => PupStatus::Stopped,
        },
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
