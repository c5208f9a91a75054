// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process monitor interface: per-service CPU/RSS/active-state samples.
//!
//! The monitor publishes two streams of [`ServiceSample`] batches — a
//! steady-state stream on a fixed tick and a fast-poll stream used during
//! state transitions. Both are consumed by the pup manager's ingestion loop.

use crate::pup::PupId;
use serde::{Deserialize, Serialize};

/// Observed systemd-level state of one service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcStatus {
    pub running: bool,
    /// Raw unit active state, e.g. `active`, `activating`, `deactivating`.
    pub active_state: String,
}

/// One sample for one monitored service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSample {
    /// Fully-qualified service name, `container@pup-<id>.service`.
    pub service: String,
    pub status: ProcStatus,
    pub cpu_percent: f32,
    pub mem_mb: f32,
    pub mem_percent: f32,
    pub disk_mb: f32,
}

/// External process monitor. The manager tells it which services to watch;
/// samples arrive on the channels wired at daemon startup.
pub trait ProcessMonitor: Send + Sync {
    fn set_monitored(&self, services: Vec<String>);
}

/// Container service name for a pup: `container@pup-<id>.service`.
pub fn pup_service_name(id: &PupId) -> String {
    format!("container@pup-{id}.service")
}

/// Parse the owning pup out of a stats key produced by the monitor.
pub fn pup_id_from_service(service: &str) -> Option<PupId> {
    let inner = service.strip_prefix("container@pup-")?.strip_suffix(".service")?;
    if inner.is_empty() {
        return None;
    }
    Some(PupId::from_string(inner))
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
