// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn stat_buffer_keeps_most_recent() {
    let mut buf = StatBuffer::new();
    for i in 0..(STAT_BUFFER_LEN + 5) {
        buf.push(i as f32);
    }
    assert_eq!(buf.values().len(), STAT_BUFFER_LEN);
    assert_eq!(buf.values()[0], 5.0);
    assert_eq!(buf.latest(), Some((STAT_BUFFER_LEN + 4) as f32));
}

#[test]
fn stat_buffer_serializes_as_array() {
    let mut buf = StatBuffer::new();
    buf.push(1.5);
    buf.push(2.5);
    assert_eq!(serde_json::to_string(&buf).unwrap(), "[1.5,2.5]");
}

#[parameterized(
    activating_enabled = { true, "activating", true, PupStatus::Starting },
    activating_disabled = { false, "activating", false, PupStatus::Stopping },
    deactivating_enabled = { true, "deactivating", true, PupStatus::Stopping },
    deactivating_disabled = { false, "deactivating", false, PupStatus::Stopping },
    active_enabled = { true, "active", true, PupStatus::Running },
    active_disabled = { true, "active", false, PupStatus::Stopping },
    other_running_enabled = { true, "failed", true, PupStatus::Running },
    other_running_disabled = { true, "failed", false, PupStatus::Stopping },
    other_stopped_enabled = { false, "inactive", true, PupStatus::Starting },
    other_stopped_disabled = { false, "inactive", false, PupStatus::Stopped },
)]
fn status_derivation_table(running: bool, active_state: &str, enabled: bool, expected: PupStatus) {
    let proc = ProcStatus { running, active_state: active_state.to_string() };
    assert_eq!(derive_status(&proc, enabled), expected);
}

#[test]
fn new_stats_start_stopped_and_empty() {
    let stats = PupStats::new(PupId::from_string("p1"));
    assert_eq!(stats.status, PupStatus::Stopped);
    assert!(stats.cpu_percent.is_empty());
    assert!(stats.issues.deps_not_running.is_empty());
    assert!(!stats.issues.upgrade_available);
}
