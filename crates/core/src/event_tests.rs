// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::pup::PupState;

#[test]
fn pupdate_kind_names() {
    assert_eq!(PupdateKind::ChangedInstallation.to_string(), "changed_installation");
    assert_eq!(PupdateKind::Adopted.to_string(), "adopted");
    assert_eq!(PupdateKind::Purged.to_string(), "purged");
}

#[test]
fn change_event_serde_tag() {
    let state = PupState::builder().build();
    let event = ChangeEvent::Pup(Pupdate {
        id: state.id,
        event: PupdateKind::Adopted,
        state,
    });
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "pup");
    assert_eq!(json["payload"]["event"], "adopted");
}

#[test]
fn job_log_entry_round_trip() {
    let entry = JobLogEntry {
        kind: JobLogKind::Progress,
        text: "downloading 40%".to_string(),
        step: Some("download".to_string()),
        at: Utc::now(),
    };
    let json = serde_json::to_string(&entry).unwrap();
    let parsed: JobLogEntry = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, entry);
}

#[test]
fn stats_event_serializes_payload_array() {
    let event = ChangeEvent::Stats(Vec::new());
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "stats");
    assert!(json["payload"].as_array().unwrap().is_empty());
}
