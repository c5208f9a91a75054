// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dbx_core::JobId;

fn logger(tmp: &tempfile::TempDir) -> (JobLogger, mpsc::Receiver<ChangeEvent>) {
    let (tx, rx) = mpsc::channel(16);
    (JobLogger::new(tmp.path(), JobId::from_string("job-test"), tx), rx)
}

#[test]
fn lines_are_archived_with_step_context() {
    let tmp = tempfile::tempdir().unwrap();
    let (log, _rx) = logger(&tmp);

    log.log("starting");
    log.step("download");
    log.cmd("git fetch");
    log.err("boom");

    let contents = fs::read_to_string(log.log_path()).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].contains("log: starting"));
    assert!(!lines[0].contains('['));
    assert!(lines[1].contains("[download] log: === download"));
    assert!(lines[2].contains("[download] cmd: git fetch"));
    assert!(lines[3].contains("[download] err: boom"));
}

#[test]
fn lines_stream_to_the_bus() {
    let tmp = tempfile::tempdir().unwrap();
    let (log, mut rx) = logger(&tmp);
    log.progress("50%");

    match rx.try_recv().unwrap() {
        ChangeEvent::JobLog { job_id, entry } => {
            assert_eq!(job_id, JobId::from_string("job-test"));
            assert_eq!(entry.kind, JobLogKind::Progress);
            assert_eq!(entry.text, "50%");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn full_bus_does_not_block_logging() {
    let tmp = tempfile::tempdir().unwrap();
    let (tx, _rx) = mpsc::channel(1);
    let log = JobLogger::new(tmp.path(), JobId::from_string("job-full"), tx);
    for i in 0..10 {
        log.log(&format!("line {i}"));
    }
    let contents = fs::read_to_string(log.log_path()).unwrap();
    assert_eq!(contents.lines().count(), 10);
}

#[test]
fn closed_bus_does_not_block_logging() {
    let tmp = tempfile::tempdir().unwrap();
    let (log, rx) = logger(&tmp);
    drop(rx);
    log.log("still fine");
    assert!(log.log_path().is_file());
}
