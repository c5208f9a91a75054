// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_advances() {
    let clock = SystemClock;
    let a = clock.now_utc();
    let b = clock.now_utc();
    assert!(b >= a);
}

#[test]
fn fake_clock_is_controllable() {
    let clock = FakeClock::new();
    let start = clock.now_utc();
    clock.advance(Duration::seconds(90));
    assert_eq!(clock.now_utc() - start, Duration::seconds(90));
}

#[test]
fn fake_clock_set() {
    let clock = FakeClock::new();
    let when = Utc.timestamp_opt(1_800_000_000, 0).single().unwrap();
    clock.set(when);
    assert_eq!(clock.now_utc(), when);
}
