// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

#[test]
fn first_allocation_is_dot_two() {
    let mut alloc = IpAllocator::new();
    let ip = alloc.next(&HashSet::new()).unwrap();
    assert_eq!(ip, Ipv4Addr::new(10, 69, 0, 2));
}

#[test]
fn allocations_are_monotonic() {
    let mut alloc = IpAllocator::new();
    let used = HashSet::new();
    let a = alloc.next(&used).unwrap();
    let b = alloc.next(&used).unwrap();
    let c = alloc.next(&used).unwrap();
    assert!(u32::from(a) < u32::from(b));
    assert!(u32::from(b) < u32::from(c));
}

#[test]
fn used_addresses_are_skipped() {
    let mut alloc = IpAllocator::new();
    let mut used = HashSet::new();
    used.insert(Ipv4Addr::new(10, 69, 0, 2));
    used.insert(Ipv4Addr::new(10, 69, 0, 3));
    assert_eq!(alloc.next(&used).unwrap(), Ipv4Addr::new(10, 69, 0, 4));
}

#[test]
fn octet_rollover() {
    let mut alloc = IpAllocator::from_assigned([Ipv4Addr::new(10, 69, 0, 255)]);
    assert_eq!(alloc.next(&HashSet::new()).unwrap(), Ipv4Addr::new(10, 69, 1, 0));
}

#[test]
fn high_water_mark_resumes_from_max() {
    let alloc = IpAllocator::from_assigned([
        Ipv4Addr::new(10, 69, 0, 7),
        Ipv4Addr::new(10, 69, 0, 3),
        Ipv4Addr::new(10, 69, 0, 5),
    ]);
    assert_eq!(alloc.last(), Ipv4Addr::new(10, 69, 0, 7));
}

#[test]
fn from_assigned_ignores_foreign_subnets() {
    let alloc = IpAllocator::from_assigned([Ipv4Addr::new(192, 168, 1, 9)]);
    assert_eq!(alloc.last(), HOST_ADDR);
}

#[test]
fn from_assigned_empty_starts_fresh() {
    let mut alloc = IpAllocator::from_assigned([]);
    assert_eq!(alloc.next(&HashSet::new()).unwrap(), Ipv4Addr::new(10, 69, 0, 2));
}

proptest! {
    /// Reserved addresses are never handed out and every allocation is
    /// unique, regardless of what is already in use.
    #[test]
    fn never_allocates_reserved_or_duplicates(seed_count in 0usize..64) {
        let mut alloc = IpAllocator::new();
        let mut used: HashSet<Ipv4Addr> = HashSet::new();
        for _ in 0..seed_count {
            let ip = alloc.next(&used).unwrap();
            prop_assert!(in_pup_subnet(ip));
            prop_assert_ne!(ip, NETWORK_ADDR);
            prop_assert_ne!(ip, HOST_ADDR);
            prop_assert!(used.insert(ip));
        }
    }
}
