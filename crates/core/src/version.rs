// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lenient semver parsing for upstream version strings.
//!
//! Source listings carry whatever tag shapes upstreams publish: `v1.0.0`,
//! `1.1.0-rc1`, `1.2.0.beta`, bare `2.1`. Parsing tries progressively
//! sloppier readings before giving up.

use semver::Version;
use std::cmp::Ordering;

/// Parse a version string leniently.
///
/// Tries, in order: strict semver; the same with a leading `v`/`V`
/// stripped; the pre-hyphen prefix; the longest leading run of digits and
/// dots. Short forms are padded to three components (`2.1` → `2.1.0`).
pub fn parse_lenient(s: &str) -> Option<Version> {
    let s = s.trim();
    if let Ok(v) = Version::parse(s) {
        return Some(v);
    }

    let stripped = s.strip_prefix(['v', 'V']).unwrap_or(s);
    if let Ok(v) = Version::parse(stripped) {
        return Some(v);
    }

    if let Some(prefix) = stripped.split('-').next() {
        if let Some(v) = parse_padded(prefix) {
            return Some(v);
        }
    }

    let numeric: String = stripped
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    parse_padded(numeric.trim_matches('.'))
}

/// Parse `prefix`, padding missing components with zeroes.
fn parse_padded(prefix: &str) -> Option<Version> {
    if prefix.is_empty() {
        return None;
    }
    let parts: Vec<&str> = prefix.split('.').collect();
    if parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    // Components past the third are dropped: "1.2.3.4" reads as 1.2.3.
    let component = |i: usize| parts.get(i).and_then(|p| p.parse::<u64>().ok()).unwrap_or(0);
    Some(Version::new(component(0), component(1), component(2)))
}

/// Compare two version strings under lenient parsing, falling back to a
/// plain string compare when either side fails to parse.
pub fn compare_lenient(a: &str, b: &str) -> Ordering {
    match (parse_lenient(a), parse_lenient(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        _ => a.cmp(b),
    }
}

/// True when `candidate` is strictly newer than `current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare_lenient(candidate, current) == Ordering::Greater
}

#[cfg(test)]
#[path = "version_tests.rs"]
mod tests;
