// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rendering of a pup's `.dbx/config.env`.
//!
//! Sorted `KEY=VALUE` lines with shell-safe quoting, so the file can be
//! sourced by the container's entrypoint without interpretation surprises.

use std::collections::BTreeMap;

/// Render config values as sorted `KEY=VALUE` lines.
///
/// Values containing whitespace, quotes, backslashes, `$`, or backticks are
/// wrapped in double quotes with `\` and `"` escaped.
pub fn render_config_env(config: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in config {
        out.push_str(key);
        out.push('=');
        if needs_quoting(value) {
            out.push('"');
            for c in value.chars() {
                if c == '\\' || c == '"' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('"');
        } else {
            out.push_str(value);
        }
        out.push('\n');
    }
    out
}

fn needs_quoting(value: &str) -> bool {
    value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | '$' | '`'))
}

#[cfg(test)]
#[path = "configenv_tests.rs"]
mod tests;
