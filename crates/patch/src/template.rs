// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Textual template substitution for generated nix files.
//!
//! Placeholders look like `{{key}}`. A placeholder left unreplaced is a
//! programmer error in the op builder, never user input.

/// Substitute `{{key}}` placeholders. Returns an error naming the first
/// unresolved placeholder.
pub(crate) fn render(template: &str, values: &[(&str, String)]) -> Result<String, String> {
    let mut out = template.to_string();
    for (key, value) in values {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    if let Some(start) = out.find("{{") {
        let end = out[start..].find("}}").map(|e| start + e + 2).unwrap_or(out.len());
        return Err(out[start..end].to_string());
    }
    Ok(out)
}

/// Quote a string for inclusion in a nix expression.
pub(crate) fn nix_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '$' => quoted.push_str("\\$"),
            '\n' => quoted.push_str("\\n"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Render a nix list of quoted strings.
pub(crate) fn nix_string_list(values: &[String]) -> String {
    values.iter().map(|v| nix_string(v)).collect::<Vec<_>>().join(" ")
}

pub(crate) fn nix_bool(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
