// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn render_substitutes_placeholders() {
    let out = render("a={{x}} b={{y}}", &[("x", "1".to_string()), ("y", "2".to_string())]);
    assert_eq!(out.unwrap(), "a=1 b=2");
}

#[test]
fn render_rejects_unresolved_placeholder() {
    let err = render("a={{x}} b={{missing}}", &[("x", "1".to_string())]).unwrap_err();
    assert_eq!(err, "{{missing}}");
}

#[test]
fn render_repeated_placeholder() {
    let out = render("{{k}}/{{k}}", &[("k", "v".to_string())]).unwrap();
    assert_eq!(out, "v/v");
}

#[test]
fn nix_string_escapes() {
    assert_eq!(nix_string("plain"), "\"plain\"");
    assert_eq!(nix_string("a\"b"), "\"a\\\"b\"");
    assert_eq!(nix_string("a\\b"), "\"a\\\\b\"");
    assert_eq!(nix_string("a$b"), "\"a\\$b\"");
}

#[test]
fn nix_string_list_joins() {
    let list = nix_string_list(&["a".to_string(), "b".to_string()]);
    assert_eq!(list, "\"a\" \"b\"");
    assert_eq!(nix_string_list(&[]), "");
}

#[test]
fn nix_bool_renders() {
    assert_eq!(nix_bool(true), "true");
    assert_eq!(nix_bool(false), "false");
}
