// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn defaults_resolve() {
    let args = Args::parse_from(["dogeboxd"]);
    let config = ServerConfig::from(args);
    assert_eq!(config.data_dir, PathBuf::from("/opt/dogebox"));
    assert_eq!(config.nix_dir, PathBuf::from("/etc/nixos/dogebox"));
    assert!(!config.dev_mode);
    assert!(!config.recovery);
    assert_eq!(config.port, 3000);
    assert_eq!(config.lock_path(), PathBuf::from("/opt/dogebox/dogeboxd.pid"));
}

#[test]
fn flags_override_defaults() {
    let args = Args::parse_from([
        "dogeboxd",
        "--data-dir",
        "/data",
        "--nix-dir",
        "/nix-cfg",
        "--dev",
        "--recovery",
        "--port",
        "8080",
        "--unix-socket-path",
        "/run/dogeboxd.sock",
    ]);
    let config = ServerConfig::from(args);
    assert_eq!(config.data_dir, PathBuf::from("/data"));
    assert_eq!(config.nix_dir, PathBuf::from("/nix-cfg"));
    assert!(config.dev_mode);
    assert!(config.recovery);
    assert_eq!(config.port, 8080);
    assert_eq!(config.unix_socket_path, Some(PathBuf::from("/run/dogeboxd.sock")));
}
