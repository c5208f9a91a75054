// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process configuration.

use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

/// dogeboxd: the Dogebox pup orchestrator.
#[derive(Debug, Parser)]
#[command(name = "dogeboxd")]
pub struct Args {
    /// Root of durable state.
    #[arg(long, default_value = "/opt/dogebox")]
    pub data_dir: PathBuf,

    /// Declarative host config root; written only by the patch engine.
    #[arg(long, default_value = "/etc/nixos/dogebox")]
    pub nix_dir: PathBuf,

    /// Scratch root for patch snapshots and staged backups.
    #[arg(long, default_value = "/tmp/dogeboxd")]
    pub tmp_dir: PathBuf,

    /// Directory of per-pup log files consumed by the log tailer.
    #[arg(long, default_value = "/var/log/containers")]
    pub container_log_dir: PathBuf,

    /// Suppress hash-mismatch fatality and load the dev session table.
    #[arg(long)]
    pub dev: bool,

    /// Serve the restricted recovery route set.
    #[arg(long)]
    pub recovery: bool,

    /// Skip external address announcement.
    #[arg(long)]
    pub disable_reflector: bool,

    /// HTTP bind address (consumed by the web surface).
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: IpAddr,

    /// HTTP port (consumed by the web surface).
    #[arg(long, default_value_t = 3000)]
    pub port: u16,

    /// Optional Unix socket for the local API.
    #[arg(long)]
    pub unix_socket_path: Option<PathBuf>,

    /// Command used to rebuild the host configuration.
    #[arg(long, default_value = "nixos-rebuild")]
    pub rebuild_command: String,

    /// Base URL of the delegated key manager.
    #[arg(long, default_value = "http://127.0.0.1:4444")]
    pub dkm_url: String,
}

/// Resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub nix_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub container_log_dir: PathBuf,
    pub dev_mode: bool,
    pub recovery: bool,
    pub disable_reflector: bool,
    pub bind: IpAddr,
    pub port: u16,
    pub unix_socket_path: Option<PathBuf>,
    pub rebuild_command: String,
    pub dkm_url: String,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            data_dir: args.data_dir,
            nix_dir: args.nix_dir,
            tmp_dir: args.tmp_dir,
            container_log_dir: args.container_log_dir,
            dev_mode: args.dev,
            recovery: args.recovery,
            disable_reflector: args.disable_reflector,
            bind: args.bind,
            port: args.port,
            unix_socket_path: args.unix_socket_path,
            rebuild_command: args.rebuild_command,
            dkm_url: args.dkm_url,
        }
    }
}

impl ServerConfig {
    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("dogeboxd.pid")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("dogeboxd.log")
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
