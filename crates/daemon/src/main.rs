// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! dogeboxd entry point.

use clap::Parser;
use dbx_daemon::adapters::DiskSourceManager;
use dbx_daemon::env::{Args, ServerConfig};
use dbx_daemon::lifecycle::{Daemon, ExternalDeps};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from(Args::parse());

    std::fs::create_dir_all(&config.data_dir)?;
    let file_appender = tracing_appender::rolling::never(
        &config.data_dir,
        config.log_path().file_name().unwrap_or_default(),
    );
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(file_writer)
        .with_ansi(false)
        .init();

    // The git-backed registry is wired by the web surface at integration
    // time; standalone the daemon serves disk sources.
    let source = Arc::new(DiskSourceManager::new());

    let daemon = Daemon::start(config, ExternalDeps { source, monitor: None }).await?;

    tokio::signal::ctrl_c().await?;
    daemon.shutdown().await;
    Ok(())
}
