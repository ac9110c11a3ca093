/*
 * SPDX-FileCopyrightText: 2026 Chanvault Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use chanvault_core::config::ArchiveConfig;
use chanvault_core::runtime;
use chanvault_core::spool::SpoolFeedClient;
use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

fn default_config_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from("net", "chanvault", "Chanvault")
        .context("cannot determine a config directory; pass --config")?;
    Ok(proj.config_dir().join("config.json"))
}

fn parse_config_path() -> Result<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return Ok(PathBuf::from(path));
            }
            return Err(anyhow::anyhow!("--config requires a path"));
        }
    }
    if let Ok(path) = std::env::var("CHANVAULT_CONFIG") {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    default_config_path()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .init();

    let cfg_path = parse_config_path()?;
    info!("chanvault service starting");
    info!("config: {}", cfg_path.display());
    let cfg = ArchiveConfig::load(&cfg_path)?;

    let spool_dir = cfg
        .spool_dir()
        .context("config 'spool_dir' is required for the spool feed client")?;
    let client = Arc::new(
        SpoolFeedClient::new(spool_dir)
            .with_poll_interval(Duration::from_secs(cfg.live_poll_secs())),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    runtime::run(cfg, client, shutdown_rx).await
}
