/*
 * SPDX-FileCopyrightText: 2026 Chanvault Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::media_fetch::MediaAllowList;
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Service configuration, loaded from a JSON file. Everything except the
/// channel list has a code-level default.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ArchiveConfig {
    /// Channel names to monitor. Must not be empty.
    pub channels: Vec<String>,

    pub data_dir: Option<String>,
    /// Root of the generated site (index.html, channels/, downloads/).
    pub output_dir: Option<String>,
    /// Directory the spool feed client reads from.
    pub spool_dir: Option<String>,
    pub bind: Option<String>,

    /// Media categories to archive: "photo", "video", "document".
    pub media_types: Option<Vec<String>>,

    pub backfill_limit: Option<u32>,
    pub render_message_cap: Option<u32>,
    pub retry_attempts: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub attempt_timeout_secs: Option<u64>,
    pub live_poll_secs: Option<u64>,
}

impl ArchiveConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&text).context("parse config json")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            anyhow::bail!("config 'channels' must list at least one channel");
        }
        if self.channels.iter().any(|c| c.trim().is_empty()) {
            anyhow::bail!("config 'channels' contains an empty name");
        }
        if self.retry_attempts == Some(0) {
            anyhow::bail!("config 'retry_attempts' must be at least 1");
        }
        Ok(())
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(PathBuf::from(dir));
        }
        let proj = ProjectDirs::from("net", "chanvault", "Chanvault")
            .context("cannot determine a data directory; set 'data_dir' in the config")?;
        Ok(proj.data_dir().to_path_buf())
    }

    pub fn output_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.output_dir {
            return Ok(PathBuf::from(dir));
        }
        Ok(self.data_dir()?.join("site"))
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("archive.db"))
    }

    pub fn spool_dir(&self) -> Option<PathBuf> {
        self.spool_dir.as_ref().map(PathBuf::from)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let raw = self.bind.as_deref().unwrap_or("0.0.0.0:8080");
        raw.parse()
            .with_context(|| format!("invalid bind address: {raw}"))
    }

    pub fn allow_list(&self) -> MediaAllowList {
        match &self.media_types {
            Some(names) => MediaAllowList::from_names(names),
            None => MediaAllowList::default(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::default();
        if let Some(n) = self.retry_attempts {
            policy.max_attempts = n;
        }
        if let Some(ms) = self.retry_base_delay_ms {
            policy.base_delay = Duration::from_millis(ms);
        }
        policy
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs.unwrap_or(60))
    }

    pub fn backfill_limit(&self) -> u32 {
        self.backfill_limit.unwrap_or(100)
    }

    pub fn render_message_cap(&self) -> u32 {
        self.render_message_cap.unwrap_or(5000)
    }

    pub fn live_poll_secs(&self) -> u64 {
        self.live_poll_secs.unwrap_or(2)
    }
}
