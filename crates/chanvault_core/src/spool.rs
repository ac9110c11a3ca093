/*
 * SPDX-FileCopyrightText: 2026 Chanvault Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::feed::{ChannelIdentity, FeedClient, LiveMessage, RawMessage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Directory-backed feed source. Each channel is a folder under the spool
/// root:
///
/// ```text
/// spool/<name>/channel.json        {"feed_id": .., "title": .., "handle": ..}
/// spool/<name>/avatar.<ext>        optional
/// spool/<name>/messages/<id>.json  one RawMessage per file
/// spool/<name>/blobs/<file>        media blobs named by MediaRef.source
/// ```
///
/// Dropping a new message file into `messages/` surfaces it on the live
/// subscription. Useful for development and for driving the pipeline without
/// a network protocol.
pub struct SpoolFeedClient {
    spool_dir: PathBuf,
    poll_interval: Duration,
}

impl SpoolFeedClient {
    pub fn new(spool_dir: impl Into<PathBuf>) -> Self {
        Self {
            spool_dir: spool_dir.into(),
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn channel_dir(&self, name: &str) -> PathBuf {
        self.spool_dir.join(name)
    }

    fn read_identity(dir: &Path) -> Result<ChannelIdentity> {
        let path = dir.join("channel.json");
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
    }

    fn read_messages(dir: &Path) -> Result<Vec<RawMessage>> {
        let msg_dir = dir.join("messages");
        let mut out = Vec::new();
        let entries = match std::fs::read_dir(&msg_dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(out),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let text = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<RawMessage>(&text) {
                Ok(message) => out.push(message),
                Err(e) => warn!("skipping malformed spool message {}: {e}", path.display()),
            }
        }
        out.sort_by_key(|m| m.id);
        Ok(out)
    }

    fn copy_blob(src: &Path, dest_prefix: &Path) -> Result<PathBuf> {
        let ext = src.extension().and_then(|e| e.to_str()).unwrap_or("bin");
        let dest = dest_prefix.with_extension(ext);
        std::fs::copy(src, &dest)
            .with_context(|| format!("copy {} -> {}", src.display(), dest.display()))?;
        Ok(dest)
    }

    fn find_avatar(dir: &Path) -> Option<PathBuf> {
        for ext in ["jpg", "jpeg", "png", "webp"] {
            let path = dir.join(format!("avatar.{ext}"));
            if path.exists() {
                return Some(path);
            }
        }
        None
    }
}

#[async_trait]
impl FeedClient for SpoolFeedClient {
    async fn resolve_channel(&self, name: &str) -> Result<ChannelIdentity> {
        Self::read_identity(&self.channel_dir(name))
    }

    async fn fetch_history(
        &self,
        channel: &ChannelIdentity,
        limit: u32,
    ) -> Result<Vec<RawMessage>> {
        let mut messages = Self::read_messages(&self.channel_dir(&channel.handle))?;
        let keep = limit.max(1) as usize;
        if messages.len() > keep {
            // Most recent window, still ascending.
            messages = messages.split_off(messages.len() - keep);
        }
        Ok(messages)
    }

    async fn download_media(
        &self,
        channel: &ChannelIdentity,
        message: &RawMessage,
        dest_prefix: &Path,
    ) -> Result<Option<PathBuf>> {
        let Some(media) = &message.media else {
            return Ok(None);
        };
        let src = self
            .channel_dir(&channel.handle)
            .join("blobs")
            .join(&media.source);
        if !src.exists() {
            anyhow::bail!("spool blob missing: {}", src.display());
        }
        Ok(Some(Self::copy_blob(&src, dest_prefix)?))
    }

    async fn download_avatar(
        &self,
        channel: &ChannelIdentity,
        dest_prefix: &Path,
    ) -> Result<Option<PathBuf>> {
        let Some(src) = Self::find_avatar(&self.channel_dir(&channel.handle)) else {
            return Ok(None);
        };
        Ok(Some(Self::copy_blob(&src, dest_prefix)?))
    }

    fn subscribe_live(&self) -> mpsc::Receiver<LiveMessage> {
        let (tx, rx) = mpsc::channel(64);
        let spool_dir = self.spool_dir.clone();
        let poll = self.poll_interval;
        tokio::spawn(async move {
            // Everything already present at subscribe time counts as history,
            // not live traffic.
            let mut seen: HashSet<(i64, i64)> = HashSet::new();
            let _ = scan_new(&spool_dir, &mut seen);

            let mut ticker = tokio::time::interval(poll);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                for live in scan_new(&spool_dir, &mut seen) {
                    if tx.send(live).await.is_err() {
                        return;
                    }
                }
            }
        });
        rx
    }
}

fn scan_new(spool_dir: &Path, seen: &mut HashSet<(i64, i64)>) -> Vec<LiveMessage> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(spool_dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let Ok(identity) = SpoolFeedClient::read_identity(&dir) else {
            continue;
        };
        let Ok(messages) = SpoolFeedClient::read_messages(&dir) else {
            continue;
        };
        for message in messages {
            if seen.insert((identity.feed_id, message.id)) {
                out.push(LiveMessage {
                    channel: identity.clone(),
                    message,
                });
            }
        }
    }
    out
}
