/*
 * SPDX-FileCopyrightText: 2026 Chanvault Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Resolved identity of an external channel.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChannelIdentity {
    pub feed_id: i64,
    pub title: String,
    pub handle: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Voice,
    Audio,
    Sticker,
    Document,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MediaRef {
    pub kind: MediaKind,
    /// Opaque locator the feed client uses to find the blob. The core never
    /// interprets it.
    pub source: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RawMessage {
    pub id: i64,
    pub date_ms: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media: Option<MediaRef>,
    #[serde(default)]
    pub grouped_id: Option<i64>,
}

/// One live delivery from the subscription stream.
#[derive(Debug, Clone)]
pub struct LiveMessage {
    pub channel: ChannelIdentity,
    pub message: RawMessage,
}

/// Boundary to the external feed source. Implementations own all protocol
/// concerns (connection, auth, rate limits); the core only consumes this
/// interface.
#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn resolve_channel(&self, name: &str) -> Result<ChannelIdentity>;

    /// Bounded historical window, ascending message id.
    async fn fetch_history(
        &self,
        channel: &ChannelIdentity,
        limit: u32,
    ) -> Result<Vec<RawMessage>>;

    /// Downloads the message's media blob to `dest_prefix` plus a
    /// client-chosen extension. Returns the final path, or `None` when the
    /// message carries nothing downloadable.
    async fn download_media(
        &self,
        channel: &ChannelIdentity,
        message: &RawMessage,
        dest_prefix: &Path,
    ) -> Result<Option<PathBuf>>;

    async fn download_avatar(
        &self,
        channel: &ChannelIdentity,
        dest_prefix: &Path,
    ) -> Result<Option<PathBuf>>;

    /// Push-based live delivery. The receiver yields messages for any channel
    /// the client knows about; the caller filters to monitored ones.
    fn subscribe_live(&self) -> mpsc::Receiver<LiveMessage>;
}
