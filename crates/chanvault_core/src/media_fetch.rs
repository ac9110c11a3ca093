/*
 * SPDX-FileCopyrightText: 2026 Chanvault Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::error::ArchiveError;
use crate::feed::{ChannelIdentity, FeedClient, MediaKind, RawMessage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::{format_description, OffsetDateTime};

/// Media categories the archive keeps, as named in the config file:
/// "photo", "video", "document".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaAllowList {
    pub photo: bool,
    pub video: bool,
    pub document: bool,
}

impl MediaAllowList {
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut allow = Self::default();
        for name in names {
            match name.as_ref().trim().to_ascii_lowercase().as_str() {
                "photo" | "image" => allow.photo = true,
                "video" => allow.video = true,
                "document" | "file" => allow.document = true,
                _ => {}
            }
        }
        allow
    }

    /// Priority-ordered classification over the attachment kind: specific
    /// kinds are matched first, the generic document category last. Voice
    /// notes, audio and stickers are specific kinds the document category
    /// never captures.
    pub fn permits(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Photo => self.photo,
            MediaKind::Video => self.video,
            MediaKind::Voice | MediaKind::Audio | MediaKind::Sticker => false,
            MediaKind::Document => self.document,
        }
    }
}

/// Downloads message media and avatars through the feed client. Destination
/// names are a pure function of the message's date and external id, so a
/// repair re-fetch always lands on the identical path.
#[derive(Clone)]
pub struct MediaFetcher {
    client: Arc<dyn FeedClient>,
    output_root: PathBuf,
}

impl MediaFetcher {
    pub fn new(client: Arc<dyn FeedClient>, output_root: PathBuf) -> Self {
        Self {
            client,
            output_root,
        }
    }

    /// Relative destination prefix for a message's media:
    /// `downloads/<handle>/<YYYYMMDD>_<id>` (extension chosen by the client).
    pub fn media_prefix(handle: &str, message: &RawMessage) -> PathBuf {
        PathBuf::from("downloads")
            .join(handle)
            .join(format!("{}_{}", date_stamp(message.date_ms), message.id))
    }

    /// Fetches the message's media blob. Returns the stored path relative to
    /// the output root.
    pub async fn fetch_message_media(
        &self,
        channel: &ChannelIdentity,
        message: &RawMessage,
    ) -> Result<Option<String>, ArchiveError> {
        let prefix = self
            .output_root
            .join(Self::media_prefix(&channel.handle, message));
        if let Some(parent) = prefix.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let stored = self
            .client
            .download_media(channel, message, &prefix)
            .await
            .map_err(ArchiveError::MediaFetchFailed)?;
        Ok(stored.map(|p| self.relative_to_root(&p)))
    }

    pub async fn fetch_avatar(
        &self,
        channel: &ChannelIdentity,
    ) -> Result<Option<String>, ArchiveError> {
        let prefix = self
            .output_root
            .join("downloads")
            .join(&channel.handle)
            .join("profile");
        if let Some(parent) = prefix.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let stored = self
            .client
            .download_avatar(channel, &prefix)
            .await
            .map_err(ArchiveError::MediaFetchFailed)?;
        Ok(stored.map(|p| self.relative_to_root(&p)))
    }

    fn relative_to_root(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.output_root).unwrap_or(path);
        rel.to_string_lossy().replace('\\', "/")
    }
}

fn date_stamp(date_ms: i64) -> String {
    let format = format_description::parse("[year][month][day]").expect("static format");
    OffsetDateTime::from_unix_timestamp(date_ms / 1000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
        .format(&format)
        .unwrap_or_else(|_| "19700101".to_string())
}
