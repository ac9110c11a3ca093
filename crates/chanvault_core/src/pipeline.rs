/*
 * SPDX-FileCopyrightText: 2026 Chanvault Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::archive_db::ArchiveDb;
use crate::error::ArchiveError;
use crate::feed::{ChannelIdentity, FeedClient, RawMessage};
use crate::html_render::{IndexEntry, ViewRenderer};
use crate::media_fetch::{MediaAllowList, MediaFetcher};
use crate::render_gate::RenderGate;
use crate::retry::{sleep_with_jitter, RetryPolicy};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub retry: RetryPolicy,
    /// Ceiling on one classification-and-persist attempt.
    pub attempt_timeout: Duration,
    /// Historical window fetched at channel-resolution time.
    pub backfill_limit: u32,
    /// Upper bound on messages handed to a single channel render (most
    /// recent window).
    pub render_message_cap: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            attempt_timeout: Duration::from_secs(60),
            backfill_limit: 100,
            render_message_cap: 5000,
        }
    }
}

/// Whether a content-affecting outcome regenerates the channel page. Backfill
/// suppresses per-message rendering and issues one render for the whole
/// window; live processing renders per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    PerMessage,
    Suppressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Fresh record persisted.
    Inserted,
    /// Existing record whose missing media file was restored to disk.
    Repaired,
    /// Nothing changed: duplicate delivery, already-complete record, or a
    /// repair whose re-fetch failed (left for a later pass).
    Unchanged,
}

/// The orchestrator: classifies each observed message against storage,
/// downloads allowed media, persists fresh records, and triggers renders
/// through the per-channel gate.
#[derive(Clone)]
pub struct IngestionPipeline {
    db: ArchiveDb,
    client: Arc<dyn FeedClient>,
    fetcher: MediaFetcher,
    gate: Arc<RenderGate>,
    renderer: Arc<dyn ViewRenderer>,
    allow: MediaAllowList,
    output_root: PathBuf,
    settings: PipelineSettings,
}

impl IngestionPipeline {
    pub fn new(
        db: ArchiveDb,
        client: Arc<dyn FeedClient>,
        fetcher: MediaFetcher,
        gate: Arc<RenderGate>,
        renderer: Arc<dyn ViewRenderer>,
        allow: MediaAllowList,
        output_root: PathBuf,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            db,
            client,
            fetcher,
            gate,
            renderer,
            allow,
            output_root,
            settings,
        }
    }

    /// Entry point for one observed message, from backfill or live delivery.
    /// Carries the whole retry loop; failures are contained here and never
    /// propagate to sibling messages or the event-receiving path.
    pub async fn process_message(
        &self,
        channel: &ChannelIdentity,
        message: &RawMessage,
        mode: RenderMode,
    ) -> Outcome {
        let mut attempt = 0u32;
        let (channel_key, outcome) = loop {
            attempt += 1;
            let attempted =
                tokio::time::timeout(self.settings.attempt_timeout, self.process_once(channel, message))
                    .await
                    .unwrap_or(Err(ArchiveError::Timeout(self.settings.attempt_timeout)));
            match attempted {
                Ok(v) => break v,
                Err(e) if attempt < self.settings.retry.max_attempts => {
                    warn!(
                        "processing message {} in {} failed (attempt {attempt}): {e:#}",
                        message.id, channel.handle
                    );
                    sleep_with_jitter(self.settings.retry.delay_for(attempt)).await;
                }
                Err(e) => {
                    error!(
                        "giving up on message {} in {} after {attempt} attempts: {e:#}",
                        message.id, channel.handle
                    );
                    return Outcome::Unchanged;
                }
            }
        };

        if mode == RenderMode::PerMessage && outcome != Outcome::Unchanged {
            if let Err(e) = self.render_channel(channel_key).await {
                // View staleness is tolerated; the persisted record stands.
                warn!(
                    "channel render after message {} failed: {e:#}",
                    message.id
                );
            }
        }
        outcome
    }

    /// One classification-and-persist attempt. No rendering happens here.
    async fn process_once(
        &self,
        channel: &ChannelIdentity,
        message: &RawMessage,
    ) -> Result<(i64, Outcome), ArchiveError> {
        let channel_key = {
            let db = self.db.clone();
            let channel = channel.clone();
            tokio::task::spawn_blocking(move || {
                db.resolve_channel(channel.feed_id, &channel.title, &channel.handle, "", None)
            })
            .await??
        };

        let existing = {
            let db = self.db.clone();
            let feed_msg_id = message.id;
            tokio::task::spawn_blocking(move || db.find_message(channel_key, feed_msg_id)).await??
        };

        if let Some(row) = &existing {
            match &row.media_path {
                // Recorded without media: fully processed.
                None => return Ok((channel_key, Outcome::Unchanged)),
                Some(rel) => {
                    if self.output_root.join(rel).exists() {
                        return Ok((channel_key, Outcome::Unchanged));
                    }
                    warn!(
                        "media missing for message {} in {}, re-fetching",
                        message.id, channel.handle
                    );
                }
            }
        }

        let mut media_path: Option<String> = None;
        if let Some(media) = &message.media {
            if self.allow.permits(media.kind) {
                match self.fetcher.fetch_message_media(channel, message).await {
                    Ok(stored) => media_path = stored,
                    // A failed fetch does not abort the message: it is stored
                    // without media and a later backfill pass re-drives the
                    // download.
                    Err(e) => warn!(
                        "media fetch for message {} in {} failed: {e:#}",
                        message.id, channel.handle
                    ),
                }
            }
        }

        match existing {
            None => {
                let inserted = {
                    let db = self.db.clone();
                    let feed_msg_id = message.id;
                    let date_ms = message.date_ms;
                    let body = message.text.clone();
                    let media_path = media_path.clone();
                    let grouped_id = message.grouped_id;
                    tokio::task::spawn_blocking(move || {
                        db.save_message(
                            channel_key,
                            feed_msg_id,
                            date_ms,
                            body.as_deref(),
                            media_path.as_deref(),
                            grouped_id,
                        )
                    })
                    .await??
                };
                let outcome = if inserted {
                    Outcome::Inserted
                } else {
                    // A concurrent sibling won the insert race.
                    Outcome::Unchanged
                };
                Ok((channel_key, outcome))
            }
            // Repair path: the record stands, only the file was restored.
            Some(_) => {
                let outcome = if media_path.is_some() {
                    Outcome::Repaired
                } else {
                    Outcome::Unchanged
                };
                Ok((channel_key, outcome))
            }
        }
    }

    /// Regenerates one channel page under the channel's gate lock. Channel
    /// metadata and the ordered message list are re-read after the lock is
    /// held, so the page always reflects the full persisted set at render
    /// time.
    pub async fn render_channel(&self, channel_key: i64) -> Result<(), ArchiveError> {
        let _guard = self.gate.lock_channel(channel_key).await;

        let (channel, messages) = {
            let db = self.db.clone();
            let cap = self.settings.render_message_cap;
            tokio::task::spawn_blocking(move || -> Result<_, ArchiveError> {
                let channel = db.get_channel(channel_key)?.ok_or_else(|| {
                    ArchiveError::RenderFailed(anyhow::anyhow!(
                        "unknown channel key {channel_key}"
                    ))
                })?;
                let messages = db.list_messages(channel_key, cap)?;
                Ok((channel, messages))
            })
            .await??
        };

        self.renderer
            .render_channel_page(&channel, &messages)
            .await
            .map_err(ArchiveError::RenderFailed)
    }

    /// Regenerates the global index under its own lock domain.
    pub async fn render_index(&self) -> Result<(), ArchiveError> {
        let _guard = self.gate.lock_index().await;

        let entries = {
            let db = self.db.clone();
            tokio::task::spawn_blocking(move || -> Result<_, ArchiveError> {
                let mut entries = Vec::new();
                for channel in db.list_channels()? {
                    let message_count = db.count_messages(channel.id)?;
                    entries.push(IndexEntry {
                        channel,
                        message_count,
                    });
                }
                Ok(entries)
            })
            .await??
        };

        self.renderer
            .render_index_page(&entries)
            .await
            .map_err(ArchiveError::RenderFailed)
    }

    /// Startup resolution pass over the configured channel names, sequential,
    /// one bounded backfill per channel with per-message rendering suppressed
    /// and exactly one channel render afterwards. A channel that fails to
    /// resolve is skipped; the others proceed. The global index is rendered
    /// exactly once, after all channels.
    pub async fn resolve_configured(&self, names: &[String]) -> Vec<ChannelIdentity> {
        let mut monitored = Vec::new();
        for name in names {
            match self.resolve_one(name).await {
                Ok(identity) => {
                    info!(
                        "monitoring channel: {} (@{})",
                        identity.title, identity.handle
                    );
                    monitored.push(identity);
                }
                Err(e) => warn!("failed to resolve or backfill channel {name}: {e:#}"),
            }
        }

        if let Err(e) = self.render_index().await {
            warn!("index render failed: {e:#}");
        }
        monitored
    }

    async fn resolve_one(&self, name: &str) -> Result<ChannelIdentity, ArchiveError> {
        let identity = self
            .client
            .resolve_channel(name)
            .await
            .map_err(ArchiveError::ChannelResolutionFailed)?;

        let avatar = match self.fetcher.fetch_avatar(&identity).await {
            Ok(path) => path,
            Err(e) => {
                warn!("avatar download for {} failed: {e:#}", identity.handle);
                None
            }
        };

        let folder = format!("downloads/{}", identity.handle);
        let channel_key = {
            let db = self.db.clone();
            let identity = identity.clone();
            tokio::task::spawn_blocking(move || {
                db.resolve_channel(
                    identity.feed_id,
                    &identity.title,
                    &identity.handle,
                    &folder,
                    avatar.as_deref(),
                )
            })
            .await??
        };

        info!(
            "backfilling up to {} messages for {}",
            self.settings.backfill_limit, identity.handle
        );
        let history = self
            .client
            .fetch_history(&identity, self.settings.backfill_limit)
            .await
            .map_err(ArchiveError::ChannelResolutionFailed)?;
        for message in &history {
            self.process_message(&identity, message, RenderMode::Suppressed)
                .await;
        }

        // One render for the whole window.
        if let Err(e) = self.render_channel(channel_key).await {
            warn!("post-backfill render for {} failed: {e:#}", identity.handle);
        }
        Ok(identity)
    }
}
