/*
 * SPDX-FileCopyrightText: 2026 Chanvault Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::archive_db::ArchiveDb;
use crate::config::ArchiveConfig;
use crate::feed::FeedClient;
use crate::html_render::HtmlRenderer;
use crate::media_fetch::MediaFetcher;
use crate::pipeline::{IngestionPipeline, PipelineSettings, RenderMode};
use crate::render_gate::RenderGate;
use crate::web::{self, WebState};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Wires the components and runs until the shutdown flag flips: startup index
/// render, web server, channel resolution with backfill, then the live-event
/// receive loop.
pub async fn run(
    cfg: ArchiveConfig,
    client: Arc<dyn FeedClient>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let output_root = cfg.output_dir()?;
    tokio::fs::create_dir_all(&output_root)
        .await
        .with_context(|| format!("create output dir {}", output_root.display()))?;
    let db = ArchiveDb::open(cfg.db_path()?).context("open archive database")?;

    let gate = Arc::new(RenderGate::new());
    let renderer = Arc::new(HtmlRenderer::new(output_root.clone()));
    let fetcher = MediaFetcher::new(client.clone(), output_root.clone());
    let pipeline = IngestionPipeline::new(
        db.clone(),
        client.clone(),
        fetcher,
        gate,
        renderer,
        cfg.allow_list(),
        output_root.clone(),
        PipelineSettings {
            retry: cfg.retry_policy(),
            attempt_timeout: cfg.attempt_timeout(),
            backfill_limit: cfg.backfill_limit(),
            render_message_cap: cfg.render_message_cap(),
        },
    );

    // The index reflects whatever a previous run left behind, before any
    // resolution work happens.
    if let Err(e) = pipeline.render_index().await {
        warn!("initial index render failed: {e:#}");
    }

    let web_state = WebState {
        db: db.clone(),
        pipeline: pipeline.clone(),
        output_root: output_root.clone(),
    };
    let bind = cfg.bind_addr()?;
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = web::serve(web_state, bind, shutdown).await {
                warn!("web server stopped: {e:#}");
            }
        }
    });

    let monitored = pipeline.resolve_configured(&cfg.channels).await;
    if monitored.is_empty() {
        warn!("no channels resolved; serving the existing archive only");
    }
    let monitored: HashMap<i64, String> = monitored
        .into_iter()
        .map(|c| (c.feed_id, c.handle))
        .collect();

    info!("archiver started, listening for live messages");
    let mut live = client.subscribe_live();
    let mut shutdown = shutdown;
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            event = live.recv() => {
                let Some(event) = event else {
                    warn!("live message stream ended");
                    break;
                };
                if !monitored.contains_key(&event.channel.feed_id) {
                    continue;
                }
                info!("new message {} in {}", event.message.id, event.channel.handle);
                // Fire-and-forget: receiving the next event never waits on
                // processing the current one. The task carries its own retry
                // loop and terminal failures are logged, not requeued.
                let pipeline = pipeline.clone();
                tokio::spawn(async move {
                    pipeline
                        .process_message(&event.channel, &event.message, RenderMode::PerMessage)
                        .await;
                });
            }
        }
    }

    info!("archiver stopped");
    Ok(())
}
