/*
 * SPDX-FileCopyrightText: 2026 Chanvault Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::archive_db::ArchiveDb;
use crate::pipeline::IngestionPipeline;
use anyhow::{Context, Result};
use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

/// Admin surface plus static serving of the generated archive. The only
/// mutating endpoint is the destructive reset.
#[derive(Clone)]
pub struct WebState {
    pub db: ArchiveDb,
    pub pipeline: IngestionPipeline,
    pub output_root: PathBuf,
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/api/reset", post(reset))
        .fallback_service(ServeDir::new(state.output_root.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(
    state: WebState,
    addr: SocketAddr,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!("web server listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|v| *v).await;
        })
        .await?;
    Ok(())
}

async fn reset(State(state): State<WebState>) -> impl IntoResponse {
    info!("reset requested: wiping archive");

    let wiped = tokio::task::spawn_blocking({
        let db = state.db.clone();
        move || db.reset_all()
    })
    .await;
    match wiped {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!("reset failed: {e:#}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": e.to_string()})),
            );
        }
        Err(e) => {
            error!("reset task failed: {e:#}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": e.to_string()})),
            );
        }
    }

    // The store does not own on-disk artifacts; purge them here.
    if let Err(e) = purge_artifacts(&state.output_root).await {
        warn!("artifact purge incomplete: {e:#}");
    }
    if let Err(e) = state.pipeline.render_index().await {
        warn!("index render after reset failed: {e:#}");
    }

    (
        StatusCode::OK,
        Json(json!({"status": "ok", "message": "archive cleared"})),
    )
}

/// Removes downloaded media and generated channel pages under the output
/// root, recreating the empty directories.
pub async fn purge_artifacts(output_root: &Path) -> Result<()> {
    for sub in ["downloads", "channels"] {
        let dir = output_root.join(sub);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("remove {}", dir.display())),
        }
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("recreate {}", dir.display()))?;
    }
    Ok(())
}
