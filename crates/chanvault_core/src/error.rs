/*
 * SPDX-FileCopyrightText: 2026 Chanvault Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use rusqlite::ErrorCode;

/// Failure taxonomy for the ingestion core.
///
/// `StorageUnavailable` is transient and retried by the pipeline's per-message
/// retry loop. `MediaFetchFailed` is tolerated: the message is recorded
/// without media and a later backfill pass re-drives the download.
/// `ConstraintViolation` indicates broken uniqueness handling and is never
/// retried.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] rusqlite::Error),

    #[error("storage constraint violated: {0}")]
    ConstraintViolation(#[source] rusqlite::Error),

    #[error("storage error: {0}")]
    Storage(#[source] rusqlite::Error),

    #[error("channel resolution failed: {0}")]
    ChannelResolutionFailed(#[source] anyhow::Error),

    #[error("media fetch failed: {0}")]
    MediaFetchFailed(#[source] anyhow::Error),

    #[error("render failed: {0}")]
    RenderFailed(#[source] anyhow::Error),

    #[error("attempt timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("blocking task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable(_) | Self::MediaFetchFailed(_) | Self::Timeout(_)
        )
    }
}

impl From<rusqlite::Error> for ArchiveError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _) => match err.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    Self::StorageUnavailable(e)
                }
                ErrorCode::ConstraintViolation => Self::ConstraintViolation(e),
                _ => Self::Storage(e),
            },
            _ => Self::Storage(e),
        }
    }
}
