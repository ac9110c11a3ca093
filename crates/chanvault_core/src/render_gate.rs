/*
 * SPDX-FileCopyrightText: 2026 Chanvault Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-channel render serialization. One async mutex per channel key, created
/// lazily and kept for the process lifetime (the key space is bounded by the
/// configured channel set, so no eviction is needed). The index page has its
/// own lock domain so an index render never queues behind a channel render.
pub struct RenderGate {
    channels: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
    index: Arc<AsyncMutex<()>>,
}

impl RenderGate {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            index: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Acquires the lock for one channel. Guards for distinct channels are
    /// independent; callers for the same channel queue in arrival order.
    pub async fn lock_channel(&self, channel_key: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.channels.lock().expect("render gate mutex poisoned");
            map.entry(channel_key)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    pub async fn lock_index(&self) -> OwnedMutexGuard<()> {
        self.index.clone().lock_owned().await
    }
}

impl Default for RenderGate {
    fn default() -> Self {
        Self::new()
    }
}
