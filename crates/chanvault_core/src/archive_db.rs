/*
 * SPDX-FileCopyrightText: 2026 Chanvault Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::error::ArchiveError;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// Durable store for channels and messages. Holds only the database path;
/// every operation opens its own short-lived connection, so clones can be
/// handed to blocking tasks freely.
#[derive(Clone)]
pub struct ArchiveDb {
    path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ChannelRow {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub handle: String,
    pub folder_path: String,
    pub avatar_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub channel_id: i64,
    pub feed_msg_id: i64,
    pub date_ms: i64,
    pub body: Option<String>,
    pub media_path: Option<String>,
    pub grouped_id: Option<i64>,
}

impl ArchiveDb {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = db_path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS channels (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              feed_id INTEGER UNIQUE NOT NULL,
              title TEXT NOT NULL,
              handle TEXT NOT NULL,
              folder_path TEXT NOT NULL,
              avatar_path TEXT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              channel_id INTEGER NOT NULL,
              feed_msg_id INTEGER NOT NULL,
              date_ms INTEGER NOT NULL,
              body TEXT NULL,
              media_path TEXT NULL,
              grouped_id INTEGER NULL,
              FOREIGN KEY (channel_id) REFERENCES channels (id),
              UNIQUE(channel_id, feed_msg_id)
            );
            CREATE INDEX IF NOT EXISTS idx_messages_channel_ordered
              ON messages(channel_id, feed_msg_id ASC);
            "#,
        )?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the internal key for `feed_id`, inserting a new row on first
    /// sighting. Metadata is first-write-wins: a later call with different
    /// title/handle/paths leaves the existing row untouched. Safe under
    /// concurrent callers; the UNIQUE constraint arbitrates the insert race.
    pub fn resolve_channel(
        &self,
        feed_id: i64,
        title: &str,
        handle: &str,
        folder_path: &str,
        avatar_path: Option<&str>,
    ) -> Result<i64, ArchiveError> {
        let conn = Connection::open(&self.path)?;
        conn.execute(
            "INSERT OR IGNORE INTO channels(feed_id, title, handle, folder_path, avatar_path) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![feed_id, title, handle, folder_path, avatar_path],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM channels WHERE feed_id=?1",
            params![feed_id],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    pub fn get_channel(&self, channel_key: i64) -> Result<Option<ChannelRow>, ArchiveError> {
        let conn = Connection::open(&self.path)?;
        conn.query_row(
            "SELECT id, feed_id, title, handle, folder_path, avatar_path FROM channels WHERE id=?1",
            params![channel_key],
            row_to_channel,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn list_channels(&self) -> Result<Vec<ChannelRow>, ArchiveError> {
        let conn = Connection::open(&self.path)?;
        let mut stmt = conn.prepare(
            "SELECT id, feed_id, title, handle, folder_path, avatar_path FROM channels ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map([], row_to_channel)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn find_message(
        &self,
        channel_key: i64,
        feed_msg_id: i64,
    ) -> Result<Option<MessageRow>, ArchiveError> {
        let conn = Connection::open(&self.path)?;
        conn.query_row(
            "SELECT id, channel_id, feed_msg_id, date_ms, body, media_path, grouped_id FROM messages WHERE channel_id=?1 AND feed_msg_id=?2",
            params![channel_key, feed_msg_id],
            row_to_message,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Inserts a message record. Returns `false` when the
    /// (channel, feed message id) pair already exists; a duplicate is a
    /// no-op signal, never an error.
    pub fn save_message(
        &self,
        channel_key: i64,
        feed_msg_id: i64,
        date_ms: i64,
        body: Option<&str>,
        media_path: Option<&str>,
        grouped_id: Option<i64>,
    ) -> Result<bool, ArchiveError> {
        let conn = Connection::open(&self.path)?;
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO messages
              (channel_id, feed_msg_id, date_ms, body, media_path, grouped_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![channel_key, feed_msg_id, date_ms, body, media_path, grouped_id],
        )?;
        Ok(inserted > 0)
    }

    /// Messages for one channel, ascending by external id (the render
    /// order). The cap keeps the most recent window.
    pub fn list_messages(
        &self,
        channel_key: i64,
        limit: u32,
    ) -> Result<Vec<MessageRow>, ArchiveError> {
        let conn = Connection::open(&self.path)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, channel_id, feed_msg_id, date_ms, body, media_path, grouped_id
            FROM (
              SELECT id, channel_id, feed_msg_id, date_ms, body, media_path, grouped_id
              FROM messages
              WHERE channel_id=?1
              ORDER BY feed_msg_id DESC
              LIMIT ?2
            )
            ORDER BY feed_msg_id ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![channel_key, limit.max(1) as i64], row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count_messages(&self, channel_key: i64) -> Result<u64, ArchiveError> {
        let conn = Connection::open(&self.path)?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE channel_id=?1",
            params![channel_key],
            |r| r.get(0),
        )?;
        Ok(n.max(0) as u64)
    }

    /// Destructive wipe of every channel and message record. On-disk media
    /// and generated pages are not owned by this store; the caller purges
    /// those separately.
    pub fn reset_all(&self) -> Result<(), ArchiveError> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(
            r#"
            DELETE FROM messages;
            DELETE FROM channels;
            DELETE FROM sqlite_sequence WHERE name IN ('messages', 'channels');
            VACUUM;
            "#,
        )?;
        Ok(())
    }
}

fn row_to_channel(r: &rusqlite::Row<'_>) -> rusqlite::Result<ChannelRow> {
    Ok(ChannelRow {
        id: r.get(0)?,
        feed_id: r.get(1)?,
        title: r.get(2)?,
        handle: r.get(3)?,
        folder_path: r.get(4)?,
        avatar_path: r.get(5)?,
    })
}

fn row_to_message(r: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: r.get(0)?,
        channel_id: r.get(1)?,
        feed_msg_id: r.get(2)?,
        date_ms: r.get(3)?,
        body: r.get(4)?,
        media_path: r.get(5)?,
        grouped_id: r.get(6)?,
    })
}
