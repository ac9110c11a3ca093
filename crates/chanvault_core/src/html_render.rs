/*
 * SPDX-FileCopyrightText: 2026 Chanvault Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::archive_db::{ChannelRow, MessageRow};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use time::{format_description, OffsetDateTime};
use tracing::info;

/// One line of the global index.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub channel: ChannelRow,
    pub message_count: u64,
}

/// Produces the persisted view artifacts. Callers are expected to hold the
/// appropriate render lock; implementations just turn data into pages.
#[async_trait]
pub trait ViewRenderer: Send + Sync {
    async fn render_channel_page(
        &self,
        channel: &ChannelRow,
        messages: &[MessageRow],
    ) -> Result<()>;

    async fn render_index_page(&self, entries: &[IndexEntry]) -> Result<()>;
}

/// Static-HTML renderer. Channel pages live under `channels/`, one directory
/// below the output root, so stored media paths get a `../` prefix there.
pub struct HtmlRenderer {
    output_root: PathBuf,
}

impl HtmlRenderer {
    pub fn new(output_root: PathBuf) -> Self {
        Self { output_root }
    }
}

#[async_trait]
impl ViewRenderer for HtmlRenderer {
    async fn render_channel_page(
        &self,
        channel: &ChannelRow,
        messages: &[MessageRow],
    ) -> Result<()> {
        let dir = self.output_root.join("channels");
        tokio::fs::create_dir_all(&dir).await?;

        let mut html = String::with_capacity(4096 + messages.len() * 256);
        html.push_str("<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>{}</title>\n", escape_html(&channel.title)));
        html.push_str(PAGE_STYLE);
        html.push_str("</head>\n<body>\n");

        html.push_str("<header>\n");
        if let Some(avatar) = &channel.avatar_path {
            html.push_str(&format!(
                "<img class=\"avatar\" src=\"../{}\" alt=\"\">\n",
                escape_html(avatar)
            ));
        }
        html.push_str(&format!(
            "<h1>{}</h1>\n<p class=\"handle\">@{}</p>\n",
            escape_html(&channel.title),
            escape_html(&channel.handle)
        ));
        html.push_str("<p><a href=\"../index.html\">&larr; all channels</a></p>\n</header>\n");

        for message in messages {
            html.push_str("<article class=\"message\">\n");
            html.push_str(&format!(
                "<div class=\"meta\">#{} &middot; {}</div>\n",
                message.feed_msg_id,
                format_date(message.date_ms)
            ));
            if let Some(media) = &message.media_path {
                html.push_str(&media_tag(media));
            }
            if let Some(body) = &message.body {
                if !body.trim().is_empty() {
                    html.push_str(&format!("<p>{}</p>\n", body_to_html(body)));
                }
            }
            html.push_str("</article>\n");
        }

        html.push_str("</body>\n</html>\n");

        let path = dir.join(format!("{}.html", channel.handle));
        tokio::fs::write(&path, html)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        info!("updated channels/{}.html", channel.handle);
        Ok(())
    }

    async fn render_index_page(&self, entries: &[IndexEntry]) -> Result<()> {
        let mut html = String::with_capacity(2048);
        html.push_str("<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str("<title>Chanvault</title>\n");
        html.push_str(PAGE_STYLE);
        html.push_str("</head>\n<body>\n<h1>Archived channels</h1>\n");

        if entries.is_empty() {
            html.push_str("<p class=\"empty\">No channels archived yet.</p>\n");
        } else {
            html.push_str("<ul class=\"channels\">\n");
            for entry in entries {
                let channel = &entry.channel;
                html.push_str("<li>");
                if let Some(avatar) = &channel.avatar_path {
                    html.push_str(&format!(
                        "<img class=\"avatar\" src=\"{}\" alt=\"\">",
                        escape_html(avatar)
                    ));
                }
                html.push_str(&format!(
                    "<a href=\"channels/{0}.html\">{1}</a> <span class=\"handle\">@{0}</span> <span class=\"count\">{2} messages</span>",
                    escape_html(&channel.handle),
                    escape_html(&channel.title),
                    entry.message_count
                ));
                html.push_str("</li>\n");
            }
            html.push_str("</ul>\n");
        }

        html.push_str("</body>\n</html>\n");

        tokio::fs::create_dir_all(&self.output_root).await?;
        let path = self.output_root.join("index.html");
        tokio::fs::write(&path, html)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        info!("updated index.html");
        Ok(())
    }
}

const PAGE_STYLE: &str = "<style>\nbody{font-family:sans-serif;max-width:48rem;margin:0 auto;padding:1rem}\n.avatar{width:3rem;height:3rem;border-radius:50%;object-fit:cover;vertical-align:middle;margin-right:.5rem}\n.message{border-bottom:1px solid #ddd;padding:.75rem 0}\n.meta,.handle,.count{color:#777;font-size:.85rem}\n.message img,.message video{max-width:100%}\n.channels{list-style:none;padding:0}\n.channels li{margin:.5rem 0}\n</style>\n";

fn escape_html(input: &str) -> String {
    let mut s = input.to_string();
    s = s.replace('&', "&amp;");
    s = s.replace('<', "&lt;");
    s = s.replace('>', "&gt;");
    s = s.replace('"', "&quot;");
    s = s.replace('\'', "&#39;");
    s
}

fn body_to_html(body: &str) -> String {
    let escaped = escape_html(body.trim());
    escaped.replace("\r\n", "\n").replace('\r', "\n").replace('\n', "<br>")
}

/// Embed tag for a stored media file, chosen from its guessed mime type.
fn media_tag(media_path: &str) -> String {
    let href = format!("../{}", escape_html(media_path));
    let mime = mime_guess::from_path(media_path).first();
    match mime {
        Some(m) if m.type_() == mime_guess::mime::IMAGE => {
            format!("<img src=\"{href}\" loading=\"lazy\" alt=\"\">\n")
        }
        Some(m) if m.type_() == mime_guess::mime::VIDEO => {
            format!("<video src=\"{href}\" controls preload=\"metadata\"></video>\n")
        }
        _ => format!("<p><a href=\"{href}\">attachment</a></p>\n"),
    }
}

fn format_date(date_ms: i64) -> String {
    let format =
        format_description::parse("[year]-[month]-[day] [hour]:[minute]").expect("static format");
    OffsetDateTime::from_unix_timestamp(date_ms / 1000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
        .format(&format)
        .unwrap_or_else(|_| String::new())
}
