//! HTML renderer output: escaping, media embedding, subdirectory path
//! prefixes, and the index page.

use chanvault_core::archive_db::{ChannelRow, MessageRow};
use chanvault_core::html_render::{HtmlRenderer, IndexEntry, ViewRenderer};
use tempfile::TempDir;

fn channel(handle: &str, title: &str, avatar: Option<&str>) -> ChannelRow {
    ChannelRow {
        id: 1,
        feed_id: 1001,
        title: title.to_string(),
        handle: handle.to_string(),
        folder_path: format!("downloads/{handle}"),
        avatar_path: avatar.map(str::to_string),
    }
}

fn message(feed_msg_id: i64, body: Option<&str>, media_path: Option<&str>) -> MessageRow {
    MessageRow {
        id: feed_msg_id,
        channel_id: 1,
        feed_msg_id,
        date_ms: 1_705_276_800_000,
        body: body.map(str::to_string),
        media_path: media_path.map(str::to_string),
        grouped_id: None,
    }
}

#[tokio::test]
async fn channel_page_escapes_bodies_and_prefixes_media() {
    let tmp = TempDir::new().unwrap();
    let renderer = HtmlRenderer::new(tmp.path().to_path_buf());

    let chan = channel("news", "News <One> & Co", Some("downloads/news/profile.jpg"));
    let messages = vec![
        message(101, Some("a <b> & c\nsecond line"), None),
        message(102, None, Some("downloads/news/20240115_102.jpg")),
    ];
    renderer.render_channel_page(&chan, &messages).await.unwrap();

    let html = std::fs::read_to_string(tmp.path().join("channels/news.html")).unwrap();
    assert!(html.contains("a &lt;b&gt; &amp; c<br>second line"));
    assert!(html.contains("News &lt;One&gt; &amp; Co"));
    assert!(html.contains("src=\"../downloads/news/20240115_102.jpg\""));
    assert!(html.contains("<img"), "jpeg embeds as an image");
    assert!(html.contains("src=\"../downloads/news/profile.jpg\""));
}

#[tokio::test]
async fn media_embed_follows_mime_type() {
    let tmp = TempDir::new().unwrap();
    let renderer = HtmlRenderer::new(tmp.path().to_path_buf());

    let chan = channel("news", "News", None);
    let messages = vec![
        message(1, None, Some("downloads/news/a.mp4")),
        message(2, None, Some("downloads/news/b.pdf")),
    ];
    renderer.render_channel_page(&chan, &messages).await.unwrap();

    let html = std::fs::read_to_string(tmp.path().join("channels/news.html")).unwrap();
    assert!(html.contains("<video src=\"../downloads/news/a.mp4\""));
    assert!(html.contains("<a href=\"../downloads/news/b.pdf\">attachment</a>"));
}

#[tokio::test]
async fn index_lists_channels_with_counts() {
    let tmp = TempDir::new().unwrap();
    let renderer = HtmlRenderer::new(tmp.path().to_path_buf());

    let entries = vec![
        IndexEntry {
            channel: channel("news", "News", Some("downloads/news/profile.jpg")),
            message_count: 42,
        },
        IndexEntry {
            channel: channel("tech", "Tech & Tools", None),
            message_count: 0,
        },
    ];
    renderer.render_index_page(&entries).await.unwrap();

    let html = std::fs::read_to_string(tmp.path().join("index.html")).unwrap();
    assert!(html.contains("href=\"channels/news.html\""));
    assert!(html.contains("42 messages"));
    assert!(html.contains("Tech &amp; Tools"));
    assert!(html.contains("src=\"downloads/news/profile.jpg\""));
}

#[tokio::test]
async fn empty_index_reports_no_channels() {
    let tmp = TempDir::new().unwrap();
    let renderer = HtmlRenderer::new(tmp.path().to_path_buf());

    renderer.render_index_page(&[]).await.unwrap();

    let html = std::fs::read_to_string(tmp.path().join("index.html")).unwrap();
    assert!(html.contains("No channels archived yet"));
}
