//! RSS 2.0 output of recorded change events.
//!
//! [`publish`] writes two feeds into the output directory:
//!
//! - `feed.xml` - every retained event, newest first
//! - `feed_important.xml` - only Breaking and High impact events

mod base_url;
mod rss;

use std::path::Path;
use thiserror::Error;

use crate::storage::ChangeEvent;
use crate::util::atomic_write;

pub use base_url::{base_url_from_env, resolve_base_url, LOCAL_BASE_URL};
pub use rss::{cdata_safe, render_rss, ChannelMeta};

/// Default cut-off for diff excerpts in item descriptions, in characters.
pub const DEFAULT_EXCERPT_LIMIT: usize = 2000;

pub const FEED_FILE: &str = "feed.xml";
pub const IMPORTANT_FEED_FILE: &str = "feed_important.xml";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to render feed: {0}")]
    Xml(String),

    #[error("Failed to write feed: {0}")]
    Write(String),
}

/// Render and atomically write both feeds into `out_dir`.
pub fn publish(
    out_dir: &Path,
    channel: &ChannelMeta,
    events: &[ChangeEvent],
    excerpt_limit: usize,
) -> Result<(), PublishError> {
    let all = render_rss(channel, events, excerpt_limit)?;
    write_feed(&out_dir.join(FEED_FILE), &all)?;

    let important: Vec<ChangeEvent> = events
        .iter()
        .filter(|e| e.impact.is_important())
        .cloned()
        .collect();
    let important_channel = ChannelMeta {
        title: format!("{} (Breaking/High)", channel.title),
        ..channel.clone()
    };
    let important_xml = render_rss(&important_channel, &important, excerpt_limit)?;
    write_feed(&out_dir.join(IMPORTANT_FEED_FILE), &important_xml)?;

    tracing::info!(
        out_dir = %out_dir.display(),
        events = events.len(),
        important = important.len(),
        "Feeds published"
    );
    Ok(())
}

fn write_feed(path: &Path, xml: &str) -> Result<(), PublishError> {
    atomic_write(path, xml.as_bytes()).map_err(|e| PublishError::Write(format!("{e:#}")))
}
