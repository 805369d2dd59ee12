//! Normalization of fetched documents into comparison-ready snapshots.
//!
//! A target's raw document is reduced to a [`String`] that only changes when
//! the document changes in substance. Two fetches of the same logical
//! content must normalize to byte-identical output regardless of item order,
//! whitespace, attribute order, harmless entity escaping or feed-level
//! timestamps.
//!
//! # Kinds
//!
//! - [`Kind::RssMin`] - RSS 2.0 / Atom feeds, reduced to a sorted record
//!   stream of item title, link, id, date and body
//! - [`Kind::OpenApiC14nV1`] - OpenAPI YAML, re-rendered as key-sorted JSON
//!
//! # Feed extraction chain
//!
//! Feeds are extracted by the first stage that succeeds:
//!
//! 1. [`structural`] - strict XML parse of the text as fetched
//! 2. [`repair`] - strip illegal control characters, escape bare `&`, and
//!    parse strictly once more
//! 3. [`fallback`] - pattern-based extraction of `<item>`/`<entry>` blocks,
//!    which cannot fail
//!
//! None of this ever returns an error to the caller. The worst case is an
//! empty item list (feeds) or the untouched input (OpenAPI).
//!
//! # Example
//!
//! ```
//! use driftfeed::normalize::{normalize, Kind, NormalizeOptions};
//!
//! let xml = "<rss><channel><item><title>A &amp; B</title><link>http://x/1</link>\
//!            <guid>1</guid><pubDate>Mon</pubDate><description>hi</description></item></channel></rss>";
//! let canonical = normalize(xml, Kind::RssMin, &NormalizeOptions::default());
//! assert_eq!(canonical, "#ITEM\ntitle: A & B\nlink: http://x/1\nid: 1\ndate: Mon\nbody: hi\n");
//! ```

mod canonical;
mod fallback;
mod openapi;
mod repair;
mod structural;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use canonical::render_items;
pub use fallback::extract_fallback;
pub use openapi::canonicalize_openapi;
pub use repair::repair_xml;
pub use structural::extract_structural;

/// Default cut-off for item bodies, in characters.
pub const DEFAULT_BODY_LIMIT: usize = 5000;

/// Default cap on `<item>` (and, separately, `<entry>`) blocks the fallback
/// extractor will look at.
pub const DEFAULT_MAX_FALLBACK_ITEMS: usize = 200;

/// How a target's document is normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    /// RSS/Atom feed reduced to its items.
    #[serde(rename = "rss_min")]
    RssMin,
    /// OpenAPI YAML rendered as canonical JSON.
    #[serde(rename = "openapi_c14n_v1")]
    OpenApiC14nV1,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::RssMin => "rss_min",
            Kind::OpenApiC14nV1 => "openapi_c14n_v1",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalization kind name that is not recognized.
#[derive(Debug, Error)]
#[error("Unknown normalization kind '{0}' (expected rss_min or openapi_c14n_v1)")]
pub struct UnknownKind(pub String);

impl FromStr for Kind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "rss_min" => Ok(Kind::RssMin),
            "openapi_c14n_v1" => Ok(Kind::OpenApiC14nV1),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Limits applied during normalization.
///
/// Passed explicitly to every call so output depends only on
/// `(text, kind, options)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Item bodies are cut to this many characters.
    pub body_limit: usize,
    /// Maximum number of blocks of each kind the fallback extractor reads.
    pub max_fallback_items: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            body_limit: DEFAULT_BODY_LIMIT,
            max_fallback_items: DEFAULT_MAX_FALLBACK_ITEMS,
        }
    }
}

/// One feed entry as seen by the comparison.
///
/// Every field is whitespace-normalized text and defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub id: String,
    pub date: String,
    pub body: String,
}

/// The extraction stage that produced a feed's items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The text parsed as well-formed XML as fetched.
    Strict,
    /// The text parsed after [`repair_xml`].
    Repaired,
    /// Neither parse succeeded; items came from pattern matching.
    Fallback,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Strict => "strict",
            Stage::Repaired => "repaired",
            Stage::Fallback => "fallback",
        }
    }
}

/// Items extracted from a feed and the stage that produced them.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub stage: Stage,
    pub items: Vec<FeedItem>,
}

/// Normalize `text` according to `kind`.
///
/// Pure and idempotent: identical inputs always give byte-identical output.
/// Never fails; see the module docs for how each kind degrades.
pub fn normalize(text: &str, kind: Kind, options: &NormalizeOptions) -> String {
    match kind {
        Kind::RssMin => normalize_feed(text, options),
        Kind::OpenApiC14nV1 => canonicalize_openapi(text),
    }
}

/// Normalize an RSS/Atom document into its canonical record stream.
pub fn normalize_feed(text: &str, options: &NormalizeOptions) -> String {
    let extraction = extract_items(text, options);
    render_items(extraction.items, options.body_limit)
}

/// Run the extraction chain: strict parse, repaired parse, then fallback.
pub fn extract_items(text: &str, options: &NormalizeOptions) -> Extraction {
    if let Some(items) = extract_structural(text) {
        return finish(Stage::Strict, items);
    }

    let repaired = repair_xml(text);
    if let Some(items) = extract_structural(&repaired) {
        return finish(Stage::Repaired, items);
    }

    let items = extract_fallback(&repaired, options.max_fallback_items);
    finish(Stage::Fallback, items)
}

fn finish(stage: Stage, items: Vec<FeedItem>) -> Extraction {
    tracing::debug!(stage = stage.as_str(), items = items.len(), "Extracted feed items");
    Extraction { stage, items }
}
