//! Pattern-based extraction for feeds that are not XML even after repair.
//!
//! Each `<item>` or `<entry>` block is located and mined independently, so a
//! block that is well-formed on its own survives breakage elsewhere in the
//! document. Missing or mangled tags leave the corresponding field empty;
//! nothing here can fail.

use regex::Regex;
use std::sync::OnceLock;

use super::FeedItem;
use crate::util::{normalize_whitespace, unescape_html};

/// Tags whose text the extractor may ask for.
const TAGS: [&str; 10] = [
    "title",
    "link",
    "guid",
    "pubDate",
    "description",
    "id",
    "updated",
    "published",
    "summary",
    "content",
];

struct Patterns {
    item_block: Regex,
    entry_block: Regex,
    link_tag: Regex,
    attribute: Regex,
    cdata: Regex,
    markup: Regex,
    tags: Vec<(&'static str, Regex)>,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |p: &str| Regex::new(p).expect("fallback pattern is valid");
        Patterns {
            item_block: compile(r"(?is)<item\b.*?>.*?</item>"),
            entry_block: compile(r"(?is)<entry\b.*?>.*?</entry>"),
            link_tag: compile(r"(?i)<link\b[^>]*>"),
            attribute: compile(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#),
            cdata: compile(r"(?s)^\s*<!\[CDATA\[(.*)\]\]>\s*$"),
            markup: compile(r"<[^>]+>"),
            tags: TAGS
                .iter()
                .map(|&tag| {
                    let tag_re = regex::escape(tag);
                    (tag, compile(&format!(r"(?is)<{tag_re}[^>]*>(.*?)</{tag_re}>")))
                })
                .collect(),
        }
    })
}

/// Extract items from arbitrary text by matching `<item>` and `<entry>`
/// blocks.
///
/// At most `max_items` RSS blocks and `max_items` Atom blocks are read.
/// RSS items come first, then Atom entries, each in document order.
pub fn extract_fallback(text: &str, max_items: usize) -> Vec<FeedItem> {
    let p = patterns();
    let mut items = Vec::new();

    for block in p.item_block.find_iter(text).take(max_items) {
        let block = block.as_str();
        items.push(FeedItem {
            title: tag_text(block, "title"),
            link: tag_text(block, "link"),
            id: tag_text(block, "guid"),
            date: tag_text(block, "pubDate"),
            body: tag_text(block, "description"),
        });
    }

    for block in p.entry_block.find_iter(text).take(max_items) {
        let block = block.as_str();
        items.push(FeedItem {
            title: tag_text(block, "title"),
            link: atom_link(block),
            id: tag_text(block, "id"),
            date: first_non_empty(block, "updated", "published"),
            body: first_non_empty(block, "summary", "content"),
        });
    }

    tracing::debug!(items = items.len(), "Fallback extraction finished");
    items
}

/// Text content of the first `<tag>...</tag>` in `block`.
///
/// A CDATA section wrapping the whole content is unwrapped, HTML entities
/// are decoded, remaining markup is replaced by spaces and whitespace is
/// collapsed. Returns an empty string when the tag is absent.
fn tag_text(block: &str, tag: &str) -> String {
    let p = patterns();
    let Some(pattern) = p.tags.iter().find(|(t, _)| *t == tag).map(|(_, re)| re) else {
        return String::new();
    };
    let Some(inner) = pattern.captures(block).and_then(|c| c.get(1)) else {
        return String::new();
    };

    let mut raw = inner.as_str();
    if let Some(unwrapped) = p.cdata.captures(raw).and_then(|c| c.get(1)) {
        raw = unwrapped.as_str();
    }

    let decoded = unescape_html(raw);
    let stripped = p.markup.replace_all(&decoded, " ");
    normalize_whitespace(&stripped)
}

fn first_non_empty(block: &str, primary: &str, secondary: &str) -> String {
    let text = tag_text(block, primary);
    if text.is_empty() {
        tag_text(block, secondary)
    } else {
        text
    }
}

/// Href of the entry's `rel="alternate"` link, else of any link with an
/// href, else the text of a `<link>` element.
fn atom_link(block: &str) -> String {
    let p = patterns();
    let mut first_href: Option<&str> = None;

    for tag in p.link_tag.find_iter(block) {
        let mut href = None;
        let mut rel = None;
        for caps in p.attribute.captures_iter(tag.as_str()) {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str());
            match &caps[1] {
                name if name.eq_ignore_ascii_case("href") => href = Some(value),
                name if name.eq_ignore_ascii_case("rel") => rel = Some(value),
                _ => {}
            }
        }

        let Some(href) = href.filter(|h| !h.is_empty()) else {
            continue;
        };
        if rel.is_some_and(|r| r.trim().eq_ignore_ascii_case("alternate")) {
            return clean_href(href);
        }
        first_href.get_or_insert(href);
    }

    match first_href {
        Some(href) => clean_href(href),
        None => tag_text(block, "link"),
    }
}

fn clean_href(href: &str) -> String {
    normalize_whitespace(&unescape_html(href))
}
