//! Minimal textual repairs for feeds that fail strict parsing.
//!
//! Two defects account for most broken real-world feeds: stray control bytes
//! and unescaped ampersands. Both are fixed without touching anything that
//! is already valid markup, and the repaired text gets exactly one more
//! strict parse.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

use crate::util::strip_xml_illegal_chars;

/// Matches what may follow `&` in a reference we leave alone: decimal,
/// lowercase-`x` hex, or a name of two or more alphanumerics.
fn reference_tail() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:#[0-9]+|#x[0-9A-Fa-f]+|[A-Za-z][A-Za-z0-9]+);")
            .expect("reference pattern is valid")
    })
}

/// Strip XML-illegal control characters, then escape bare `&` as `&amp;`.
///
/// An `&` already starting a numeric, hex or named reference is kept as is,
/// so valid markup passes through unchanged. Returns `Cow::Borrowed` when no
/// repair was needed.
///
/// # Examples
///
/// ```
/// use driftfeed::normalize::repair_xml;
///
/// assert_eq!(repair_xml("<t>R&D &amp; Q&#38;A\u{1}</t>"), "<t>R&amp;D &amp; Q&#38;A</t>");
/// ```
pub fn repair_xml(text: &str) -> Cow<'_, str> {
    let cleaned = strip_xml_illegal_chars(text);
    let escaped = match escape_bare_ampersands(&cleaned) {
        Cow::Borrowed(_) => None,
        Cow::Owned(escaped) => Some(escaped),
    };
    match escaped {
        Some(escaped) => Cow::Owned(escaped),
        None => cleaned,
    }
}

fn escape_bare_ampersands(text: &str) -> Cow<'_, str> {
    let pattern = reference_tail();
    let mut out: Option<String> = None;
    let mut copied = 0;

    for (pos, _) in text.match_indices('&') {
        if pattern.is_match(&text[pos + 1..]) {
            continue;
        }
        let buf = out.get_or_insert_with(|| String::with_capacity(text.len() + 16));
        buf.push_str(&text[copied..pos]);
        buf.push_str("&amp;");
        copied = pos + 1;
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&text[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(text),
    }
}
