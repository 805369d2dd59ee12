use std::borrow::Cow;

use quick_xml::escape::resolve_html5_entity;

/// Marker appended by [`truncate_with_marker`] callers when an excerpt is cut.
pub const TRUNCATION_MARKER: &str = "...(truncated)";

/// Longest character reference body we try to decode (`&` and `;` excluded).
/// The longest HTML5 entity name is 31 characters.
const MAX_REFERENCE_LEN: usize = 32;

/// Characters that carry no visible content but defeat byte-level comparison.
const ZERO_WIDTH: [char; 4] = ['\u{200b}', '\u{200c}', '\u{200d}', '\u{feff}'];

/// Returns true for characters that XML 1.0 forbids in documents.
///
/// Tab, newline and carriage return are allowed; every other C0 control
/// and DEL is not.
#[inline]
pub fn is_xml_illegal(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{7f}')
}

/// Strip characters that are illegal in XML 1.0 documents.
///
/// Removes 0x00-0x08, 0x0B-0x0C, 0x0E-0x1F and 0x7F. Preserves tab (0x09),
/// newline (0x0A) and carriage return (0x0D).
///
/// Returns `Cow::Borrowed` when the input contains no illegal characters,
/// which is the overwhelmingly common case for real feeds.
///
/// # Examples
///
/// ```
/// use driftfeed::util::strip_xml_illegal_chars;
///
/// assert_eq!(strip_xml_illegal_chars("a\u{0}b\u{7f}c\td"), "abc\td");
/// ```
pub fn strip_xml_illegal_chars(s: &str) -> Cow<'_, str> {
    // Fast path: a single byte scan, every illegal char is a single ASCII byte
    let needs_strip = s
        .bytes()
        .any(|b| b == 0x7f || (b < 0x20 && b != 0x09 && b != 0x0a && b != 0x0d));

    if !needs_strip {
        return Cow::Borrowed(s);
    }

    Cow::Owned(s.chars().filter(|&c| !is_xml_illegal(c)).collect())
}

/// Collapse whitespace so two renderings of the same text compare equal.
///
/// Zero-width characters (U+200B, U+200C, U+200D, U+FEFF) are removed first,
/// then every run of Unicode whitespace becomes a single space and both ends
/// are trimmed.
///
/// # Examples
///
/// ```
/// use driftfeed::util::normalize_whitespace;
///
/// assert_eq!(normalize_whitespace("  Hello\n\t world\u{200b} "), "Hello world");
/// ```
pub fn normalize_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;

    for c in s.chars() {
        if ZERO_WIDTH.contains(&c) {
            continue;
        }
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }

    out
}

/// Decode HTML character references.
///
/// Handles decimal (`&#38;`), hexadecimal (`&#x26;`) and named HTML5
/// references (`&amp;`, `&nbsp;`, `&hellip;`, ...). As browsers do, numeric
/// references may omit the trailing `;`, and so may the legacy named
/// references such as `&copy` or `&amp`, which also match as the longest
/// prefix of a longer name (`&ampx` is `&x`). Anything else is copied through
/// verbatim, so this never fails.
///
/// Numeric references to U+0000, surrogates or values outside the Unicode
/// scalar range decode to U+FFFD.
///
/// # Examples
///
/// ```
/// use driftfeed::util::unescape_html;
///
/// assert_eq!(unescape_html("A &amp; B &#8212; &#x41; &bogus; &"), "A & B \u{2014} A &bogus; &");
/// assert_eq!(unescape_html("&copy 2024"), "\u{a9} 2024");
/// ```
pub fn unescape_html(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match decode_reference(tail) {
            Some((decoded, consumed)) => {
                out.push_str(&decoded);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);

    Cow::Owned(out)
}

/// Named references that are recognized without a trailing `;`.
const LEGACY_ENTITIES: [&str; 106] = [
    "AElig", "AMP", "Aacute", "Acirc", "Agrave", "Aring", "Atilde", "Auml", "COPY", "Ccedil",
    "ETH", "Eacute", "Ecirc", "Egrave", "Euml", "GT", "Iacute", "Icirc", "Igrave", "Iuml", "LT",
    "Ntilde", "Oacute", "Ocirc", "Ograve", "Oslash", "Otilde", "Ouml", "QUOT", "REG", "THORN",
    "Uacute", "Ucirc", "Ugrave", "Uuml", "Yacute", "aacute", "acirc", "acute", "aelig", "agrave",
    "amp", "aring", "atilde", "auml", "brvbar", "ccedil", "cedil", "cent", "copy", "curren",
    "deg", "divide", "eacute", "ecirc", "egrave", "eth", "euml", "frac12", "frac14", "frac34",
    "gt", "iacute", "icirc", "iexcl", "igrave", "iquest", "iuml", "laquo", "lt", "macr",
    "micro", "middot", "nbsp", "not", "ntilde", "oacute", "ocirc", "ograve", "ordf", "ordm",
    "oslash", "otilde", "ouml", "para", "plusmn", "pound", "quot", "raquo", "reg", "sect", "shy",
    "sup1", "sup2", "sup3", "szlig", "thorn", "times", "uacute", "ucirc", "ugrave", "uml", "uuml",
    "yacute", "yen", "yuml",
];

/// Decode the reference at the start of `tail` (which begins with `&`).
///
/// Returns the replacement text and the number of bytes consumed, including
/// a trailing `;` when present.
fn decode_reference(tail: &str) -> Option<(Cow<'static, str>, usize)> {
    let window = &tail[1..];

    if let Some(number) = window.strip_prefix('#') {
        let (digits, radix, prefix_len) = match number.strip_prefix(['x', 'X']) {
            Some(hex) => (hex, 16, 2),
            None => (number, 10, 1),
        };
        let len = digits
            .bytes()
            .take_while(|b| if radix == 16 { b.is_ascii_hexdigit() } else { b.is_ascii_digit() })
            .count();
        if len == 0 {
            return None;
        }
        let code = u32::from_str_radix(&digits[..len], radix).ok();
        let c = code
            .filter(|&n| n != 0)
            .and_then(char::from_u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        let semicolon = usize::from(digits[len..].starts_with(';'));
        return Some((Cow::Owned(c.to_string()), 1 + prefix_len + len + semicolon));
    }

    let name_len: usize = window
        .chars()
        .take(MAX_REFERENCE_LEN)
        .take_while(|c| !matches!(c, '\t' | '\n' | '\u{c}' | ' ' | '<' | '&' | '#' | ';'))
        .map(char::len_utf8)
        .sum();
    if name_len == 0 {
        return None;
    }
    let name = &window[..name_len];

    if window[name_len..].starts_with(';') {
        if let Some(decoded) = resolve_html5_entity(name) {
            return Some((Cow::Borrowed(decoded), name_len + 2));
        }
    }

    // Longest legacy name the text starts with
    (2..=name.len())
        .rev()
        .filter(|&end| name.is_char_boundary(end))
        .find_map(|end| {
            let prefix = &name[..end];
            if !LEGACY_ENTITIES.contains(&prefix) {
                return None;
            }
            resolve_html5_entity(prefix).map(|decoded| (Cow::Borrowed(decoded), end + 1))
        })
}

/// Cut `s` to at most `limit` characters (Unicode scalar values).
///
/// This is a hard prefix cut with no marker. Returns `Cow::Borrowed` when the
/// string already fits.
///
/// # Examples
///
/// ```
/// use driftfeed::util::truncate_chars;
///
/// assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
/// assert_eq!(truncate_chars("short", 5), "short");
/// ```
pub fn truncate_chars(s: &str, limit: usize) -> Cow<'_, str> {
    match s.char_indices().nth(limit) {
        Some((cut, _)) => Cow::Owned(s[..cut].to_string()),
        None => Cow::Borrowed(s),
    }
}

/// Cut `s` to at most `limit` characters and append `marker` if anything was
/// removed.
///
/// The marker is not counted against `limit`.
pub fn truncate_with_marker<'a>(s: &'a str, limit: usize, marker: &str) -> Cow<'a, str> {
    match truncate_chars(s, limit) {
        Cow::Borrowed(whole) => Cow::Borrowed(whole),
        Cow::Owned(mut cut) => {
            cut.push_str(marker);
            Cow::Owned(cut)
        }
    }
}
