//! Utility functions shared by the normalizer and the pipeline around it.
//!
//! - **Text processing**: whitespace collapsing, HTML entity decoding,
//!   XML-illegal character stripping and character-count truncation
//! - **URL validation**: scheme and host checks for configured targets
//! - **Filesystem**: atomic write-then-rename for state and feed files
//!
//! # Examples
//!
//! ```
//! use driftfeed::util::{normalize_whitespace, truncate_chars, unescape_html};
//!
//! let text = normalize_whitespace(&unescape_html("  Tom &amp;\n Jerry "));
//! assert_eq!(text, "Tom & Jerry");
//! assert_eq!(truncate_chars(&text, 3), "Tom");
//! ```

mod fs;
mod text;
mod url_validator;

pub use fs::atomic_write;
pub use text::{
    is_xml_illegal, normalize_whitespace, strip_xml_illegal_chars, truncate_chars,
    truncate_with_marker, unescape_html, TRUNCATION_MARKER,
};
pub use url_validator::{validate_target_url, HostPolicy, UrlValidationError};
