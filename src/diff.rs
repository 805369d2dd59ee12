//! Unified diff snippets between two canonical snapshots.

use similar::TextDiff;

/// Default cap on snippet lines.
pub const DEFAULT_DIFF_MAX_LINES: usize = 200;

/// Lines of unchanged context around each hunk.
const CONTEXT_LINES: usize = 2;

/// Render a unified line diff from `old` to `new`.
///
/// Headers are `--- before` / `+++ after`. Output longer than `max_lines`
/// lines is cut and a final `...` line is appended. Identical inputs give an
/// empty string.
///
/// # Examples
///
/// ```
/// use driftfeed::diff::diff_snippet;
///
/// let snippet = diff_snippet("a\nb\n", "a\nc\n", 200);
/// assert!(snippet.contains("-b\n"));
/// assert!(snippet.contains("+c\n"));
/// ```
pub fn diff_snippet(old: &str, new: &str, max_lines: usize) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut unified = diff.unified_diff();
    unified.context_radius(CONTEXT_LINES).header("before", "after");
    let rendered = unified.to_string();

    let total = rendered.lines().count();
    if total <= max_lines {
        return rendered;
    }

    let mut cut: String = rendered
        .lines()
        .take(max_lines)
        .flat_map(|line| [line, "\n"])
        .collect();
    cut.push_str("...\n");
    tracing::debug!(total_lines = total, kept = max_lines, "Diff snippet truncated");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_identical_inputs_give_empty_snippet() {
        assert_eq!(diff_snippet("same\n", "same\n", 200), "");
    }

    #[test]
    fn test_snippet_has_headers_and_changes() {
        let old = "#ITEM\ntitle: Old\nlink: l\n";
        let new = "#ITEM\ntitle: New\nlink: l\n";
        let snippet = diff_snippet(old, new, 200);
        assert!(snippet.starts_with("--- before\n+++ after\n"), "{snippet}");
        assert!(snippet.contains("-title: Old\n"));
        assert!(snippet.contains("+title: New\n"));
    }

    #[test]
    fn test_context_is_limited() {
        let old: String = (0..20).map(|i| format!("line {i}\n")).collect();
        let new = old.replace("line 10\n", "line ten\n");
        let snippet = diff_snippet(&old, &new, 200);
        assert!(snippet.contains(" line 8\n"));
        assert!(!snippet.contains(" line 7\n"));
        assert!(snippet.contains(" line 12\n"));
        assert!(!snippet.contains(" line 13\n"));
    }

    #[test]
    fn test_long_snippet_is_capped() {
        let old: String = (0..50).map(|i| format!("old {i}\n")).collect();
        let new: String = (0..50).map(|i| format!("new {i}\n")).collect();
        let snippet = diff_snippet(&old, &new, 10);
        assert_eq!(snippet.lines().count(), 11);
        assert!(snippet.ends_with("...\n"));
    }
}
