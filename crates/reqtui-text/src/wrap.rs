//! Width-aware line wrapping.
//!
//! Used by the Reflow scheduler (pretty/raw/headers content) and by the Diff
//! renderer (unified-diff bodies, where a leading `+`/`-`/` ` marker must be
//! repeated on every continuation row — see spec §4.8).

use crate::egc_width;
use unicode_segmentation::UnicodeSegmentation;

/// A single visual row produced by wrapping one logical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedLine {
    pub text: String,
    /// False for the first visual row of a logical line, true for any row
    /// produced purely by width overflow.
    pub is_continuation: bool,
}

/// Break `line` (assumed to contain no `\n`) into rows no wider than `width`
/// terminal cells, never splitting a grapheme cluster. `width == 0` is
/// treated as "no wrapping" and returns the line whole.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    if width == 0 || line.is_empty() {
        return vec![line.to_string()];
    }
    let mut rows = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;
    for g in line.graphemes(true) {
        let w = egc_width(g) as usize;
        if current_width + w > width && !current.is_empty() {
            rows.push(std::mem::take(&mut current));
            current_width = 0;
        }
        current.push_str(g);
        current_width += w;
    }
    rows.push(current);
    rows
}

/// Wrap a full (possibly multi-line) text blob at `width`, preserving logical
/// line boundaries and marking overflow continuations.
pub fn wrap_text(text: &str, width: usize) -> Vec<WrappedLine> {
    let mut out = Vec::new();
    for logical in text.split('\n') {
        let rows = wrap_line(logical, width);
        for (idx, row) in rows.into_iter().enumerate() {
            out.push(WrappedLine {
                text: row,
                is_continuation: idx > 0,
            });
        }
    }
    out
}

/// Wrap a diff line whose first column is a marker (`+`, `-`, or ` `) so that
/// every continuation row repeats the marker instead of leaving it blank.
/// `content` excludes the marker; `width` is the total row budget including
/// the marker column.
pub fn wrap_marked_line(content: &str, width: usize, marker: char) -> Vec<String> {
    let marker_str = marker.to_string();
    let marker_width = egc_width(&marker_str) as usize;
    let body_width = width.saturating_sub(marker_width).max(1);
    wrap_line(content, body_width)
        .into_iter()
        .map(|row| format!("{marker}{row}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_line_respects_width() {
        let rows = wrap_line("abcdefgh", 3);
        assert_eq!(rows, vec!["abc", "def", "gh"]);
    }

    #[test]
    fn wrap_line_never_splits_wide_cluster() {
        // Emoji is width 2; a width-3 budget must not cut it mid-cluster.
        let rows = wrap_line("a😀bc", 3);
        assert!(rows.iter().all(|r| r.chars().count() <= r.len()));
        let joined: String = rows.concat();
        assert_eq!(joined, "a😀bc");
    }

    #[test]
    fn wrap_line_zero_width_is_noop() {
        assert_eq!(wrap_line("hello", 0), vec!["hello".to_string()]);
    }

    #[test]
    fn wrap_text_marks_continuations() {
        let rows = wrap_text("hello\nworld", 3);
        let flags: Vec<bool> = rows.iter().map(|r| r.is_continuation).collect();
        assert_eq!(flags, vec![false, true, false, true]);
    }

    #[test]
    fn wrap_marked_line_preserves_marker_on_continuations() {
        let rows = wrap_marked_line("abcdefgh", 4, '+');
        assert!(rows.iter().all(|r| r.starts_with('+')));
        assert_eq!(rows[0], "+abc");
        assert_eq!(rows[1], "+def");
        assert_eq!(rows[2], "+gh");
    }

    proptest::proptest! {
        #[test]
        fn wrap_line_preserves_content(s in "[a-zA-Z0-9 ]{0,64}", width in 1usize..20) {
            let rows = wrap_line(&s, width);
            let joined: String = rows.concat();
            proptest::prop_assert_eq!(joined, s);
        }
    }
}
