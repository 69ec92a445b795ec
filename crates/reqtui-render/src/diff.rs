//! Search & Diff — diff half (spec §4.8): a unified diff between the
//! focused pane's snapshot and the other pane's, colorized by line kind,
//! with wrapping that repeats the `+`/`-`/` ` marker on continuation rows.
//!
//! Grounded on the `similar` crate's `TextDiff` (used for unified-diff
//! generation across the retrieval pack, e.g. `codex-rs/apply-patch`) for
//! the line-matching algorithm; the marker-aware wrapping is
//! `reqtui_text::wrap::wrap_marked_line`.

use reqtui_text::wrap::wrap_marked_line;
use similar::{ChangeTag, TextDiff};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLineKind {
    Context,
    Added,
    Removed,
    Hunk,
    Meta,
}

#[derive(Debug, Clone)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    /// Text without the leading marker column.
    pub text: String,
}

/// Which body pair to diff for a given active tab (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffSource {
    Raw,
    Headers,
    Pretty,
}

/// Builds a unified diff between `base` (focused pane) and `other`, with
/// ANSI escape sequences stripped from both inputs before comparison so
/// colorized bodies don't produce spurious hunks.
pub fn unified_diff(base_label: &str, base: &str, other_label: &str, other: &str) -> Vec<DiffLine> {
    let base = strip_ansi(base);
    let other = strip_ansi(other);

    let mut lines = vec![
        DiffLine { kind: DiffLineKind::Meta, text: format!("--- {base_label}") },
        DiffLine { kind: DiffLineKind::Meta, text: format!("+++ {other_label}") },
    ];

    let diff = TextDiff::from_lines(&base, &other);
    for group in diff.grouped_ops(3) {
        let (first, last) = (group.first().unwrap(), group.last().unwrap());
        lines.push(DiffLine {
            kind: DiffLineKind::Hunk,
            text: format!(
                "@@ -{},{} +{},{} @@",
                first.old_range().start + 1,
                first.old_range().len().max(1),
                first.new_range().start + 1,
                last.new_range().len().max(1),
            ),
        });
        for op in &group {
            for change in diff.iter_changes(op) {
                let kind = match change.tag() {
                    ChangeTag::Equal => DiffLineKind::Context,
                    ChangeTag::Insert => DiffLineKind::Added,
                    ChangeTag::Delete => DiffLineKind::Removed,
                };
                lines.push(DiffLine {
                    kind,
                    text: change.value().trim_end_matches('\n').to_string(),
                });
            }
        }
    }
    lines
}

/// For the Headers tab, diff pretty bodies plus a labelled headers section
/// appended below (spec §4.8).
pub fn unified_diff_with_headers(
    base_label: &str,
    base_pretty: &str,
    base_headers: &str,
    other_label: &str,
    other_pretty: &str,
    other_headers: &str,
) -> Vec<DiffLine> {
    let mut lines = unified_diff(base_label, base_pretty, other_label, other_pretty);
    lines.push(DiffLine { kind: DiffLineKind::Meta, text: "--- headers ---".to_string() });
    lines.extend(unified_diff(base_label, base_headers, other_label, other_headers));
    lines
}

/// Wraps a diff for display, repeating the leading marker character on
/// continuation rows (spec §4.8: "wrapping preserves leading `+`, `-`, ` `
/// markers on continuation segments").
pub fn wrap_diff(lines: &[DiffLine], width: u16) -> Vec<(DiffLineKind, String)> {
    let width = width as usize;
    lines
        .iter()
        .flat_map(|line| {
            let marker = match line.kind {
                DiffLineKind::Added => '+',
                DiffLineKind::Removed => '-',
                DiffLineKind::Context => ' ',
                DiffLineKind::Hunk | DiffLineKind::Meta => {
                    return vec![(line.kind, line.text.clone())];
                }
            };
            wrap_marked_line(&line.text, width, marker)
                .into_iter()
                .map(|row| (line.kind, row))
                .collect()
        })
        .collect()
}

fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_marks_added_and_removed_lines() {
        let lines = unified_diff("a", "one\ntwo\n", "b", "one\nthree\n");
        assert!(lines.iter().any(|l| matches!(l.kind, DiffLineKind::Removed) && l.text == "two"));
        assert!(lines.iter().any(|l| matches!(l.kind, DiffLineKind::Added) && l.text == "three"));
        assert!(lines.iter().any(|l| matches!(l.kind, DiffLineKind::Context) && l.text == "one"));
    }

    #[test]
    fn identical_bodies_produce_no_changes() {
        let lines = unified_diff("a", "same\n", "b", "same\n");
        assert!(!lines.iter().any(|l| matches!(l.kind, DiffLineKind::Added | DiffLineKind::Removed)));
    }

    #[test]
    fn ansi_sequences_are_stripped_before_diffing() {
        let colored = "\u{1b}[31mred\u{1b}[0m\n";
        let lines = unified_diff("a", colored, "b", "red\n");
        assert!(!lines.iter().any(|l| matches!(l.kind, DiffLineKind::Added | DiffLineKind::Removed)));
    }

    #[test]
    fn wrap_diff_repeats_marker_on_continuation() {
        let lines = vec![DiffLine { kind: DiffLineKind::Added, text: "abcdefgh".to_string() }];
        let wrapped = wrap_diff(&lines, 4);
        assert!(wrapped.iter().all(|(_, text)| text.starts_with('+')));
        assert_eq!(wrapped.len(), 3);
    }
}
