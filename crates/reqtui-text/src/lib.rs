//! Grapheme-aware display width and line wrapping for response pane content.
//!
//! This crate underlies the Reflow & Raw-Dump Scheduler and the Search/Diff
//! decorators: both need to break pretty/raw/diff text into display lines at
//! a given pane width without splitting a grapheme cluster or misjudging the
//! width of wide/zero-width code points.

pub mod segment;
pub mod width;
#[cfg(feature = "term-probe")]
pub mod width_probe;
pub mod wrap;

pub use width::egc_width;
pub use wrap::{wrap_line, wrap_text, WrappedLine};

/// Grapheme cluster helpers shared by `wrap` and higher layers (search highlighting
/// needs cluster boundaries to avoid splitting a match mid-cluster).
pub mod grapheme {
    use crate::egc_width;
    use unicode_segmentation::UnicodeSegmentation;

    /// Iterate grapheme clusters in a line.
    pub fn iter(line: &str) -> impl Iterator<Item = &str> {
        line.graphemes(true)
    }

    /// Next grapheme boundary (returns `line.len()` if at or beyond the end).
    pub fn next_boundary(line: &str, byte: usize) -> usize {
        if byte >= line.len() {
            return line.len();
        }
        for (idx, _) in line.grapheme_indices(true) {
            if idx > byte {
                return idx;
            }
        }
        line.len()
    }

    /// Width in terminal cells of this grapheme cluster.
    pub fn cluster_width(g: &str) -> usize {
        egc_width(g) as usize
    }
}
