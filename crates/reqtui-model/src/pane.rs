//! Response Pane State (spec §3, §4.6-§4.8): per-pane UI state that is not
//! part of a response snapshot — scroll position, active tab, search, wrap
//! cache, and the split/diff toggle.

use crate::snapshot::{ResponseSnapshot, SnapshotId, Tab};
use reqtui_text::wrap::WrappedLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub top_line: usize,
    pub height: usize,
}

impl Viewport {
    /// Clamp the top line so the viewport never scrolls past the last page
    /// (spec §4.6: "scroll position clamps to content length").
    pub fn clamp(&self, total_lines: usize) -> usize {
        if total_lines <= self.height {
            0
        } else {
            self.top_line.min(total_lines - self.height)
        }
    }
}

/// Follow mode keeps the viewport pinned to the newest content; any manual
/// scroll disengages it until re-armed (spec §4.6, testable property #8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowMode {
    Following,
    Pinned,
}

impl Default for FollowMode {
    fn default() -> Self {
        FollowMode::Following
    }
}

/// Cache of reflowed lines for a given (snapshot, width) pair; invalidated
/// whenever either changes (spec §4.7).
#[derive(Debug, Clone, Default)]
pub struct WrapCache {
    pub snapshot_id: Option<SnapshotId>,
    pub width: Option<u16>,
    pub lines: Vec<WrappedLine>,
}

impl WrapCache {
    pub fn is_valid_for(&self, snapshot_id: SnapshotId, width: u16) -> bool {
        self.snapshot_id == Some(snapshot_id) && self.width == Some(width)
    }

    pub fn store(&mut self, snapshot_id: SnapshotId, width: u16, lines: Vec<WrappedLine>) {
        self.snapshot_id = Some(snapshot_id);
        self.width = Some(width);
        self.lines = lines;
    }

    pub fn invalidate(&mut self) {
        self.snapshot_id = None;
        self.width = None;
        self.lines.clear();
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub query: String,
    pub active: bool,
    pub case_sensitive: bool,
    pub matches: Vec<(usize, usize)>,
    pub current_match: Option<usize>,
}

impl SearchState {
    pub fn advance(&mut self) {
        if self.matches.is_empty() {
            self.current_match = None;
            return;
        }
        self.current_match = Some(match self.current_match {
            Some(i) => (i + 1) % self.matches.len(),
            None => 0,
        });
    }

    pub fn retreat(&mut self) {
        if self.matches.is_empty() {
            self.current_match = None;
            return;
        }
        self.current_match = Some(match self.current_match {
            Some(0) => self.matches.len() - 1,
            Some(i) => i - 1,
            None => self.matches.len() - 1,
        });
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeadersView {
    pub show_request: bool,
}

#[derive(Debug, Default)]
pub struct ResponsePaneState {
    pub active_tab: Tab,
    pub viewport: Viewport,
    pub follow: FollowMode,
    pub wrap_cache: WrapCache,
    pub search: SearchState,
    pub headers_view: HeadersView,
    pub split: bool,
    pub snapshots: Vec<ResponseSnapshot>,
}

impl Default for Tab {
    fn default() -> Self {
        Tab::Pretty
    }
}

impl ResponsePaneState {
    pub fn current(&self) -> Option<&ResponseSnapshot> {
        self.snapshots.last()
    }

    /// Push a new snapshot, invalidating caches that are keyed on the old one
    /// (spec §4.7: reflow/raw-dump results carry a token tied to the snapshot
    /// id they were computed for).
    pub fn push_snapshot(&mut self, snapshot: ResponseSnapshot) {
        self.snapshots.push(snapshot);
        self.wrap_cache.invalidate();
        self.search = SearchState::default();
        if self.follow == FollowMode::Following {
            self.viewport.top_line = 0;
        }
    }

    /// Manual scroll disengages follow mode until explicitly re-armed.
    pub fn scroll_to(&mut self, line: usize) {
        self.viewport.top_line = line;
        self.follow = FollowMode::Pinned;
    }

    pub fn re_arm_follow(&mut self) {
        self.follow = FollowMode::Following;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_clamps_to_content_length() {
        let v = Viewport { top_line: 50, height: 10 };
        assert_eq!(v.clamp(20), 10);
        assert_eq!(v.clamp(5), 0);
    }

    #[test]
    fn manual_scroll_disengages_follow_mode() {
        let mut state = ResponsePaneState::default();
        assert_eq!(state.follow, FollowMode::Following);
        state.scroll_to(5);
        assert_eq!(state.follow, FollowMode::Pinned);
        state.re_arm_follow();
        assert_eq!(state.follow, FollowMode::Following);
    }

    #[test]
    fn search_advance_and_retreat_wrap_around() {
        let mut s = SearchState {
            matches: vec![(0, 1), (2, 3), (4, 5)],
            ..Default::default()
        };
        s.advance();
        assert_eq!(s.current_match, Some(0));
        s.retreat();
        assert_eq!(s.current_match, Some(2));
        s.retreat();
        assert_eq!(s.current_match, Some(1));
    }

    #[test]
    fn wrap_cache_invalidated_on_mismatch() {
        let mut cache = WrapCache::default();
        cache.store(SnapshotId(1), 80, vec![]);
        assert!(cache.is_valid_for(SnapshotId(1), 80));
        assert!(!cache.is_valid_for(SnapshotId(1), 81));
        assert!(!cache.is_valid_for(SnapshotId(2), 80));
    }
}
