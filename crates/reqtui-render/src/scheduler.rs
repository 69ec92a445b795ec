//! Reflow & Raw-Dump Scheduler (spec §4.7, §5).
//!
//! A background job is tagged with a monotonically increasing token plus the pane state
//! it was computed against, and its completion is accepted only if that
//! state still matches when it arrives. Here the "job" is either a debounced
//! rewrap of heavy raw content or an async hex/base64 dump, not a terminal
//! repaint, so there is no delta-merging step — just token issuance and
//! acceptance.

use std::time::Duration;

use reqtui_model::snapshot::{RawMode, SnapshotId, Tab};

/// Reflow is debounced by ~100ms after a viewport width change (spec §4.7).
pub const REFLOW_DEBOUNCE: Duration = Duration::from_millis(100);

/// Opaque monotonic token identifying one scheduled job. Each call to
/// `next()` invalidates every token issued before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchedToken(pub u64);

/// The pane state a reflow or raw-dump job was computed against. A
/// completion is applied only when every field still matches (spec §4.7:
/// "the token, tab, width, raw-mode, headers-view, and snapshot id all
/// match").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflowKey {
    pub token: SchedToken,
    pub snapshot_id: SnapshotId,
    pub tab: Tab,
    pub width: u16,
    pub raw_mode: RawMode,
    pub headers_view: bool,
}

/// Issues tokens for reflow and raw-dump jobs for a single pane. A new
/// request always supersedes the previous one: only the latest issued token
/// is ever considered current.
#[derive(Debug, Default)]
pub struct ReflowScheduler {
    next: u64,
    current: Option<ReflowKey>,
}

impl ReflowScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a new reflow job, returning the key the caller should tag
    /// its background task with and hand back to `accept` on completion.
    pub fn schedule(
        &mut self,
        snapshot_id: SnapshotId,
        tab: Tab,
        width: u16,
        raw_mode: RawMode,
        headers_view: bool,
    ) -> ReflowKey {
        self.next += 1;
        let key = ReflowKey {
            token: SchedToken(self.next),
            snapshot_id,
            tab,
            width,
            raw_mode,
            headers_view,
        };
        self.current = Some(key);
        key
    }

    /// True if `key` is still the most recently scheduled job for this pane
    /// (spec §4.7: "out-of-date completions are discarded").
    pub fn accept(&self, key: ReflowKey) -> bool {
        self.current == Some(key)
    }
}

/// Same token-acceptance contract as `ReflowScheduler`, tracked separately
/// per pane since a raw dump and a reflow can be in flight independently.
pub type RawDumpScheduler = ReflowScheduler;
pub type RawDumpKey = ReflowKey;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_completion_is_rejected() {
        let mut sched = ReflowScheduler::new();
        let first = sched.schedule(SnapshotId(1), Tab::Raw, 80, RawMode::Hex, false);
        let second = sched.schedule(SnapshotId(1), Tab::Raw, 100, RawMode::Hex, false);
        assert!(!sched.accept(first));
        assert!(sched.accept(second));
    }

    #[test]
    fn mismatched_field_is_rejected_even_for_latest_token() {
        let mut sched = ReflowScheduler::new();
        let key = sched.schedule(SnapshotId(1), Tab::Raw, 80, RawMode::Hex, false);
        let drifted = ReflowKey { width: 81, ..key };
        assert!(!sched.accept(drifted));
        assert!(sched.accept(key));
    }

    #[test]
    fn tokens_increase_monotonically() {
        let mut sched = ReflowScheduler::new();
        let a = sched.schedule(SnapshotId(1), Tab::Raw, 80, RawMode::Hex, false);
        let b = sched.schedule(SnapshotId(1), Tab::Raw, 80, RawMode::Hex, false);
        assert!(b.token > a.token);
    }
}
