//! Response Snapshot (spec §3) — the immutable-ish view a pane renders.

use crate::headers::Headers;
use crate::response::{StreamInfo, Timeline, TraceReport};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Text,
    Binary,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct BodyMeta {
    pub kind: BodyKind,
    pub printable: bool,
    pub mime: Option<String>,
    pub charset: Option<String>,
    pub size: usize,
    pub decode_err: Option<String>,
    pub preview_hex: Option<String>,
    pub preview_base64: Option<String>,
}

/// Threshold above which hex/base64 dumps defer to an async loader
/// (spec: "Heavy body", glossary).
pub const HEAVY_BODY_THRESHOLD: usize = 128 * 1024;

impl BodyMeta {
    pub fn is_heavy(&self) -> bool {
        self.size > HEAVY_BODY_THRESHOLD
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawMode {
    Text,
    Hex,
    Base64,
    Summary,
}

impl RawMode {
    /// Allowed raw-view modes for a given body, in cycle order (spec §4.6,
    /// testable property #7).
    pub fn allowed_modes(printable: bool, heavy: bool) -> Vec<RawMode> {
        if printable {
            vec![RawMode::Text, RawMode::Hex, RawMode::Base64]
        } else if heavy {
            vec![RawMode::Summary, RawMode::Hex, RawMode::Base64]
        } else {
            vec![RawMode::Hex, RawMode::Base64]
        }
    }

    /// Next mode in the cycle, clamping to the first allowed mode when the
    /// current mode is not in the allowed set.
    pub fn cycle_next(current: RawMode, allowed: &[RawMode]) -> RawMode {
        if allowed.is_empty() {
            return current;
        }
        match allowed.iter().position(|m| *m == current) {
            Some(idx) => allowed[(idx + 1) % allowed.len()],
            None => allowed[0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsKind {
    None,
    Profile,
    Workflow,
}

#[derive(Debug, Clone)]
pub struct LatencyStats {
    pub min: Duration,
    pub p50: Duration,
    pub p90: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub median: Duration,
    pub stddev_micros: f64,
}

#[derive(Debug, Clone)]
pub struct HistogramBucket {
    pub lower: Duration,
    pub upper: Duration,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Canceled,
}

#[derive(Debug, Clone)]
pub struct FailureTally {
    pub message: String,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct ProfileStats {
    pub runs: usize,
    pub successes: usize,
    pub failures: usize,
    pub elapsed: Duration,
    pub throughput_per_sec: f64,
    pub status: RunStatus,
    pub note: Option<String>,
    pub latency: Option<LatencyStats>,
    pub histogram: Vec<HistogramBucket>,
    pub failure_messages: Vec<FailureTally>,
}

#[derive(Debug, Clone)]
pub struct WorkflowStats {
    pub steps_run: usize,
    pub steps_failed: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct CompareEntry {
    pub environment: String,
    pub status_code: Option<u16>,
    pub duration: Duration,
    pub body_preview: String,
}

#[derive(Debug, Clone, Default)]
pub struct CompareBundle {
    pub entries: Vec<CompareEntry>,
}

/// Opaque monotonic identifier; two snapshots with equal ids are considered
/// the same response for reflow/raw-dump token validation (spec §4.7, §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotId(pub u64);

#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    pub id: SnapshotId,
    pub environment: String,

    pub pretty: String,
    pub raw: String,
    pub raw_summary: Option<String>,
    pub raw_text: Option<String>,
    pub raw_hex: Option<String>,
    pub raw_base64: Option<String>,
    pub raw_mode: RawMode,
    pub raw_loading: bool,
    pub raw_loading_mode: Option<RawMode>,

    pub headers: Headers,
    pub request_headers: Headers,

    pub stats_kind: StatsKind,
    pub stats: Option<String>,
    pub stats_colored: Option<String>,
    pub profile_stats: Option<ProfileStats>,
    pub workflow_stats: Option<WorkflowStats>,

    pub ready: bool,
    pub body: Vec<u8>,
    pub body_meta: BodyMeta,
    pub content_type: Option<String>,
    pub effective_url: String,

    pub timeline: Option<Timeline>,
    pub trace_report: Option<TraceReport>,
    pub trace_enabled: bool,

    pub stream: Option<StreamInfo>,
    pub compare: Option<CompareBundle>,
}

impl ResponseSnapshot {
    /// Tabs available for this snapshot (spec §4.6).
    pub fn available_tabs(&self, split_on: bool, other_ready: bool) -> Vec<Tab> {
        let mut tabs = vec![Tab::Pretty, Tab::Raw, Tab::Headers];
        if self.stats_kind != StatsKind::None {
            tabs.push(Tab::Stats);
        }
        if self.stream.is_some() {
            tabs.push(Tab::Stream);
        }
        if self.trace_report.is_some() {
            tabs.push(Tab::Timeline);
        }
        if self.compare.is_some() {
            tabs.push(Tab::Compare);
        }
        if split_on && other_ready {
            tabs.push(Tab::Diff);
        }
        tabs.push(Tab::History);
        tabs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Pretty,
    Raw,
    Headers,
    Stats,
    Stream,
    Timeline,
    Compare,
    Diff,
    History,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(stats_kind: StatsKind, stream: bool, trace: bool, compare: bool) -> ResponseSnapshot {
        ResponseSnapshot {
            id: SnapshotId(1),
            environment: "dev".into(),
            pretty: String::new(),
            raw: String::new(),
            raw_summary: None,
            raw_text: None,
            raw_hex: None,
            raw_base64: None,
            raw_mode: RawMode::Text,
            raw_loading: false,
            raw_loading_mode: None,
            headers: Headers::new(),
            request_headers: Headers::new(),
            stats_kind,
            stats: None,
            stats_colored: None,
            profile_stats: None,
            workflow_stats: None,
            ready: true,
            body: vec![],
            body_meta: BodyMeta {
                kind: BodyKind::Text,
                printable: true,
                mime: None,
                charset: None,
                size: 0,
                decode_err: None,
                preview_hex: None,
                preview_base64: None,
            },
            content_type: None,
            effective_url: String::new(),
            timeline: None,
            trace_report: trace.then(|| TraceReport {
                phases: vec![],
                tls_status: crate::response::TlsVerification::Unknown,
            }),
            trace_enabled: trace,
            stream: stream.then(|| StreamInfo::new(crate::response::StreamKind::Sse)),
            compare: compare.then(CompareBundle::default),
        }
    }

    #[test]
    fn tabs_always_include_core_three() {
        let snap = snapshot(StatsKind::None, false, false, false);
        let tabs = snap.available_tabs(false, false);
        assert!(tabs.contains(&Tab::Pretty));
        assert!(tabs.contains(&Tab::Raw));
        assert!(tabs.contains(&Tab::Headers));
        assert!(!tabs.contains(&Tab::Stats));
        assert!(!tabs.contains(&Tab::Diff));
    }

    #[test]
    fn diff_tab_requires_split_and_other_ready() {
        let snap = snapshot(StatsKind::None, false, false, false);
        assert!(!snap.available_tabs(true, false).contains(&Tab::Diff));
        assert!(snap.available_tabs(true, true).contains(&Tab::Diff));
        assert!(!snap.available_tabs(false, true).contains(&Tab::Diff));
    }

    #[test]
    fn stream_and_timeline_and_compare_tabs_conditional() {
        let snap = snapshot(StatsKind::Profile, true, true, true);
        let tabs = snap.available_tabs(false, false);
        assert!(tabs.contains(&Tab::Stats));
        assert!(tabs.contains(&Tab::Stream));
        assert!(tabs.contains(&Tab::Timeline));
        assert!(tabs.contains(&Tab::Compare));
    }

    #[test]
    fn raw_mode_cycle_excludes_text_for_non_printable() {
        let allowed = RawMode::allowed_modes(false, false);
        assert_eq!(allowed, vec![RawMode::Hex, RawMode::Base64]);
        assert_eq!(RawMode::cycle_next(RawMode::Hex, &allowed), RawMode::Base64);
        assert_eq!(RawMode::cycle_next(RawMode::Base64, &allowed), RawMode::Hex);
    }

    #[test]
    fn raw_mode_heavy_binary_starts_with_summary() {
        let allowed = RawMode::allowed_modes(false, true);
        assert_eq!(allowed[0], RawMode::Summary);
        assert!(!allowed.contains(&RawMode::Text));
    }

    #[test]
    fn raw_mode_clamps_disallowed_current_to_first_allowed() {
        let allowed = RawMode::allowed_modes(false, false);
        // current=Text is disallowed for non-printable bodies.
        assert_eq!(RawMode::cycle_next(RawMode::Text, &allowed), RawMode::Hex);
    }
}
