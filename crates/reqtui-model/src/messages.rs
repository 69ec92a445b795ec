//! Event payloads produced by background async sources and consumed by the
//! dispatcher/render stages (spec §4, §5). These are the domain-specific
//! variants carried inside the engine's tagged-union `Event`.

use crate::error::ErrKind;
use crate::response::{GrpcResponse, HttpResponse, StreamEventRecord, TestResult};
use crate::snapshot::{ProfileStats, RawMode, WorkflowStats};
use std::time::Duration;

/// Monotonic token identifying one in-flight request (spec §4.4, §5). A
/// result whose token does not match the current in-flight token for its
/// pane is stale and must be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(pub u64);

#[derive(Debug, Clone)]
pub enum ResponseMsg {
    Http {
        token: RequestToken,
        result: Result<HttpResponse, ErrKind>,
    },
    Grpc {
        token: RequestToken,
        result: Result<GrpcResponse, ErrKind>,
    },
    Test {
        token: RequestToken,
        results: Vec<TestResult>,
    },
}

#[derive(Debug, Clone)]
pub enum StreamProgressMsg {
    Opened {
        token: RequestToken,
    },
    Event {
        token: RequestToken,
        record: StreamEventRecord,
    },
    Closed {
        token: RequestToken,
        reason: Option<String>,
    },
    Failed {
        token: RequestToken,
        error: ErrKind,
    },
}

/// Result of a debounced reflow computed by the scheduler (spec §4.7). The
/// `token` ties the result back to the (snapshot, width) it was computed for
/// so a stale reflow can be rejected without inspecting its content.
#[derive(Debug, Clone)]
pub struct ReflowResultMsg {
    pub snapshot_id: crate::snapshot::SnapshotId,
    pub width: u16,
    pub lines: Vec<reqtui_text::wrap::WrappedLine>,
}

#[derive(Debug, Clone)]
pub struct RawDumpResultMsg {
    pub snapshot_id: crate::snapshot::SnapshotId,
    pub mode: RawMode,
    pub rendered: String,
}

#[derive(Debug, Clone)]
pub struct ProfileProgressMsg {
    pub token: RequestToken,
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub enum ProfileResultMsg {
    Profile {
        token: RequestToken,
        stats: ProfileStats,
    },
    Workflow {
        token: RequestToken,
        stats: WorkflowStats,
    },
}

/// OAuth token acquisition result, consumed by the dispatcher before a
/// pending send can proceed (spec §4.3).
#[derive(Debug, Clone)]
pub struct OAuthTokenMsg {
    pub token: RequestToken,
    pub result: Result<String, ErrKind>,
}

/// Periodic tick used to drive debounce timers without busy-waiting, in the
/// manner of the event loop's own tick source.
#[derive(Debug, Clone, Copy)]
pub struct TickMsg {
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_tokens_compare_by_value() {
        assert!(RequestToken(1) < RequestToken(2));
        assert_eq!(RequestToken(5), RequestToken(5));
    }
}
