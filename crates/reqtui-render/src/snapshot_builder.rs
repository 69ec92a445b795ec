//! Builds a `ResponseSnapshot` from a dispatched `HttpResponse`/`GrpcResponse`
//! (spec §3, §4.6). Hex/base64/analyze are the Binary view service's job
//! (spec §6, external collaborator); this module only does the cheap,
//! synchronous part — printable detection, JSON pretty-printing, and the
//! body-meta fields the reflow scheduler needs before the async dump runs.

use std::sync::atomic::{AtomicU64, Ordering};

use reqtui_model::snapshot::{BodyKind, BodyMeta, RawMode, SnapshotId, StatsKind};
use reqtui_model::{ErrKind, GrpcResponse, Headers, HttpResponse, ResponseSnapshot};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates the next monotonic snapshot id (spec §4.7: reflow/raw-dump
/// completions are validated against a monotonically increasing snapshot id).
pub fn next_snapshot_id() -> SnapshotId {
    SnapshotId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

fn body_meta(body: &[u8], content_type: Option<&str>) -> BodyMeta {
    let text = std::str::from_utf8(body);
    let printable = text.is_ok();
    BodyMeta {
        kind: if body.is_empty() {
            BodyKind::Unknown
        } else if printable {
            BodyKind::Text
        } else {
            BodyKind::Binary
        },
        printable,
        mime: content_type.map(|s| s.to_string()),
        charset: None,
        size: body.len(),
        decode_err: text.err().map(|e| e.to_string()),
        preview_hex: None,
        preview_base64: None,
    }
}

fn pretty_body(body: &[u8], content_type: Option<&str>) -> String {
    let is_json = content_type.is_some_and(|ct| ct.contains("json"));
    if is_json {
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
            if let Ok(pretty) = serde_json::to_string_pretty(&value) {
                return pretty;
            }
        }
    }
    String::from_utf8_lossy(body).into_owned()
}

fn empty_snapshot(id: SnapshotId, environment: &str) -> ResponseSnapshot {
    ResponseSnapshot {
        id,
        environment: environment.to_string(),
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
        stats_kind: StatsKind::None,
        stats: None,
        stats_colored: None,
        profile_stats: None,
        workflow_stats: None,
        ready: false,
        body: Vec::new(),
        body_meta: body_meta(&[], None),
        content_type: None,
        effective_url: String::new(),
        timeline: None,
        trace_report: None,
        trace_enabled: false,
        stream: None,
        compare: None,
    }
}

/// Builds the snapshot for a completed HTTP send (spec §3, §4.10).
pub fn from_http(id: SnapshotId, environment: &str, resp: &HttpResponse) -> ResponseSnapshot {
    let content_type = resp.headers.get("content-type").map(|s| s.to_string());
    let meta = body_meta(&resp.body, content_type.as_deref());
    let pretty = pretty_body(&resp.body, content_type.as_deref());
    let raw_mode = if meta.printable { RawMode::Text } else { RawMode::Hex };

    ResponseSnapshot {
        raw: pretty.clone(),
        raw_text: meta.printable.then(|| pretty.clone()),
        pretty,
        raw_mode,
        headers: resp.headers.clone(),
        request_headers: resp.request_echo.headers.clone(),
        ready: true,
        body: resp.body.clone(),
        body_meta: meta,
        content_type,
        effective_url: resp.effective_url.clone(),
        timeline: resp.timeline.clone(),
        trace_report: resp.trace_report.clone(),
        trace_enabled: resp.trace_report.is_some(),
        ..empty_snapshot(id, environment)
    }
}

/// Builds the snapshot for a completed gRPC invocation. `messageJson` is
/// already rendered by the transport via prost-reflect; this just wraps it
/// the way an HTTP pretty body would be.
pub fn from_grpc(id: SnapshotId, environment: &str, resp: &GrpcResponse) -> ResponseSnapshot {
    let pretty = resp
        .message_json
        .clone()
        .unwrap_or_else(|| format!("{} {}", resp.status_code, resp.status_message));
    let meta = body_meta(&resp.wire_bytes, resp.response_content_type.as_deref());

    ResponseSnapshot {
        raw: pretty.clone(),
        raw_text: Some(pretty.clone()),
        pretty,
        raw_mode: RawMode::Text,
        ready: true,
        body: resp.wire_bytes.clone(),
        body_meta: meta,
        content_type: resp.response_content_type.clone(),
        ..empty_snapshot(id, environment)
    }
}

/// Builds a not-ready placeholder snapshot for the moment a send starts,
/// before the response arrives (spec §4.6: the live snapshot exists while
/// the pulse is animating).
pub fn pending(id: SnapshotId, environment: &str) -> ResponseSnapshot {
    empty_snapshot(id, environment)
}

/// Builds an error snapshot directly (used when a send fails before any
/// response is available to convert).
pub fn from_error(id: SnapshotId, environment: &str, err: &ErrKind) -> ResponseSnapshot {
    let mut snap = empty_snapshot(id, environment);
    snap.pretty = err.to_string();
    snap.raw = err.to_string();
    snap.ready = false;
    snap
}
