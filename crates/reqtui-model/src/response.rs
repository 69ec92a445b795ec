//! Response, stream, and trace data types (spec §3).

use crate::headers::Headers;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RequestEcho {
    pub method: String,
    pub headers: Headers,
    pub host: String,
    pub content_length: Option<u64>,
    pub transfer_encoding: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status_text: String,
    pub status_code: u16,
    pub protocol: String,
    pub request_echo: RequestEcho,
    pub body: Vec<u8>,
    pub duration: Duration,
    pub effective_url: String,
    pub headers: Headers,
    pub timeline: Option<Timeline>,
    pub trace_report: Option<TraceReport>,
}

#[derive(Debug, Clone)]
pub struct GrpcResponse {
    pub status_code: i32,
    pub status_message: String,
    pub message_json: Option<String>,
    pub wire_bytes: Vec<u8>,
    pub request_content_type: String,
    pub response_content_type: Option<String>,
}

impl GrpcResponse {
    /// gRPC status `0` is `OK`; non-OK codes are not engine errors (spec §7(d)).
    pub fn is_ok(&self) -> bool {
        self.status_code == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Sse,
    WebSocket,
}

#[derive(Debug, Clone)]
pub struct StreamEventRecord {
    pub event_type: Option<String>,
    pub id: Option<String>,
    pub data: String,
    pub json: Option<serde_json::Value>,
    pub sent: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StreamSummary {
    pub sent_count: u64,
    pub received_count: u64,
}

#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub kind: StreamKind,
    pub summary: StreamSummary,
    pub events: Vec<StreamEventRecord>,
    pub terminal: bool,
}

impl StreamInfo {
    pub fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            summary: StreamSummary::default(),
            events: Vec::new(),
            terminal: false,
        }
    }

    pub fn push_received(&mut self, record: StreamEventRecord) {
        self.summary.received_count += 1;
        self.events.push(record);
    }

    pub fn push_sent(&mut self, record: StreamEventRecord) {
        self.summary.sent_count += 1;
        self.events.push(record);
    }

    /// Summary as a JSON value for capture-expression evaluation.
    pub fn summary_json(&self) -> serde_json::Value {
        serde_json::json!({
            "sentCount": self.summary.sent_count,
            "receivedCount": self.summary.received_count,
            "eventCount": self.events.len(),
        })
    }

    /// Per-event JSON projections, in order, for capture-expression evaluation.
    pub fn events_json(&self) -> Vec<serde_json::Value> {
        self.events
            .iter()
            .map(|e| {
                e.json.clone().unwrap_or_else(|| {
                    serde_json::json!({
                        "event": e.event_type,
                        "id": e.id,
                        "data": e.data,
                    })
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVerification {
    Verified,
    Unverified,
    Unknown,
}

#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub dns_start: Option<Duration>,
    pub dns_done: Option<Duration>,
    pub connect_start: Option<Duration>,
    pub connect_done: Option<Duration>,
    pub tls_start: Option<Duration>,
    pub tls_done: Option<Duration>,
    pub wrote_headers: Option<Duration>,
    pub wrote_request: Option<Duration>,
    pub first_byte: Option<Duration>,
    pub done: Option<Duration>,
    pub tls_verified: Option<bool>,
    pub tls_handshake_seen: bool,
    pub alpn_or_resumed_seen: bool,
}

#[derive(Debug, Clone)]
pub struct TimelinePhase {
    pub name: &'static str,
    pub duration: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct TraceReport {
    pub phases: Vec<TimelinePhase>,
    pub tls_status: TlsVerification,
}

#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_summary_json_counts_events() {
        let mut stream = StreamInfo::new(StreamKind::Sse);
        stream.push_received(StreamEventRecord {
            event_type: Some("message".into()),
            id: None,
            data: "{}".into(),
            json: Some(serde_json::json!({"summary": {"eventCount": 1}})),
            sent: false,
        });
        let summary = stream.summary_json();
        assert_eq!(summary["eventCount"], 1);
        assert_eq!(summary["receivedCount"], 1);
    }

    #[test]
    fn grpc_response_ok_iff_code_zero() {
        let ok = GrpcResponse {
            status_code: 0,
            status_message: String::new(),
            message_json: None,
            wire_bytes: vec![],
            request_content_type: "application/grpc".into(),
            response_content_type: None,
        };
        assert!(ok.is_ok());
        let mut err = ok.clone();
        err.status_code = 5;
        assert!(!err.is_ok());
    }
}
