//! Builds a `TraceReport` from the raw `Timeline` hook timestamps recorded
//! during a send (spec §4.10). TLS status follows three rules: verified iff
//! the trace says so, unverified iff a handshake or cert info was observed
//! without verification, unknown iff only ALPN/resumption was observed.

use std::time::Duration;

use reqtui_model::{Timeline, TimelinePhase, TlsVerification, TraceReport};

fn phase_duration(start: Option<Duration>, done: Option<Duration>) -> Option<Duration> {
    match (start, done) {
        (Some(start), Some(done)) => Some(done.saturating_sub(start)),
        _ => None,
    }
}

fn push_phase(phases: &mut Vec<TimelinePhase>, name: &'static str, duration: Option<Duration>) {
    if duration.is_some() {
        phases.push(TimelinePhase { name, duration });
    }
}

fn tls_status(timeline: &Timeline) -> TlsVerification {
    match timeline.tls_verified {
        Some(true) => TlsVerification::Verified,
        Some(false) => TlsVerification::Unverified,
        None if timeline.tls_handshake_seen => TlsVerification::Unverified,
        None if timeline.alpn_or_resumed_seen => TlsVerification::Unknown,
        None => TlsVerification::Unknown,
    }
}

pub fn build_trace_report(timeline: &Timeline) -> TraceReport {
    let mut phases = Vec::new();
    push_phase(&mut phases, "dns", phase_duration(timeline.dns_start, timeline.dns_done));
    push_phase(
        &mut phases,
        "connect",
        phase_duration(timeline.connect_start, timeline.connect_done),
    );
    push_phase(&mut phases, "tls", phase_duration(timeline.tls_start, timeline.tls_done));
    push_phase(
        &mut phases,
        "wrote_headers",
        phase_duration(timeline.connect_done.or(timeline.tls_done), timeline.wrote_headers),
    );
    push_phase(
        &mut phases,
        "wrote_request",
        phase_duration(timeline.wrote_headers, timeline.wrote_request),
    );
    push_phase(
        &mut phases,
        "waiting",
        phase_duration(timeline.wrote_request, timeline.first_byte),
    );
    push_phase(
        &mut phases,
        "total",
        phase_duration(timeline.dns_start.or(timeline.connect_start), timeline.done),
    );

    TraceReport {
        phases,
        tls_status: tls_status(timeline),
    }
}
