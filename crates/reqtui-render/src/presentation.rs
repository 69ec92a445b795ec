//! Presentation Model (spec §4.6): owns the live response snapshot, the
//! per-pane follow/pin state, and the status pulse that animates while a
//! send is active.

use reqtui_model::snapshot::ResponseSnapshot;
use reqtui_model::{CancelToken, ErrKind, ResponsePaneState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaneId(pub usize);

/// Primary pane is always pane 0. With split off it is the only pane and is
/// always live (spec §4.6: "when split is disabled, the primary pane is
/// always live").
pub const PRIMARY: PaneId = PaneId(0);
pub const SECONDARY: PaneId = PaneId(1);

/// Ticks at a fixed period while a send is in flight (spec §4.6: "Status
/// pulse... animates via a fixed-period tick. Starting the pulse is
/// idempotent; starting it while already pulsing preserves the frame
/// index.").
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusPulse {
    active: bool,
    frame: usize,
}

impl StatusPulse {
    pub fn start(&mut self) {
        if !self.active {
            self.active = true;
            self.frame = 0;
        }
    }

    pub fn stop(&mut self) {
        self.active = false;
        self.frame = 0;
    }

    pub fn tick(&mut self) {
        if self.active {
            self.frame = self.frame.wrapping_add(1);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// "Sending request…" with a dot count cycling 1..=3 by frame.
    pub fn message(&self) -> String {
        let dots = ".".repeat((self.frame % 3) + 1);
        format!("Sending request{dots}")
    }
}

pub struct PresentationModel {
    pub primary: ResponsePaneState,
    pub secondary: ResponsePaneState,
    live: PaneId,
    split: bool,
    pub pulse: StatusPulse,
    pub sending: bool,
    pub status: Option<String>,
}

impl Default for PresentationModel {
    fn default() -> Self {
        Self {
            primary: ResponsePaneState::default(),
            secondary: ResponsePaneState::default(),
            live: PRIMARY,
            split: false,
            pulse: StatusPulse::default(),
            sending: false,
            status: None,
        }
    }
}

impl PresentationModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_split(&mut self, on: bool) {
        self.split = on;
        self.primary.split = on;
        self.secondary.split = on;
        if !on {
            self.live = PRIMARY;
        }
    }

    pub fn live_pane(&self) -> PaneId {
        if self.split { self.live } else { PRIMARY }
    }

    fn pane_mut(&mut self, id: PaneId) -> &mut ResponsePaneState {
        if id == SECONDARY { &mut self.secondary } else { &mut self.primary }
    }

    fn pane(&self, id: PaneId) -> &ResponsePaneState {
        if id == SECONDARY { &self.secondary } else { &self.primary }
    }

    /// Pins `pane`, releasing its follow flag; live designation transfers to
    /// the other pane when split is on (spec §4.6: "switching a pane to
    /// pinned immediately releases its follow flag, and the live
    /// designation transfers to another pane when possible").
    pub fn pin(&mut self, pane: PaneId) {
        let top_line = self.pane(pane).viewport.top_line;
        self.pane_mut(pane).scroll_to(top_line);
        if self.split && self.live == pane {
            self.live = if pane == PRIMARY { SECONDARY } else { PRIMARY };
        }
    }

    /// Ingests a new response snapshot (spec §4.6): replaces the live
    /// snapshot and every pane whose follow flag is set.
    pub fn ingest_snapshot(&mut self, snapshot: ResponseSnapshot) {
        if self.primary.follow == reqtui_model::pane::FollowMode::Following {
            self.primary.push_snapshot(snapshot.clone());
        }
        if self.split && self.secondary.follow == reqtui_model::pane::FollowMode::Following {
            self.secondary.push_snapshot(snapshot);
        }
    }

    /// Writes a send error into the focused pane's views instead of a modal
    /// (spec §4.6: "the presenter does not pop the error modal; instead it
    /// clears any HTTP response... and writes the error text into the
    /// snapshot's pretty and raw views").
    pub fn render_error(&mut self, pane: PaneId, err: &ErrKind) {
        if err.is_cancellation() {
            return;
        }
        let target = self.pane_mut(pane);
        if let Some(last) = target.snapshots.last_mut() {
            last.pretty = err.to_string();
            last.raw = err.to_string();
            last.ready = false;
        }
        self.status = Some(format!("[{}] {err}", err.label()));
    }

    /// Starts the send pulse (idempotent).
    pub fn start_sending(&mut self) {
        self.sending = true;
        self.pulse.start();
        self.status = Some(self.pulse.message());
    }

    pub fn tick_pulse(&mut self) {
        if self.sending {
            self.pulse.tick();
            self.status = Some(self.pulse.message());
        }
    }

    pub fn finish_sending(&mut self) {
        self.sending = false;
        self.pulse.stop();
    }

    /// Invokes the installed cancel handle, resets `sending`, clears pulse
    /// state, and posts a "Canceling…" status (spec §4.6).
    pub fn cancel_active_runs(&mut self, cancel: &CancelToken) {
        cancel.cancel();
        self.sending = false;
        self.pulse.stop();
        self.status = Some("Canceling...".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqtui_model::snapshot::{BodyKind, BodyMeta, RawMode, SnapshotId, StatsKind};
    use reqtui_model::Headers;

    fn snapshot(id: u64) -> ResponseSnapshot {
        ResponseSnapshot {
            id: SnapshotId(id),
            environment: "dev".into(),
            pretty: "body".into(),
            raw: "body".into(),
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
            trace_report: None,
            trace_enabled: false,
            stream: None,
            compare: None,
        }
    }

    #[test]
    fn ingest_replaces_following_panes_only() {
        let mut model = PresentationModel::new();
        model.set_split(true);
        model.pin(SECONDARY);
        model.ingest_snapshot(snapshot(1));
        assert_eq!(model.primary.current().unwrap().id, SnapshotId(1));
        assert!(model.secondary.current().is_none());
    }

    #[test]
    fn pin_transfers_live_designation() {
        let mut model = PresentationModel::new();
        model.set_split(true);
        assert_eq!(model.live_pane(), PRIMARY);
        model.pin(PRIMARY);
        assert_eq!(model.live_pane(), SECONDARY);
    }

    #[test]
    fn primary_always_live_without_split() {
        let model = PresentationModel::new();
        assert_eq!(model.live_pane(), PRIMARY);
    }

    #[test]
    fn cancellation_does_not_render_an_error() {
        let mut model = PresentationModel::new();
        model.primary.push_snapshot(snapshot(1));
        model.render_error(PRIMARY, &ErrKind::Canceled);
        assert_eq!(model.primary.current().unwrap().pretty, "body");
    }

    #[test]
    fn http_error_overwrites_pretty_and_raw() {
        let mut model = PresentationModel::new();
        model.primary.push_snapshot(snapshot(1));
        model.render_error(PRIMARY, &ErrKind::Http("boom".into()));
        assert_eq!(model.primary.current().unwrap().pretty, "http error: boom");
        assert!(model.status.unwrap().contains("http"));
    }

    #[test]
    fn pulse_start_is_idempotent_and_preserves_frame() {
        let mut pulse = StatusPulse::default();
        pulse.start();
        pulse.tick();
        pulse.tick();
        let frame_before = pulse.frame;
        pulse.start();
        assert_eq!(pulse.frame, frame_before);
    }

    #[test]
    fn cancel_active_runs_posts_canceling_status() {
        let mut model = PresentationModel::new();
        model.start_sending();
        let cancel = CancelToken::new();
        model.cancel_active_runs(&cancel);
        assert!(!model.sending);
        assert!(cancel.is_canceled());
        assert_eq!(model.status.as_deref(), Some("Canceling..."));
    }
}
