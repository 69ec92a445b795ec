//! Presentation Model, Reflow & Raw-Dump Scheduler, Search & Diff, Profile
//! Runner, and Latency Series (spec §4.6-§4.9, §4.11).
//!
//! `presentation` owns the live snapshot and per-pane follow/pin state.
//! `scheduler` issues the tokens that gate reflow and raw-dump completions.
//! `search` and `diff` implement the pane's Search and Diff tabs. `profile`
//! drives a request through the Dispatcher N times and reduces the
//! durations into stats. `latency` renders the rolling sparkline.

pub mod diff;
pub mod latency;
pub mod presentation;
pub mod profile;
pub mod scheduler;
pub mod search;
pub mod snapshot_builder;

pub use diff::{unified_diff, unified_diff_with_headers, wrap_diff, DiffLine, DiffLineKind, DiffSource};
pub use latency::{format_short, LatencySeries};
pub use presentation::{PaneId, PresentationModel, StatusPulse, PRIMARY, SECONDARY};
pub use profile::{run_profile, run_workflow};
pub use scheduler::{
    RawDumpKey, RawDumpScheduler, ReflowKey, ReflowScheduler, SchedToken, REFLOW_DEBOUNCE,
};
pub use search::{search, SearchKey, SearchMatch, SearchResult};
pub use snapshot_builder::{from_error, from_grpc, from_http, next_snapshot_id, pending};
