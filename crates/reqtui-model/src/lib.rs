//! Domain model shared by the dispatcher, transport, and render crates:
//! request/response data types, the variable resolver, capture evaluation,
//! response snapshots, and the response pane's own UI state.

pub mod cancel;
pub mod capture;
pub mod document;
pub mod error;
pub mod headers;
pub mod messages;
pub mod pane;
pub mod request;
pub mod resolver;
pub mod response;
pub mod snapshot;

pub use cancel::CancelToken;
pub use capture::{CaptureScope, CaptureSpec, CaptureStore, CapturedValue};
pub use document::{Document, Environment};
pub use error::ErrKind;
pub use headers::Headers;
pub use messages::{
    OAuthTokenMsg, ProfileProgressMsg, ProfileResultMsg, RawDumpResultMsg, ReflowResultMsg,
    RequestToken, ResponseMsg, StreamProgressMsg, TickMsg,
};
pub use pane::ResponsePaneState;
pub use request::{
    AuthSpec, BodySource, GrantType, GrpcMessage, GrpcTarget, HttpMethod, Method, OAuth2Spec,
    ProfileSpec, RequestDescriptor, RequestMetadata, RequestSettings, TraceSpec,
};
pub use resolver::{MapProvider, Provider, Resolver};
pub use response::{
    GrpcResponse, HttpResponse, StreamEventRecord, StreamInfo, StreamKind, StreamSummary,
    TestResult, Timeline, TimelinePhase, TlsVerification, TraceReport,
};
pub use snapshot::{BodyMeta, ProfileStats, RawMode, ResponseSnapshot, SnapshotId, Tab, WorkflowStats};
