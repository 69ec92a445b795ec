//! HTTP and gRPC clients plus the SSE/WebSocket Stream Runner (spec §4.4,
//! §4.5, §6): the engine's cancellable send surface. `reqtui-dispatcher`
//! composes these traits behind its own state machine; this crate only
//! knows how to get bytes on and off the wire.

pub mod grpc;
pub mod http;
pub mod stream;
pub mod timeline;

pub use grpc::{GrpcTransport, PreparedGrpcRequest, TonicGrpcTransport};
pub use http::{HttpTransport, PreparedHttpRequest, ReqwestHttpTransport};
pub use stream::{run_sse, run_ws, WsDirective};
pub use timeline::build_trace_report;
