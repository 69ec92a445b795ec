//! Error taxonomy (spec §7).
//!
//! Mirrors the closed-enum-of-causes style the pack uses for transport
//! errors (`grpcurl_core::error::GrpcurlError`): one `thiserror` enum naming
//! every kind, each carrying a short operator-facing message and optionally
//! wrapping the underlying cause.

use thiserror::Error;

/// The taxonomy of terminal failure states a send can reach (spec §7).
#[derive(Debug, Clone, Error)]
pub enum ErrKind {
    #[error("unresolved template variable: {0}")]
    Template(String),
    #[error("failed to parse inline curl command: {0}")]
    ParseCurl(String),
    #[error("failed to read or expand body file: {0}")]
    BodyFile(String),
    #[error("oauth: {0}")]
    Auth(String),
    #[error("oauth transport failure: {0}")]
    AuthTransport(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("grpc invocation failed: {0}")]
    Grpc(String),
    #[error("stream error: {0}")]
    Stream(String),
    #[error("script error: {0}")]
    Script(String),
    #[error("capture error: {0}")]
    Capture(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("canceled")]
    Canceled,
}

impl ErrKind {
    /// True for the one kind that must never produce an error modal (spec §7(f)).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ErrKind::Canceled)
    }

    /// Short operator-facing label used in status lines.
    pub fn label(&self) -> &'static str {
        match self {
            ErrKind::Template(_) => "template",
            ErrKind::ParseCurl(_) => "parse-curl",
            ErrKind::BodyFile(_) => "body-file",
            ErrKind::Auth(_) => "auth",
            ErrKind::AuthTransport(_) => "auth-transport",
            ErrKind::Transport(_) => "transport",
            ErrKind::Http(_) => "http",
            ErrKind::Grpc(_) => "grpc",
            ErrKind::Stream(_) => "stream",
            ErrKind::Script(_) => "script",
            ErrKind::Capture(_) => "capture",
            ErrKind::Config(_) => "config",
            ErrKind::Canceled => "canceled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_flagged() {
        assert!(ErrKind::Canceled.is_cancellation());
        assert!(!ErrKind::Transport("x".into()).is_cancellation());
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(ErrKind::Auth("x".into()).label(), "auth");
        assert_eq!(ErrKind::Grpc("x".into()).label(), "grpc");
    }
}
