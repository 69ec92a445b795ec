//! Script Runner collaborator (spec §6): `runPre(ctx, req, vars) →
//! (variables, err)`, `runPost(ctx, response, stream) → (tests, variables,
//! err)`. The scripting language itself is out of scope (spec §1
//! Non-goals: "no scripting-language runtime definition"); this crate only
//! needs the fixed API surface and a no-op default so a send with no
//! configured script proceeds unchanged.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqtui_model::{ErrKind, GrpcResponse, HttpResponse, StreamInfo, TestResult};

/// What a post-response script saw, mirroring the three call shapes a
/// send can finish in (spec §4.4: HTTP/gRPC/stream).
pub enum ScriptResponseView<'a> {
    Http(&'a HttpResponse),
    Grpc(&'a GrpcResponse),
}

#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Runs before the request is sent. Returns variables to merge into the
    /// request-scope provider, or a `Script` error that aborts the send.
    async fn run_pre(
        &self,
        script: &str,
        vars: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, ErrKind>;

    /// Runs after a response (or stream) is available. Script failures here
    /// never abort post-processing (spec §7(e)); the Dispatcher downgrades
    /// an `Err` into a synthetic failing `TestResult` instead of propagating it.
    async fn run_post(
        &self,
        script: &str,
        response: ScriptResponseView<'_>,
        stream: Option<&StreamInfo>,
    ) -> Result<(Vec<TestResult>, HashMap<String, String>), ErrKind>;
}

/// No scripting runtime wired up: `run_pre`/`run_post` are no-ops. Used
/// when a request has no `pre_script`/`post_script` set, and as the
/// default collaborator until a real script runtime is plugged in.
pub struct NullScriptRunner;

#[async_trait]
impl ScriptRunner for NullScriptRunner {
    async fn run_pre(
        &self,
        _script: &str,
        _vars: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, ErrKind> {
        Ok(HashMap::new())
    }

    async fn run_post(
        &self,
        _script: &str,
        _response: ScriptResponseView<'_>,
        _stream: Option<&StreamInfo>,
    ) -> Result<(Vec<TestResult>, HashMap<String, String>), ErrKind> {
        Ok((Vec::new(), HashMap::new()))
    }
}

/// Wraps a post-script failure as a single failing `TestResult` prefixed
/// with `[ERROR]` rather than aborting (spec §7(e)).
pub fn script_error_as_test(err: &ErrKind) -> TestResult {
    TestResult {
        name: "post-script".to_string(),
        passed: false,
        message: format!("[ERROR] {err}"),
        elapsed: Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_runner_is_a_no_op() {
        let runner = NullScriptRunner;
        let vars = runner.run_pre("", &HashMap::new()).await.unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn script_error_test_result_is_prefixed() {
        let result = script_error_as_test(&ErrKind::Script("boom".into()));
        assert!(result.message.starts_with("[ERROR]"));
        assert!(!result.passed);
    }
}
