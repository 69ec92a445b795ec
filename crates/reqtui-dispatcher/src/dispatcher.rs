//! Dispatcher (spec §4.4): the per-send state machine.
//!
//! ```text
//! idle → preparing → (oauth) → sending → (streaming?) → finalizing → idle
//!                                   │
//!                                   └→ canceled
//!                                   └→ failed
//! ```
//!
//! Grounded on `reqtui_oauth::Manager`'s cancellation-aware single-flight
//! idiom and `reqtui_transport`'s cancellable transport traits; this module
//! is the thing that actually wires a prepared call through OAuth, the
//! right transport, and back into a `ResponseMsg`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use reqtui_model::capture::{evaluate_expression, ResponseEvalContext, StreamEvalContext};
use reqtui_model::{
    AuthSpec, CancelToken, CaptureScope, CaptureSpec, CaptureStore, CapturedValue, Document,
    Environment, ErrKind, GrantType, MapProvider, RequestDescriptor, RequestToken, ResponseMsg,
    Resolver, StreamInfo, StreamKind, TestResult,
};
use reqtui_oauth::{Manager, OAuthTransport};
use reqtui_transport::{GrpcTransport, HttpTransport};
use tokio::sync::Mutex;

use crate::preparer::{self, PreparedCall};
use crate::script::{script_error_as_test, ScriptResponseView, ScriptRunner};

/// Everything a completed (or aborted) send produced (spec §4.4: "returns a
/// single message containing: response..., stream info, tests, scriptErr,
/// captures, err, executed descriptor"). Kept as discrete fields since this
/// crate has no event-loop message bus of its own.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub token: RequestToken,
    pub response: ResponseMsg,
    pub stream: Option<StreamInfo>,
    pub tests: Vec<TestResult>,
    pub script_error: Option<String>,
    pub captured: HashMap<String, String>,
    pub executed: Option<RequestDescriptor>,
}

/// Resolved variable chain plus the environment name that scopes capture
/// storage (spec §4.2). The Dispatcher builds the full provider chain
/// internally; this just carries the pieces it needs from the caller.
pub struct ExecutionContext<'a> {
    pub doc: &'a Document,
    pub environment: &'a Environment,
    pub capture_env_override: Option<&'a str>,
    pub cwd: &'a Path,
    pub chained_vars: HashMap<String, String>,
}

pub struct Dispatcher<T: OAuthTransport> {
    http: Arc<dyn HttpTransport>,
    grpc: Arc<dyn GrpcTransport>,
    oauth: Arc<Manager<T>>,
    script: Arc<dyn ScriptRunner>,
    captures: Mutex<CaptureStore>,
    next_token: AtomicU64,
    in_flight: Mutex<Option<CancelToken>>,
}

impl<T: OAuthTransport> Dispatcher<T> {
    pub fn new(
        http: Arc<dyn HttpTransport>,
        grpc: Arc<dyn GrpcTransport>,
        oauth: Arc<Manager<T>>,
        script: Arc<dyn ScriptRunner>,
    ) -> Self {
        Self {
            http,
            grpc,
            oauth,
            script,
            captures: Mutex::new(CaptureStore::new()),
            next_token: AtomicU64::new(1),
            in_flight: Mutex::new(None),
        }
    }

    /// Snapshot of current global captures for `env`, surfaced to a
    /// presenter (spec §4.2: `snapshotGlobals`).
    pub async fn snapshot_globals(&self, env: &str) -> Vec<CapturedValue> {
        self.captures.lock().await.snapshot_globals(env)
    }

    pub async fn clear_globals(&self, env: &str) {
        self.captures.lock().await.clear_globals(env);
    }

    fn build_resolver(
        &self,
        ctx: &ExecutionContext<'_>,
        file_scope: Vec<CapturedValue>,
        globals: Vec<CapturedValue>,
        request_vars: &HashMap<String, String>,
    ) -> Resolver {
        let mut request = MapProvider::new("request");
        for (k, v) in request_vars {
            request.insert(k.clone(), v.clone());
        }
        let mut file = MapProvider::new("file");
        for captured in file_scope {
            file.insert(captured.name, captured.value);
        }
        let mut global = MapProvider::new("global");
        for captured in globals {
            global.insert(captured.name, captured.value);
        }
        let mut env_provider = MapProvider::new("env");
        for (k, v) in &ctx.environment.variables {
            env_provider.insert(k.clone(), v.clone());
        }
        let mut defaults = MapProvider::new("doc-defaults");
        for (k, v) in &ctx.doc.defaults {
            defaults.insert(k.clone(), v.clone());
        }

        Resolver::new()
            .with_provider(request)
            .with_provider(file)
            .with_provider(global)
            .with_provider(env_provider)
            .with_provider(defaults)
    }

    /// Runs the full send lifecycle for `descriptor` (spec §4.4). Cancels
    /// any previously installed in-flight job before starting, and installs
    /// a fresh `CancelToken` that a subsequent call (or `cancel_active`)
    /// will tear down in turn.
    pub async fn execute_request(
        &self,
        descriptor: &RequestDescriptor,
        base_timeout: std::time::Duration,
        ctx: ExecutionContext<'_>,
    ) -> DispatchOutcome {
        let token = RequestToken(self.next_token.fetch_add(1, Ordering::SeqCst));
        let cancel = CancelToken::new();
        {
            let mut guard = self.in_flight.lock().await;
            if let Some(prev) = guard.take() {
                prev.cancel();
            }
            *guard = Some(cancel.clone());
        }

        let env_name = ctx.environment.name.clone();
        let capture_env = ctx.capture_env_override.unwrap_or(&env_name).to_string();
        let doc_path = ctx.doc.path.to_string_lossy().to_string();

        let (file_scope, globals) = {
            let store = self.captures.lock().await;
            (
                store.snapshot_file(&env_name, &doc_path),
                store.snapshot_globals(&env_name),
            )
        };

        let mut request_vars = ctx.chained_vars.clone();

        if let Some(pre_script) = &descriptor.metadata.pre_script {
            match self.script.run_pre(pre_script, &request_vars).await {
                Ok(vars) => request_vars.extend(vars),
                Err(err) => return self.abort(token, err),
            }
        }

        let resolver = self.build_resolver(&ctx, file_scope, globals, &request_vars);

        let mut prepared = match preparer::prepare(descriptor, &resolver, base_timeout, ctx.cwd).await {
            Ok(p) => p,
            Err(err) => return self.abort(token, err),
        };

        match self.apply_auth_header(&prepared.auth, &env_name, &cancel).await {
            Ok(Some((name, value))) => inject_auth_header(&mut prepared.call, &name, &value),
            Ok(None) => {}
            Err(err) => return self.abort(token, err),
        }

        let (response_msg, stream_info) = match prepared.call {
            PreparedCall::Http(req) => {
                let result = self.http.send(req, prepared.timeout, cancel.clone()).await;
                (ResponseMsg::Http { token, result }, None)
            }
            PreparedCall::Sse(req) => match self.http.open_stream(req, cancel.clone()).await {
                Ok(response) => {
                    let mut info = StreamInfo::new(StreamKind::Sse);
                    match reqtui_transport::run_sse(response, &mut info, cancel.clone()).await {
                        Ok(()) => (
                            ResponseMsg::Test { token, results: Vec::new() },
                            Some(info),
                        ),
                        Err(err) => (
                            ResponseMsg::Http { token, result: Err(err) },
                            Some(info),
                        ),
                    }
                }
                Err(err) => (ResponseMsg::Http { token, result: Err(err) }, None),
            },
            PreparedCall::Ws { url, script } => {
                let mut info = StreamInfo::new(StreamKind::WebSocket);
                match reqtui_transport::run_ws(&url, &script, &mut info, cancel.clone()).await {
                    Ok(()) => (
                        ResponseMsg::Test { token, results: Vec::new() },
                        Some(info),
                    ),
                    Err(err) => (
                        ResponseMsg::Http { token, result: Err(err) },
                        Some(info),
                    ),
                }
            }
            PreparedCall::Grpc(req) => {
                let result = self.grpc.invoke(req, prepared.timeout, cancel.clone()).await;
                (ResponseMsg::Grpc { token, result }, None)
            }
        };

        let (tests, script_error) = self
            .run_post_script(&prepared.metadata.post_script, &response_msg, stream_info.as_ref())
            .await;

        let captured = self
            .apply_captures(
                &prepared.metadata.captures,
                &capture_env,
                &doc_path,
                &response_msg,
                stream_info.as_ref(),
            )
            .await;

        DispatchOutcome {
            token,
            response: response_msg,
            stream: stream_info,
            tests,
            script_error,
            captured,
            executed: Some(descriptor.clone()),
        }
    }

    /// Invokes the installed cancel handle without installing a new one.
    /// A no-op when idle (spec §8 testable property #11).
    pub async fn cancel_active(&self) {
        if let Some(cancel) = self.in_flight.lock().await.take() {
            cancel.cancel();
        }
    }

    fn abort(&self, token: RequestToken, err: ErrKind) -> DispatchOutcome {
        DispatchOutcome {
            token,
            response: ResponseMsg::Http { token, result: Err(err) },
            stream: None,
            tests: Vec::new(),
            script_error: None,
            captured: HashMap::new(),
            executed: None,
        }
    }

    async fn apply_auth_header(
        &self,
        auth: &AuthSpec,
        env: &str,
        cancel: &CancelToken,
    ) -> Result<Option<(String, String)>, ErrKind> {
        match auth {
            AuthSpec::None => Ok(None),
            AuthSpec::Basic { username, password } => {
                use base64::engine::general_purpose::STANDARD as BASE64;
                use base64::Engine;
                let encoded = BASE64.encode(format!("{username}:{password}"));
                Ok(Some(("Authorization".to_string(), format!("Basic {encoded}"))))
            }
            AuthSpec::Bearer { token } => {
                Ok(Some(("Authorization".to_string(), format!("Bearer {token}"))))
            }
            AuthSpec::ApiKey { header, value } => Ok(Some((header.clone(), value.clone()))),
            AuthSpec::OAuth2(spec) => {
                let grant_type: GrantType = spec
                    .grant_type
                    .ok_or_else(|| ErrKind::Auth("oauth2 spec missing grant_type".to_string()))?
                    .into();
                let entry = self
                    .oauth
                    .ensure_token(env, grant_type, spec, cancel)
                    .await
                    .map_err(|e| match e {
                        ErrKind::Canceled => ErrKind::Canceled,
                        other => ErrKind::Auth(other.to_string()),
                    })?;
                Ok(Some(("Authorization".to_string(), format!("Bearer {}", entry.access_token))))
            }
        }
    }

    async fn run_post_script(
        &self,
        post_script: &Option<String>,
        response: &ResponseMsg,
        stream: Option<&StreamInfo>,
    ) -> (Vec<TestResult>, Option<String>) {
        let Some(script) = post_script else {
            return (Vec::new(), None);
        };
        let view = match response {
            ResponseMsg::Http { result: Ok(http), .. } => ScriptResponseView::Http(http),
            ResponseMsg::Grpc { result: Ok(grpc), .. } => ScriptResponseView::Grpc(grpc),
            _ => return (Vec::new(), None),
        };
        match self.script.run_post(script, view, stream).await {
            Ok((tests, _vars)) => (tests, None),
            Err(err) => (vec![script_error_as_test(&err)], Some(err.to_string())),
        }
    }

    async fn apply_captures(
        &self,
        specs: &[CaptureSpec],
        env: &str,
        doc_path: &str,
        response: &ResponseMsg,
        stream: Option<&StreamInfo>,
    ) -> HashMap<String, String> {
        if specs.is_empty() {
            return HashMap::new();
        }

        let (status, code, headers, body) = match response {
            ResponseMsg::Http { result: Ok(http), .. } => (
                Some(format!("{} {}", http.status_code, http.status_text)),
                Some(http.status_code),
                Some(&http.headers),
                Some(&http.body),
            ),
            _ => (None, None, None, None),
        };
        let json = body.and_then(|b| serde_json::from_slice::<serde_json::Value>(b).ok());
        let text = body.and_then(|b| std::str::from_utf8(b).ok());

        let summary_holder;
        let events_holder;
        let stream_ctx = stream.map(|s| {
            summary_holder = s.summary_json();
            events_holder = s.events_json();
            StreamEvalContext {
                kind: match s.kind {
                    StreamKind::Sse => "sse",
                    StreamKind::WebSocket => "websocket",
                },
                summary: &summary_holder,
                events: &events_holder,
            }
        });

        let eval_ctx = ResponseEvalContext {
            status: status.as_deref(),
            code,
            headers,
            json: json.as_ref(),
            text,
            stream: stream_ctx,
        };

        let mut captured = HashMap::new();
        let mut store = self.captures.lock().await;
        let now = Utc::now();
        for spec in specs {
            let Some(value) = evaluate_expression(&spec.expression, &eval_ctx) else {
                continue;
            };
            match spec.scope {
                CaptureScope::Request => {
                    captured.insert(spec.name.clone(), value);
                }
                CaptureScope::File => {
                    store.set_file(env, doc_path, &spec.name, value.clone(), spec.secret, now);
                    captured.insert(spec.name.clone(), value);
                }
                CaptureScope::Global => {
                    store.set_global(env, &spec.name, value.clone(), spec.secret, now);
                    captured.insert(spec.name.clone(), value);
                }
            }
        }
        captured
    }
}

/// Merges a resolved auth header into the prepared call, unless the request
/// already declared a header of the same name explicitly (explicit headers
/// win over the auth spec).
fn inject_auth_header(call: &mut PreparedCall, name: &str, value: &str) {
    let headers = match call {
        PreparedCall::Http(req) | PreparedCall::Sse(req) => &mut req.headers,
        PreparedCall::Grpc(req) => &mut req.target.metadata,
        PreparedCall::Ws { .. } => return,
    };
    if !headers.contains(name) {
        headers.set(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::NullScriptRunner;
    use reqtui_model::response::RequestEcho;
    use reqtui_model::{BodySource, Headers as ModelHeaders, Method, RequestMetadata, RequestSettings};
    use reqtui_oauth::ReqwestOAuthTransport;
    use reqtui_transport::{PreparedGrpcRequest, PreparedHttpRequest};
    use std::time::Duration;

    struct StubHttp;

    #[async_trait::async_trait]
    impl HttpTransport for StubHttp {
        async fn send(
            &self,
            _req: PreparedHttpRequest,
            _timeout: Duration,
            _cancel: CancelToken,
        ) -> Result<reqtui_model::HttpResponse, ErrKind> {
            Ok(reqtui_model::HttpResponse {
                status_text: "OK".into(),
                status_code: 200,
                protocol: "HTTP/1.1".into(),
                request_echo: RequestEcho {
                    method: "GET".into(),
                    headers: ModelHeaders::new(),
                    host: "example.com".into(),
                    content_length: None,
                    transfer_encoding: None,
                },
                body: b"{\"value\":1}".to_vec(),
                duration: Duration::from_millis(1),
                effective_url: "https://example.com".into(),
                headers: ModelHeaders::new(),
                timeline: None,
                trace_report: None,
            })
        }

        async fn open_stream(
            &self,
            _req: PreparedHttpRequest,
            _cancel: CancelToken,
        ) -> Result<reqwest::Response, ErrKind> {
            Err(ErrKind::Transport("not used".into()))
        }
    }

    struct StubGrpc;

    #[async_trait::async_trait]
    impl GrpcTransport for StubGrpc {
        async fn invoke(
            &self,
            _req: PreparedGrpcRequest,
            _timeout: Duration,
            _cancel: CancelToken,
        ) -> Result<reqtui_model::GrpcResponse, ErrKind> {
            unreachable!("not exercised in these tests")
        }
    }

    fn make_dispatcher() -> Dispatcher<ReqwestOAuthTransport> {
        let oauth = Arc::new(Manager::new(ReqwestOAuthTransport::new(reqwest::Client::new())));
        Dispatcher::new(Arc::new(StubHttp), Arc::new(StubGrpc), oauth, Arc::new(NullScriptRunner))
    }

    fn get_descriptor(url: &str) -> RequestDescriptor {
        RequestDescriptor {
            method: Method::Http(reqtui_model::HttpMethod::Get),
            url: url.to_string(),
            grpc: None,
            headers: ModelHeaders::new(),
            body: BodySource::None,
            metadata: RequestMetadata::default(),
            settings: RequestSettings::default(),
            line_range: (0, 0),
        }
    }

    fn empty_ctx<'a>(doc: &'a Document, environment: &'a Environment) -> ExecutionContext<'a> {
        ExecutionContext {
            doc,
            environment,
            capture_env_override: None,
            cwd: Path::new("."),
            chained_vars: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn successful_send_applies_captures() {
        let dispatcher = make_dispatcher();
        let mut descriptor = get_descriptor("https://example.com/x");
        descriptor.metadata.captures.push(CaptureSpec {
            scope: CaptureScope::Request,
            name: "value".into(),
            expression: "response.json.value".into(),
            secret: false,
        });

        let doc = Document { path: "/a.http".into(), requests: vec![], defaults: HashMap::new() };
        let environment = Environment::new("dev");
        let ctx = empty_ctx(&doc, &environment);

        let outcome = dispatcher
            .execute_request(&descriptor, Duration::from_secs(30), ctx)
            .await;

        assert!(matches!(outcome.response, ResponseMsg::Http { result: Ok(_), .. }));
        assert_eq!(outcome.captured.get("value"), Some(&"1".to_string()));
    }

    #[tokio::test]
    async fn unresolved_template_aborts_before_send() {
        let dispatcher = make_dispatcher();
        let descriptor = get_descriptor("https://example.com/{{missing}}");

        let doc = Document { path: "/a.http".into(), requests: vec![], defaults: HashMap::new() };
        let environment = Environment::new("dev");
        let ctx = empty_ctx(&doc, &environment);

        let outcome = dispatcher
            .execute_request(&descriptor, Duration::from_secs(30), ctx)
            .await;

        match outcome.response {
            ResponseMsg::Http { result: Err(ErrKind::Template(name)), .. } => {
                assert_eq!(name, "missing")
            }
            other => panic!("expected a template error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_active_on_idle_dispatcher_is_a_no_op() {
        let dispatcher = make_dispatcher();
        dispatcher.cancel_active().await;
    }

    #[tokio::test]
    async fn basic_auth_header_is_computed() {
        let dispatcher = make_dispatcher();
        let cancel = CancelToken::new();
        let header = dispatcher
            .apply_auth_header(
                &AuthSpec::Basic { username: "u".into(), password: "p".into() },
                "dev",
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(header, Some(("Authorization".to_string(), "Basic dTpw".to_string())));
    }

    #[tokio::test]
    async fn repeat_send_cancels_the_prior_in_flight_token() {
        let dispatcher = make_dispatcher();
        let descriptor = get_descriptor("https://example.com/x");
        let doc = Document { path: "/a.http".into(), requests: vec![], defaults: HashMap::new() };
        let environment = Environment::new("dev");

        let first = dispatcher
            .execute_request(&descriptor, Duration::from_secs(30), empty_ctx(&doc, &environment))
            .await;
        let second = dispatcher
            .execute_request(&descriptor, Duration::from_secs(30), empty_ctx(&doc, &environment))
            .await;

        assert!(first.token < second.token);
    }

    #[test]
    fn inject_auth_header_does_not_override_an_explicit_header() {
        let mut headers = ModelHeaders::new();
        headers.insert("Authorization", "Bearer explicit");
        let mut call = PreparedCall::Http(PreparedHttpRequest {
            method: "GET".into(),
            url: "https://example.com".into(),
            headers,
            body: Vec::new(),
            trace_enabled: false,
        });
        inject_auth_header(&mut call, "Authorization", "Bearer computed");
        let PreparedCall::Http(req) = call else { unreachable!() };
        assert_eq!(req.headers.get("authorization"), Some("Bearer explicit"));
    }

    #[test]
    fn inject_auth_header_sets_when_absent() {
        let mut call = PreparedCall::Http(PreparedHttpRequest {
            method: "GET".into(),
            url: "https://example.com".into(),
            headers: ModelHeaders::new(),
            body: Vec::new(),
            trace_enabled: false,
        });
        inject_auth_header(&mut call, "Authorization", "Bearer computed");
        let PreparedCall::Http(req) = call else { unreachable!() };
        assert_eq!(req.headers.get("authorization"), Some("Bearer computed"));
    }
}
