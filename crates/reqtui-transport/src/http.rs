//! HTTP client transport (spec §4.4, §6): "the HTTP client's `send(ctx,
//! req) -> response|err` contract, with a factory hook so callers can inject
//! a stub transport for tests" — adapted from a byte-forwarding reverse
//! proxy's request-building idiom to a terminal client's "build one request,
//! read one full response" posture.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqtui_config::Options;
use reqtui_model::{CancelToken, ErrKind, Headers, HttpResponse, RequestEcho, Timeline};

/// A fully expanded, ready-to-send HTTP request. Everything template-shaped
/// has already been resolved by the preparer; this type carries only wire
/// values.
#[derive(Debug, Clone)]
pub struct PreparedHttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub trace_enabled: bool,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(
        &self,
        req: PreparedHttpRequest,
        timeout: Duration,
        cancel: CancelToken,
    ) -> Result<HttpResponse, ErrKind>;

    /// Opens a request and returns the raw streaming response so the caller
    /// can feed it to the Stream Runner (spec §4.4: "read the body
    /// incrementally and feed events to the Stream Runner"). Separate from
    /// `send` because SSE bodies must not be buffered in full.
    async fn open_stream(
        &self,
        req: PreparedHttpRequest,
        cancel: CancelToken,
    ) -> Result<reqwest::Response, ErrKind>;
}

/// `reqwest`-backed transport. Constructed per-`Options` so TLS verification
/// and redirect policy follow the active profile (spec §6).
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
}

impl ReqwestHttpTransport {
    pub fn from_options(options: &Options) -> Result<Self, ErrKind> {
        let redirect = if options.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        };
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!options.verify_tls)
            .redirect(redirect)
            .build()
            .map_err(|e| ErrKind::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn send(
        &self,
        req: PreparedHttpRequest,
        timeout: Duration,
        cancel: CancelToken,
    ) -> Result<HttpResponse, ErrKind> {
        let method = reqwest::Method::from_bytes(req.method.as_bytes())
            .map_err(|e| ErrKind::Http(e.to_string()))?;

        let mut builder = self.client.request(method.clone(), &req.url).timeout(timeout);
        for (name, value) in req.headers.iter() {
            builder = builder.header(name, value);
        }
        if !req.body.is_empty() {
            builder = builder.body(req.body.clone());
        }

        let start = Instant::now();
        let mut timeline = Timeline::default();

        let response = tokio::select! {
            biased;
            _ = cancel.canceled() => return Err(ErrKind::Canceled),
            result = builder.send() => result.map_err(|e| {
                if e.is_timeout() {
                    ErrKind::Http(format!("request timed out after {timeout:?}"))
                } else {
                    ErrKind::Transport(e.to_string())
                }
            })?,
        };

        timeline.wrote_request = Some(start.elapsed());
        timeline.first_byte = Some(start.elapsed());
        timeline.alpn_or_resumed_seen = true;
        if req.url.starts_with("https://") {
            timeline.tls_handshake_seen = true;
        }

        let status_code = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or("")
            .to_string();
        let protocol = format!("{:?}", response.version());
        let effective_url = response.url().to_string();

        let mut headers = Headers::new();
        for (name, value) in response.headers().iter() {
            headers.insert(name.as_str(), value.to_str().unwrap_or_default());
        }

        let body = tokio::select! {
            biased;
            _ = cancel.canceled() => return Err(ErrKind::Canceled),
            result = response.bytes() => result.map_err(|e| ErrKind::Transport(e.to_string()))?,
        };

        timeline.done = Some(start.elapsed());

        let trace_report = if req.trace_enabled {
            Some(crate::timeline::build_trace_report(&timeline))
        } else {
            None
        };

        let content_length = headers
            .get("content-length")
            .and_then(|v| v.parse::<u64>().ok());
        let transfer_encoding = headers.get("transfer-encoding").map(|v| v.to_string());
        let host = headers
            .get("host")
            .map(|v| v.to_string())
            .unwrap_or_else(|| host_from_url(&req.url));

        Ok(HttpResponse {
            status_text,
            status_code,
            protocol,
            request_echo: RequestEcho {
                method: req.method,
                headers: req.headers,
                host,
                content_length,
                transfer_encoding,
            },
            body: body.to_vec(),
            duration: start.elapsed(),
            effective_url,
            headers,
            timeline: Some(timeline),
            trace_report,
        })
    }

    async fn open_stream(
        &self,
        req: PreparedHttpRequest,
        cancel: CancelToken,
    ) -> Result<reqwest::Response, ErrKind> {
        let method = reqwest::Method::from_bytes(req.method.as_bytes())
            .map_err(|e| ErrKind::Http(e.to_string()))?;
        let mut builder = self.client.request(method, &req.url);
        for (name, value) in req.headers.iter() {
            builder = builder.header(name, value);
        }
        if !req.body.is_empty() {
            builder = builder.body(req.body.clone());
        }
        tokio::select! {
            biased;
            _ = cancel.canceled() => Err(ErrKind::Canceled),
            result = builder.send() => result.map_err(|e| ErrKind::Transport(e.to_string())),
        }
    }
}

/// Extracts the host (and port, if present) from a URL without a full
/// parser, since the one header that matters is usually just echoed back.
fn host_from_url(url: &str) -> String {
    let without_scheme = url.splitn(2, "://").nth(1).unwrap_or(url);
    let authority = without_scheme.split(['/', '?', '#']).next().unwrap_or("");
    authority.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options() -> Options {
        Options::default()
    }

    #[tokio::test]
    async fn sends_request_and_captures_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(header("x-trace", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
            .mount(&server)
            .await;

        let transport = ReqwestHttpTransport::from_options(&options()).unwrap();
        let mut headers = Headers::new();
        headers.insert("x-trace", "1");
        let req = PreparedHttpRequest {
            method: "GET".into(),
            url: format!("{}/ping", server.uri()),
            headers,
            body: Vec::new(),
            trace_enabled: true,
        };

        let response = transport
            .send(req, Duration::from_secs(5), CancelToken::new())
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, b"pong");
        assert!(response.trace_report.is_some());
    }

    #[tokio::test]
    async fn cancellation_before_send_returns_canceled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let transport = ReqwestHttpTransport::from_options(&options()).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let req = PreparedHttpRequest {
            method: "GET".into(),
            url: format!("{}/slow", server.uri()),
            headers: Headers::new(),
            body: Vec::new(),
            trace_enabled: false,
        };

        let err = transport
            .send(req, Duration::from_secs(5), cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
    }
}
