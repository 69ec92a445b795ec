//! Request Preparer (spec §4.1): normalizes methods, expands `{{name}}`
//! templates, loads body files, resolves the effective timeout, and
//! produces a wire-ready call. The inline curl builder uses a shell-style
//! command-line tokenizer, and everything else consumes
//! `reqtui_model::resolver`/`reqtui_model::request`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqtui_model::{
    AuthSpec, BodySource, ErrKind, GrpcMessage, GrpcTarget, Headers, HttpMethod, Method,
    RequestDescriptor, RequestMetadata, RequestSettings, Resolver,
};
use reqtui_transport::{PreparedGrpcRequest, PreparedHttpRequest, WsDirective};

/// What the Dispatcher hands off to a transport once preparation succeeds.
#[derive(Debug, Clone)]
pub enum PreparedCall {
    Http(PreparedHttpRequest),
    Sse(PreparedHttpRequest),
    Grpc(PreparedGrpcRequest),
    Ws { url: String, script: Vec<WsDirective> },
}

#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub call: PreparedCall,
    pub auth: AuthSpec,
    pub metadata: RequestMetadata,
    pub timeout: Duration,
}

/// Expand every `{{name}}` placeholder in `text` via `resolver`. Fails with
/// `ErrKind::Template` naming the first variable that has no provider.
pub fn expand_template(text: &str, resolver: &Resolver) -> Result<String, ErrKind> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let Some(start) = rest.find("{{") else {
            out.push_str(rest);
            return Ok(out);
        };
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let name = after[..end].trim();
        let value = resolver
            .get(name)
            .ok_or_else(|| ErrKind::Template(name.to_string()))?;
        out.push_str(&value);
        rest = &after[end + 2..];
    }
}

fn expand_headers(headers: &Headers, resolver: &Resolver) -> Result<Headers, ErrKind> {
    let mut out = Headers::new();
    for (name, value) in headers.iter() {
        out.insert(name, expand_template(value, resolver)?);
    }
    Ok(out)
}

async fn resolve_body(
    body: &BodySource,
    resolver: &Resolver,
    cwd: &Path,
) -> Result<Vec<u8>, ErrKind> {
    match body {
        BodySource::None => Ok(Vec::new()),
        BodySource::Inline(text) => Ok(expand_template(text, resolver)?.into_bytes()),
        BodySource::File { path, expand_templates } => {
            let resolved = if path.is_absolute() { path.clone() } else { cwd.join(path) };
            let bytes = tokio::fs::read(&resolved)
                .await
                .map_err(|e| ErrKind::BodyFile(format!("{}: {e}", resolved.display())))?;
            if *expand_templates {
                let text = String::from_utf8(bytes)
                    .map_err(|e| ErrKind::BodyFile(format!("{}: {e}", resolved.display())))?;
                Ok(expand_template(&text, resolver)?.into_bytes())
            } else {
                Ok(bytes)
            }
        }
    }
}

async fn resolve_grpc_message(message: &GrpcMessage, resolver: &Resolver, cwd: &Path) -> Result<String, ErrKind> {
    if let Some(inline) = &message.inline {
        return expand_template(inline, resolver);
    }
    if let Some(path) = &message.file {
        let resolved = if path.is_absolute() { path.clone() } else { cwd.join(path) };
        let text = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| ErrKind::BodyFile(format!("{}: {e}", resolved.display())))?;
        return if message.expand_templates {
            expand_template(&text, resolver)
        } else {
            Ok(text)
        };
    }
    Ok("{}".to_string())
}

async fn prepare_grpc(
    descriptor: &RequestDescriptor,
    target: &GrpcTarget,
    resolver: &Resolver,
    cwd: &Path,
) -> Result<PreparedCall, ErrKind> {
    let (normalized, forced_plaintext) = reqtui_model::normalize_grpc_target(&target.target);
    let plaintext = forced_plaintext.or(target.plaintext);

    let full_method = target
        .resolved_full_method()
        .ok_or_else(|| ErrKind::Template("grpc target is missing service/method".to_string()))?;
    let full_method = expand_template(&full_method, resolver)?;

    let descriptor_set_path = match &target.descriptor_set_path {
        Some(path) => Some(PathBuf::from(expand_template(
            &path.to_string_lossy(),
            resolver,
        )?)),
        None => None,
    };
    let metadata = expand_headers(&target.metadata, resolver)?;
    let message_json = resolve_grpc_message(&target.message, resolver, cwd).await?;

    let resolved_target = GrpcTarget {
        target: normalized,
        service: target.service.clone(),
        method: target.method.clone(),
        full_method: Some(full_method.clone()),
        plaintext,
        descriptor_set_path,
        use_reflection: target.use_reflection,
        message: target.message.clone(),
        metadata,
    };
    let _ = descriptor;

    Ok(PreparedCall::Grpc(PreparedGrpcRequest {
        target: resolved_target,
        full_method,
        message_json,
    }))
}

fn parse_ws_script(text: &str) -> Result<Vec<WsDirective>, ErrKind> {
    let mut directives = Vec::new();
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (head, tail) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let tail = tail.trim();
        let directive = match head {
            "send" => WsDirective::Send(tail.to_string()),
            "send-json" => {
                let value = serde_json::from_str(tail)
                    .map_err(|e| ErrKind::ParseCurl(format!("invalid send-json payload: {e}")))?;
                WsDirective::SendJson(value)
            }
            "send-base64" => WsDirective::SendBase64(tail.to_string()),
            "send-file" => WsDirective::SendFile(PathBuf::from(tail)),
            "ping" => WsDirective::Ping,
            "pong" => WsDirective::Pong,
            "wait" => {
                let ms: u64 = tail
                    .parse()
                    .map_err(|_| ErrKind::ParseCurl(format!("invalid wait duration: {tail}")))?;
                WsDirective::Wait(Duration::from_millis(ms))
            }
            "close" => WsDirective::Close,
            other => return Err(ErrKind::ParseCurl(format!("unknown websocket directive: {other}"))),
        };
        directives.push(directive);
    }
    Ok(directives)
}

/// Prepares a fully resolved `RequestDescriptor` into a wire-ready call
/// (spec §4.1). Template expansion, gRPC target normalization, and body
/// loading all happen here; OAuth and transport invocation are the
/// Dispatcher's job.
pub async fn prepare(
    descriptor: &RequestDescriptor,
    resolver: &Resolver,
    base_timeout: Duration,
    cwd: &Path,
) -> Result<PreparedRequest, ErrKind> {
    let timeout = descriptor.effective_timeout(base_timeout);
    let trace_enabled = descriptor.metadata.trace.enabled;

    let call = match descriptor.method {
        Method::Http(method) => {
            let url = expand_template(descriptor.url.trim(), resolver)?;
            let headers = expand_headers(&descriptor.headers, resolver)?;
            let body = resolve_body(&descriptor.body, resolver, cwd).await?;
            PreparedCall::Http(PreparedHttpRequest {
                method: method.as_str().to_string(),
                url,
                headers,
                body,
                trace_enabled,
            })
        }
        Method::Sse => {
            let url = expand_template(descriptor.url.trim(), resolver)?;
            let headers = expand_headers(&descriptor.headers, resolver)?;
            let body = resolve_body(&descriptor.body, resolver, cwd).await?;
            PreparedCall::Sse(PreparedHttpRequest {
                method: HttpMethod::Get.as_str().to_string(),
                url,
                headers,
                body,
                trace_enabled,
            })
        }
        Method::Ws => {
            let url = expand_template(descriptor.url.trim(), resolver)?;
            let script_text = match &descriptor.body {
                BodySource::Inline(text) => expand_template(text, resolver)?,
                BodySource::File { path, expand_templates } => {
                    let resolved = if path.is_absolute() { path.clone() } else { cwd.join(path) };
                    let text = tokio::fs::read_to_string(&resolved)
                        .await
                        .map_err(|e| ErrKind::BodyFile(format!("{}: {e}", resolved.display())))?;
                    if *expand_templates {
                        expand_template(&text, resolver)?
                    } else {
                        text
                    }
                }
                BodySource::None => String::new(),
            };
            PreparedCall::Ws {
                url,
                script: parse_ws_script(&script_text)?,
            }
        }
        Method::Grpc => {
            let target = descriptor
                .grpc
                .as_ref()
                .ok_or_else(|| ErrKind::Template("missing grpc target".to_string()))?;
            prepare_grpc(descriptor, target, resolver, cwd).await?
        }
    };

    Ok(PreparedRequest {
        call,
        auth: descriptor.metadata.auth.clone(),
        metadata: descriptor.metadata.clone(),
        timeout,
    })
}

/// Splits `curl ...` invocations (optionally continued with trailing `\`)
/// into tokens, honoring single and double quotes (spec §4.1: "Inline-line
/// builder").
fn tokenize_curl(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            c if c.is_whitespace() && !in_single && !in_double => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            '\\' if !in_single => {
                if let Some(&next) = chars.peek() {
                    current.push(next);
                    chars.next();
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Joins backslash-continued lines into one logical line before tokenizing.
fn join_continuations(text: &str) -> String {
    let mut joined = String::new();
    for line in text.lines() {
        if let Some(stripped) = line.strip_suffix('\\') {
            joined.push_str(stripped.trim_end());
            joined.push(' ');
        } else {
            joined.push_str(line);
        }
    }
    joined
}

/// Parses a `curl ...` command into a `RequestDescriptor` (spec §4.1,
/// testable property #3): `-X`/`--request` sets the method, `-H`/`--header`
/// appends a header, `-d`/`--data`/`--data-raw` sets the body (defaulting
/// the method to POST), the first bare token is the URL.
fn build_from_curl(text: &str) -> Result<RequestDescriptor, ErrKind> {
    let joined = join_continuations(text);
    let tokens = tokenize_curl(joined.trim());
    let mut iter = tokens.into_iter();
    match iter.next() {
        Some(head) if head == "curl" => {}
        _ => return Err(ErrKind::ParseCurl("expected a curl command".to_string())),
    }

    let mut method: Option<HttpMethod> = None;
    let mut url: Option<String> = None;
    let mut headers = Headers::new();
    let mut body: Option<String> = None;

    let mut tokens = iter.peekable();
    while let Some(token) = tokens.next() {
        match token.as_str() {
            "-X" | "--request" => {
                let value = tokens
                    .next()
                    .ok_or_else(|| ErrKind::ParseCurl("-X requires a method".to_string()))?;
                method = Some(
                    HttpMethod::parse(&value)
                        .ok_or_else(|| ErrKind::ParseCurl(format!("unknown method: {value}")))?,
                );
            }
            "-H" | "--header" => {
                let value = tokens
                    .next()
                    .ok_or_else(|| ErrKind::ParseCurl("-H requires a value".to_string()))?;
                let (name, v) = value
                    .split_once(':')
                    .ok_or_else(|| ErrKind::ParseCurl(format!("malformed header: {value}")))?;
                headers.insert(name.trim(), v.trim());
            }
            "-d" | "--data" | "--data-raw" => {
                let value = tokens
                    .next()
                    .ok_or_else(|| ErrKind::ParseCurl("-d requires a value".to_string()))?;
                body = Some(value);
            }
            other if !other.starts_with('-') && url.is_none() => {
                url = Some(other.to_string());
            }
            _ => {}
        }
    }

    let url = url.ok_or_else(|| ErrKind::ParseCurl("missing url".to_string()))?;
    let method = method.unwrap_or(if body.is_some() { HttpMethod::Post } else { HttpMethod::Get });
    let body = match body {
        Some(text) => BodySource::Inline(text),
        None => BodySource::None,
    };

    Ok(RequestDescriptor {
        method: Method::Http(method),
        url,
        grpc: None,
        headers,
        body,
        metadata: RequestMetadata::default(),
        settings: RequestSettings::default(),
        line_range: (0, 0),
    })
}

/// Synthesizes a descriptor from a single editor line: a `curl ...`
/// invocation, a bare `http(s)://` URL (implies GET), or `None` for
/// anything else (spec §4.1, testable property #3).
pub fn build_from_line(line: &str) -> Result<Option<RequestDescriptor>, ErrKind> {
    let trimmed = line.trim();
    if trimmed.starts_with("curl ") || trimmed == "curl" {
        return build_from_curl(trimmed).map(Some);
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Ok(Some(RequestDescriptor {
            method: Method::Http(HttpMethod::Get),
            url: trimmed.to_string(),
            grpc: None,
            headers: Headers::new(),
            body: BodySource::None,
            metadata: RequestMetadata::default(),
            settings: RequestSettings::default(),
            line_range: (0, 0),
        }));
    }
    Ok(None)
}
