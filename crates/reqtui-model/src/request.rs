//! Request Descriptor (spec §3) and preparation helpers (spec §4.1).

use crate::capture::CaptureSpec;
use crate::headers::Headers;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Http(HttpMethod),
    Grpc,
    Ws,
    Sse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            "HEAD" => Some(Self::Head),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }
}

/// Body source for HTTP/WS/SSE requests. Invariant (spec §3): after
/// preparation, exactly one of `inline`/`file` is populated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BodySource {
    #[default]
    None,
    Inline(String),
    File {
        path: PathBuf,
        expand_templates: bool,
    },
}

/// gRPC-specific message payload. Invariant (spec §3): after preparation,
/// inline message OR message-file is set, never both, for the same call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrpcMessage {
    pub inline: Option<String>,
    pub file: Option<PathBuf>,
    pub expand_templates: bool,
    /// Populated when `file` + `expand_templates` is set: the expanded text,
    /// leaving `file` intact (spec §4.1).
    pub expanded: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrpcTarget {
    pub target: String,
    pub service: Option<String>,
    pub method: Option<String>,
    pub full_method: Option<String>,
    pub plaintext: Option<bool>,
    pub descriptor_set_path: Option<PathBuf>,
    pub use_reflection: bool,
    pub message: GrpcMessage,
    pub metadata: Headers,
}

/// Strip a `grpc://`/`grpcs://` scheme from a target, preserving path and
/// query, and returning whether TLS should be forced (spec §4.1, property #2).
pub fn normalize_grpc_target(raw: &str) -> (String, Option<bool>) {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("grpcs://") {
        (rest.to_string(), Some(false))
    } else if let Some(rest) = trimmed.strip_prefix("grpc://") {
        (rest.to_string(), None)
    } else {
        (trimmed.to_string(), None)
    }
}

impl GrpcTarget {
    /// Infer `/Service/Method` from discrete `service`+`method` fields when
    /// `full_method` is unset (spec §4.1).
    pub fn resolved_full_method(&self) -> Option<String> {
        if let Some(full) = &self.full_method {
            return Some(full.clone());
        }
        match (&self.service, &self.method) {
            (Some(s), Some(m)) => Some(format!("/{s}/{m}")),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    ClientCredentials,
    Password,
    RefreshToken,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuth2Spec {
    pub grant_type: Option<GrantTypeSpec>,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
    pub audience: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantTypeSpec {
    ClientCredentials,
    Password,
    RefreshToken,
}

impl From<GrantTypeSpec> for GrantType {
    fn from(g: GrantTypeSpec) -> Self {
        match g {
            GrantTypeSpec::ClientCredentials => GrantType::ClientCredentials,
            GrantTypeSpec::Password => GrantType::Password,
            GrantTypeSpec::RefreshToken => GrantType::RefreshToken,
        }
    }
}

/// Supplemented (SPEC_FULL §2): the generic auth spec a real engine needs
/// alongside OAuth2.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthSpec {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    Bearer {
        token: String,
    },
    ApiKey {
        header: String,
        value: String,
    },
    OAuth2(OAuth2Spec),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceSpec {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSpec {
    pub count: usize,
    pub warmup: usize,
    pub delay: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestMetadata {
    pub name: Option<String>,
    pub tags: Vec<String>,
    pub captures: Vec<CaptureSpec>,
    pub pre_script: Option<String>,
    pub post_script: Option<String>,
    pub auth: AuthSpec,
    pub trace: TraceSpec,
    pub profile: Option<ProfileSpec>,
}

#[derive(Debug, Clone, Copy)]
pub struct RequestSettings {
    pub timeout: Option<Duration>,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self { timeout: None }
    }
}

#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub grpc: Option<GrpcTarget>,
    pub headers: Headers,
    pub body: BodySource,
    pub metadata: RequestMetadata,
    pub settings: RequestSettings,
    pub line_range: (usize, usize),
}

impl RequestDescriptor {
    /// Validate the "never both populated" invariant for a gRPC message.
    pub fn grpc_message_invariant_holds(&self) -> bool {
        match &self.grpc {
            Some(g) => !(g.message.inline.is_some() && g.message.file.is_some()),
            None => true,
        }
    }

    /// Resolve the effective send timeout: request override, else the base.
    pub fn effective_timeout(&self, base: Duration) -> Duration {
        self.settings.timeout.unwrap_or(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grpc_target_strips_plain_scheme() {
        let (target, plaintext) = normalize_grpc_target("grpc://host:443/path?q=1");
        assert_eq!(target, "host:443/path?q=1");
        assert_eq!(plaintext, None);
    }

    #[test]
    fn grpc_target_strips_tls_scheme_and_forces_tls() {
        let (target, plaintext) = normalize_grpc_target("grpcs://host:443");
        assert_eq!(target, "host:443");
        assert_eq!(plaintext, Some(false));
    }

    #[test]
    fn grpc_target_without_scheme_is_unchanged() {
        let (target, plaintext) = normalize_grpc_target("  host:443  ");
        assert_eq!(target, "host:443");
        assert_eq!(plaintext, None);
    }

    #[test]
    fn full_method_inferred_from_service_and_method() {
        let g = GrpcTarget {
            service: Some("pkg.Svc".into()),
            method: Some("Call".into()),
            ..Default::default()
        };
        assert_eq!(g.resolved_full_method(), Some("/pkg.Svc/Call".to_string()));
    }

    #[test]
    fn full_method_explicit_wins() {
        let g = GrpcTarget {
            full_method: Some("/explicit/Method".into()),
            service: Some("ignored".into()),
            method: Some("ignored".into()),
            ..Default::default()
        };
        assert_eq!(
            g.resolved_full_method(),
            Some("/explicit/Method".to_string())
        );
    }

    #[test]
    fn effective_timeout_falls_back_to_base() {
        let req = RequestDescriptor {
            method: Method::Http(HttpMethod::Get),
            url: "https://example.com".into(),
            grpc: None,
            headers: Headers::new(),
            body: BodySource::None,
            metadata: RequestMetadata::default(),
            settings: RequestSettings::default(),
            line_range: (0, 0),
        };
        assert_eq!(
            req.effective_timeout(Duration::from_secs(30)),
            Duration::from_secs(30)
        );
    }
}
