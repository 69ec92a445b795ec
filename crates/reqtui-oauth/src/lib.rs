//! OAuth Manager (spec §4.3): fetches and caches client-credentials /
//! password / refresh-token grants, sharing in-flight fetches and honoring
//! cancellation via the same background-task-over-channel idiom used
//! elsewhere in this engine (background work, cooperative shutdown).

use reqtui_model::{CancelToken, ErrKind, GrantType, OAuth2Spec};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Stable hash over (environment, grant type, token-url, client-id,
    /// scope, audience, username) (spec §3: "OAuth Entry").
    pub fn compute(env: &str, grant_type: GrantType, spec: &OAuth2Spec) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(env.as_bytes());
        hasher.update([grant_type as u8]);
        hasher.update(spec.token_url.as_bytes());
        hasher.update(spec.client_id.as_bytes());
        hasher.update(spec.scope.as_deref().unwrap_or("").as_bytes());
        hasher.update(spec.audience.as_deref().unwrap_or("").as_bytes());
        hasher.update(spec.username.as_deref().unwrap_or("").as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }
}

#[derive(Debug, Clone)]
pub struct TokenEntry {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: chrono::DateTime<chrono::Utc>,
}

impl TokenEntry {
    pub fn is_fresh(&self, now: chrono::DateTime<chrono::Utc>, skew: Duration) -> bool {
        self.expiry > now + chrono::Duration::from_std(skew).unwrap_or_default()
    }
}

/// Injectable token-request transport so the Manager can be tested without a
/// real network call (spec §4.3: "through an injectable transport").
#[async_trait::async_trait]
pub trait OAuthTransport: Send + Sync + 'static {
    async fn request_token(&self, grant_type: GrantType, spec: &OAuth2Spec) -> Result<TokenEntry, String>;
}

/// Default transport backed by `reqwest`, posting a standard OAuth2
/// token-endpoint form body.
pub struct ReqwestOAuthTransport {
    client: reqwest::Client,
}

impl ReqwestOAuthTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl OAuthTransport for ReqwestOAuthTransport {
    async fn request_token(&self, grant_type: GrantType, spec: &OAuth2Spec) -> Result<TokenEntry, String> {
        let mut form: Vec<(&str, &str)> = Vec::new();
        match grant_type {
            GrantType::ClientCredentials => form.push(("grant_type", "client_credentials")),
            GrantType::Password => form.push(("grant_type", "password")),
            GrantType::RefreshToken => form.push(("grant_type", "refresh_token")),
        }
        form.push(("client_id", &spec.client_id));
        form.push(("client_secret", &spec.client_secret));
        if let Some(scope) = &spec.scope {
            form.push(("scope", scope));
        }
        if let Some(audience) = &spec.audience {
            form.push(("audience", audience));
        }
        if let Some(username) = &spec.username {
            form.push(("username", username));
        }
        if let Some(password) = &spec.password {
            form.push(("password", password));
        }
        if let Some(refresh_token) = &spec.refresh_token {
            form.push(("refresh_token", refresh_token));
        }

        let resp = self
            .client
            .post(&spec.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !resp.status().is_success() {
            return Err(format!("token endpoint returned {}", resp.status()));
        }

        let body: TokenResponseBody = resp.json().await.map_err(|e| e.to_string())?;
        let expiry = chrono::Utc::now() + chrono::Duration::seconds(body.expires_in.unwrap_or(3600));
        Ok(TokenEntry {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expiry,
        })
    }
}

#[derive(serde::Deserialize)]
struct TokenResponseBody {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

enum Slot {
    Ready(TokenEntry),
    InFlight(watch::Receiver<Option<Result<TokenEntry, String>>>),
}

/// Clock skew tolerated before a cached token is considered stale.
pub const DEFAULT_SKEW: Duration = Duration::from_secs(30);

pub struct Manager<T: OAuthTransport> {
    transport: T,
    cache: Mutex<HashMap<CacheKey, Slot>>,
}

impl<T: OAuthTransport> Manager<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Ensure a fresh token for `spec` under `env`, sharing one in-flight
    /// transport call across concurrent callers with the same key (spec
    /// §4.3, §8 testable properties #4/S2).
    pub async fn ensure_token(
        &self,
        env: &str,
        grant_type: GrantType,
        spec: &OAuth2Spec,
        cancel: &CancelToken,
    ) -> Result<TokenEntry, ErrKind> {
        let key = CacheKey::compute(env, grant_type, spec);
        let now = chrono::Utc::now();

        loop {
            let mut guard = self.cache.lock().await;
            match guard.get(&key) {
                Some(Slot::Ready(entry)) if entry.is_fresh(now, DEFAULT_SKEW) => {
                    return Ok(entry.clone());
                }
                Some(Slot::InFlight(rx)) => {
                    let mut rx = rx.clone();
                    drop(guard);
                    return Self::await_inflight(&mut rx, cancel).await;
                }
                _ => {
                    let (tx, rx) = watch::channel(None);
                    guard.insert(key.clone(), Slot::InFlight(rx));
                    drop(guard);
                    debug!(target: "reqtui::oauth", env, "fetching oauth token");
                    let result = self.fetch_with_cancel(grant_type, spec, cancel).await;
                    let mut guard = self.cache.lock().await;
                    let watch_value = match &result {
                        Ok(entry) => {
                            guard.insert(key.clone(), Slot::Ready(entry.clone()));
                            Some(Ok(entry.clone()))
                        }
                        Err(e) => {
                            guard.remove(&key);
                            Some(Err(e.to_string()))
                        }
                    };
                    drop(guard);
                    let _ = tx.send(watch_value);
                    return result;
                }
            }
        }
    }

    async fn fetch_with_cancel(
        &self,
        grant_type: GrantType,
        spec: &OAuth2Spec,
        cancel: &CancelToken,
    ) -> Result<TokenEntry, ErrKind> {
        tokio::select! {
            biased;
            _ = cancel.canceled() => Err(ErrKind::Canceled),
            result = self.transport.request_token(grant_type, spec) => {
                result.map_err(ErrKind::AuthTransport)
            }
        }
    }

    async fn await_inflight(
        rx: &mut watch::Receiver<Option<Result<TokenEntry, String>>>,
        cancel: &CancelToken,
    ) -> Result<TokenEntry, ErrKind> {
        loop {
            if let Some(result) = rx.borrow().clone() {
                return result.map_err(ErrKind::AuthTransport);
            }
            tokio::select! {
                biased;
                _ = cancel.canceled() => return Err(ErrKind::Canceled),
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Err(ErrKind::AuthTransport("oauth fetch task dropped".into()));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    struct CountingTransport {
        calls: AtomicUsize,
        fail_next: std::sync::atomic::AtomicBool,
        delay: Option<StdDuration>,
    }

    impl CountingTransport {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_next: std::sync::atomic::AtomicBool::new(false),
                delay: None,
            }
        }

        fn with_delay(delay: StdDuration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_next: std::sync::atomic::AtomicBool::new(false),
                delay: Some(delay),
            }
        }
    }

    #[async_trait::async_trait]
    impl OAuthTransport for CountingTransport {
        async fn request_token(&self, _grant_type: GrantType, _spec: &OAuth2Spec) -> Result<TokenEntry, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err("boom".into());
            }
            Ok(TokenEntry {
                access_token: "tok".into(),
                refresh_token: None,
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        }
    }

    fn spec() -> OAuth2Spec {
        OAuth2Spec {
            token_url: "https://auth.example.com/token".into(),
            client_id: "client".into(),
            client_secret: "secret".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn sequential_calls_same_key_issue_one_transport_call() {
        let manager = Manager::new(CountingTransport::new());
        let cancel = CancelToken::new();
        let spec = spec();

        let first = manager
            .ensure_token("dev", GrantType::ClientCredentials, &spec, &cancel)
            .await
            .unwrap();
        let second = manager
            .ensure_token("dev", GrantType::ClientCredentials, &spec, &cancel)
            .await
            .unwrap();

        assert_eq!(first.access_token, second.access_token);
        assert_eq!(manager.transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn switching_environment_forces_new_fetch() {
        let manager = Manager::new(CountingTransport::new());
        let cancel = CancelToken::new();
        let spec = spec();

        manager
            .ensure_token("dev", GrantType::ClientCredentials, &spec, &cancel)
            .await
            .unwrap();
        manager
            .ensure_token("stage", GrantType::ClientCredentials, &spec, &cancel)
            .await
            .unwrap();

        assert_eq!(manager.transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_calls_share_single_inflight_fetch() {
        let manager = Arc::new(Manager::new(CountingTransport::with_delay(StdDuration::from_millis(50))));
        let cancel = CancelToken::new();
        let spec = spec();

        let m1 = manager.clone();
        let s1 = spec.clone();
        let c1 = cancel.clone();
        let h1 = tokio::spawn(async move {
            m1.ensure_token("dev", GrantType::ClientCredentials, &s1, &c1).await
        });

        tokio::time::sleep(StdDuration::from_millis(5)).await;

        let m2 = manager.clone();
        let s2 = spec.clone();
        let c2 = cancel.clone();
        let h2 = tokio::spawn(async move {
            m2.ensure_token("dev", GrantType::ClientCredentials, &s2, &c2).await
        });

        let (r1, r2) = tokio::join!(h1, h2);
        assert!(r1.unwrap().is_ok());
        assert!(r2.unwrap().is_ok());
        assert_eq!(manager.transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_while_blocked_returns_canceled() {
        let manager = Manager::new(CountingTransport::with_delay(StdDuration::from_millis(200)));
        let cancel = CancelToken::new();
        let spec = spec();

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(StdDuration::from_millis(10)).await;
            cancel_clone.cancel();
        });

        let result = manager
            .ensure_token("dev", GrantType::ClientCredentials, &spec, &cancel)
            .await;
        assert!(matches!(result, Err(ErrKind::Canceled)));
    }

    #[tokio::test]
    async fn reqwest_transport_parses_token_endpoint_response() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "abc123",
                "expires_in": 3600,
            })))
            .mount(&server)
            .await;

        let transport = ReqwestOAuthTransport::new(reqwest::Client::new());
        let mut spec = spec();
        spec.token_url = format!("{}/token", server.uri());

        let entry = transport
            .request_token(GrantType::ClientCredentials, &spec)
            .await
            .unwrap();
        assert_eq!(entry.access_token, "abc123");
    }
}
