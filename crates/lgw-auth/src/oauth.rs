use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};
use crate::token::TokenProvider;

/// Refresh this long before the issuer's expiry.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// Lifetime assumed for tokens issued without `expires_in`.
const UNDECLARED_LIFETIME: Duration = Duration::from_secs(60);

/// OAuth2 client registration of the backend's machine identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scope", &self.scope)
            .field("audience", &self.audience)
            .finish()
    }
}

/// A token as handed out by the issuer.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    /// Seconds until expiry.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Where new tokens come from.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn request_token(&self) -> AuthResult<IssuedToken>;
}

/// `grant_type=client_credentials` against an OAuth2 token URL.
pub struct HttpTokenEndpoint {
    credentials: ClientCredentials,
    http: reqwest::Client,
}

impl HttpTokenEndpoint {
    pub fn new(credentials: ClientCredentials, timeout: Duration) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Token(e.to_string()))?;
        Ok(Self { credentials, http })
    }

    fn form(&self) -> Vec<(&'static str, &str)> {
        let c = &self.credentials;
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", c.client_id.as_str()),
            ("client_secret", c.client_secret.as_str()),
        ];
        if let Some(scope) = &c.scope {
            form.push(("scope", scope.as_str()));
        }
        if let Some(audience) = &c.audience {
            form.push(("audience", audience.as_str()));
        }
        form
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn request_token(&self) -> AuthResult<IssuedToken> {
        let response = self
            .http
            .post(&self.credentials.token_url)
            .form(&self.form())
            .send()
            .await
            .map_err(|e| AuthError::Token(format!("token request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                client_id = %self.credentials.client_id,
                "token request refused"
            );
            return Err(AuthError::Token(format!("token endpoint returned {status}: {body}")));
        }
        response
            .json()
            .await
            .map_err(|e| AuthError::Token(format!("malformed token response: {e}")))
    }
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Client-credentials tokens cached until shortly before they expire.
///
/// Concurrent callers share one refresh: the cache is guarded by an async
/// mutex held across the token request.
pub struct ClientCredentialsTokenProvider {
    endpoint: Arc<dyn TokenEndpoint>,
    refresh_margin: Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentialsTokenProvider {
    pub fn new(endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self {
            endpoint,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            cached: Mutex::new(None),
        }
    }

    /// Provider over [`HttpTokenEndpoint`].
    pub fn http(credentials: ClientCredentials, timeout: Duration) -> AuthResult<Self> {
        Ok(Self::new(Arc::new(HttpTokenEndpoint::new(credentials, timeout)?)))
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsTokenProvider {
    async fn access_token(&self) -> AuthResult<Option<String>> {
        let mut cached = self.cached.lock().await;
        let now = Instant::now();
        if let Some(token) = cached.as_ref() {
            if now + self.refresh_margin < token.expires_at {
                return Ok(Some(token.value.clone()));
            }
        }

        let issued = self.endpoint.request_token().await?;
        let lifetime = issued
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(UNDECLARED_LIFETIME);
        debug!(lifetime_secs = lifetime.as_secs(), "fetched client-credentials token");
        *cached = Some(CachedToken {
            value: issued.access_token.clone(),
            expires_at: now + lifetime,
        });
        Ok(Some(issued.access_token))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct StubEndpoint {
        calls: AtomicUsize,
        fail: std::sync::Mutex<bool>,
    }

    #[async_trait]
    impl TokenEndpoint for StubEndpoint {
        async fn request_token(&self) -> AuthResult<IssuedToken> {
            if *self.fail.lock().unwrap() {
                return Err(AuthError::Token("issuer down".into()));
            }
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(IssuedToken {
                access_token: format!("token-{n}"),
                expires_in: Some(120),
            })
        }
    }

    fn provider(stub: &Arc<StubEndpoint>) -> ClientCredentialsTokenProvider {
        ClientCredentialsTokenProvider::new(stub.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn token_is_cached_until_refresh_margin() {
        let stub = Arc::new(StubEndpoint::default());
        let tokens = provider(&stub);

        assert_eq!(tokens.access_token().await.unwrap().as_deref(), Some("token-1"));
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(tokens.access_token().await.unwrap().as_deref(), Some("token-1"));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);

        // 100s in, the 30s margin reaches past the 120s expiry.
        tokio::time::advance(Duration::from_secs(40)).await;
        assert_eq!(tokens.access_token().await.unwrap().as_deref(), Some("token-2"));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_fetch() {
        let stub = Arc::new(StubEndpoint::default());
        let tokens = provider(&stub);
        let (a, b) = tokio::join!(tokens.access_token(), tokens.access_token());
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_is_retried_on_next_call() {
        let stub = Arc::new(StubEndpoint::default());
        let tokens = provider(&stub).with_refresh_margin(Duration::ZERO);
        tokens.access_token().await.unwrap();

        tokio::time::advance(Duration::from_secs(121)).await;
        *stub.fail.lock().unwrap() = true;
        assert!(matches!(tokens.access_token().await, Err(AuthError::Token(_))));

        *stub.fail.lock().unwrap() = false;
        assert_eq!(tokens.access_token().await.unwrap().as_deref(), Some("token-2"));
    }

    #[test]
    fn form_carries_grant_and_optional_fields() {
        let token_url = "http://keycloak/realms/AppProvider/protocol/openid-connect/token";
        let endpoint = HttpTokenEndpoint::new(
            ClientCredentials {
                token_url: token_url.into(),
                client_id: "app-provider-backend".into(),
                client_secret: "s3cret".into(),
                scope: Some("openid".into()),
                audience: None,
            },
            Duration::from_secs(1),
        )
        .unwrap();
        let form = endpoint.form();
        assert_eq!(form[0], ("grant_type", "client_credentials"));
        assert!(form.contains(&("scope", "openid")));
        assert!(!form.iter().any(|(k, _)| *k == "audience"));
        assert!(!format!("{:?}", endpoint.credentials).contains("s3cret"));
    }

    #[tokio::test]
    async fn unreachable_issuer_is_token_error() {
        let endpoint = HttpTokenEndpoint::new(
            ClientCredentials {
                token_url: "http://127.0.0.1:9/token".into(),
                client_id: "c".into(),
                client_secret: "s".into(),
                scope: None,
                audience: None,
            },
            Duration::from_millis(500),
        )
        .unwrap();
        assert!(matches!(endpoint.request_token().await, Err(AuthError::Token(_))));
    }
}
