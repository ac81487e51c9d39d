use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lgw_auth::TokenProvider;
use reqwest::StatusCode;
use serde_json::Value as Json;
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};
use crate::transport::{RegistryTransport, Upstream};

/// Registry transport over HTTP.
///
/// The scan proxy is served by the validator and takes the same bearer token
/// as the ledger; the token registry is public.
#[derive(Clone)]
pub struct HttpRegistry {
    scan_proxy_url: String,
    registry_url: String,
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpRegistry {
    pub fn new(
        scan_proxy_url: impl Into<String>,
        registry_url: impl Into<String>,
        timeout: Duration,
        tokens: Arc<dyn TokenProvider>,
    ) -> RegistryResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::unavailable("http-client", e.to_string()))?;
        Ok(Self {
            scan_proxy_url: trim(scan_proxy_url.into()),
            registry_url: trim(registry_url.into()),
            http,
            tokens,
        })
    }

    fn url(&self, upstream: Upstream, path: &str) -> String {
        let base = match upstream {
            Upstream::ScanProxy => &self.scan_proxy_url,
            Upstream::TokenRegistry => &self.registry_url,
        };
        format!("{base}{path}")
    }

    async fn send(
        &self,
        upstream: Upstream,
        request: reqwest::RequestBuilder,
    ) -> RegistryResult<Json> {
        let mut request = request;
        if upstream == Upstream::ScanProxy {
            let token = self
                .tokens
                .access_token()
                .await
                .map_err(|e| RegistryError::unavailable(upstream.name(), e.to_string()))?;
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| RegistryError::unavailable(upstream.name(), e.to_string()))?;
        let status = response.status();
        debug!(%upstream, status = status.as_u16(), "registry response");
        if status.is_success() {
            return response.json().await.map_err(|e| RegistryError::invalid(e.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_from_status(upstream, status, &body))
    }
}

fn trim(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn error_from_status(upstream: Upstream, status: StatusCode, body: &str) -> RegistryError {
    if status == StatusCode::NOT_FOUND {
        RegistryError::NotFound(format!("{upstream}: {body}"))
    } else {
        RegistryError::unavailable(upstream.name(), format!("{status}: {body}"))
    }
}

#[async_trait]
impl RegistryTransport for HttpRegistry {
    async fn get(&self, upstream: Upstream, path: &str) -> RegistryResult<Json> {
        let request = self.http.get(self.url(upstream, path));
        self.send(upstream, request).await
    }

    async fn post(&self, upstream: Upstream, path: &str, body: &Json) -> RegistryResult<Json> {
        let request = self.http.post(self.url(upstream, path)).json(body);
        self.send(upstream, request).await
    }
}

#[cfg(test)]
mod tests {
    use lgw_auth::StaticTokenProvider;

    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            error_from_status(Upstream::TokenRegistry, StatusCode::NOT_FOUND, "no allocation"),
            RegistryError::NotFound(_)
        ));
        assert_eq!(
            error_from_status(Upstream::ScanProxy, StatusCode::BAD_GATEWAY, "down"),
            RegistryError::unavailable("scan-proxy", "502 Bad Gateway: down")
        );
    }

    #[test]
    fn urls_join_without_double_slash() {
        let registry = HttpRegistry::new(
            "http://validator/api/validator/",
            "http://registry",
            Duration::from_secs(1),
            Arc::new(StaticTokenProvider::none()),
        )
        .unwrap();
        assert_eq!(
            registry.url(Upstream::ScanProxy, "/v0/scan-proxy/dso-party-id"),
            "http://validator/api/validator/v0/scan-proxy/dso-party-id"
        );
        assert_eq!(
            registry.url(Upstream::TokenRegistry, "/registry/metadata/v1/info"),
            "http://registry/registry/metadata/v1/info"
        );
    }

    #[tokio::test]
    async fn unreachable_upstream_is_unavailable() {
        let registry = HttpRegistry::new(
            "http://127.0.0.1:9",
            "http://127.0.0.1:9",
            Duration::from_millis(500),
            Arc::new(StaticTokenProvider::new("token")),
        )
        .unwrap();
        let err = registry.get(Upstream::ScanProxy, "/x").await.unwrap_err();
        assert!(matches!(err, RegistryError::UpstreamUnavailable { upstream: "scan-proxy", .. }));
    }
}
