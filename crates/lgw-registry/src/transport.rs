use std::fmt;

use async_trait::async_trait;
use serde_json::Value as Json;

use crate::error::RegistryResult;

/// The two upstream services disclosures are fetched from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Upstream {
    /// The validator's proxy onto the network scan service.
    ScanProxy,
    /// The token-standard registry of the asset administrator.
    TokenRegistry,
}

impl Upstream {
    pub fn name(self) -> &'static str {
        match self {
            Self::ScanProxy => "scan-proxy",
            Self::TokenRegistry => "token-registry",
        }
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only JSON access to an upstream.
///
/// Implementations map "does not exist" to `RegistryError::NotFound` and
/// every connectivity or server-side failure to
/// `RegistryError::UpstreamUnavailable`.
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    async fn get(&self, upstream: Upstream, path: &str) -> RegistryResult<Json>;

    /// POST for read endpoints that take a request body.
    async fn post(&self, upstream: Upstream, path: &str, body: &Json) -> RegistryResult<Json>;
}
