use async_trait::async_trait;

use crate::error::AuthResult;

/// Supplies the bearer token presented to the ledger on every call.
///
/// Implementations that refresh tokens must be safe for concurrent use.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// `None` means calls go out without an `Authorization` header.
    async fn access_token(&self) -> AuthResult<Option<String>>;
}

/// A fixed token, or none, set at startup.
#[derive(Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> AuthResult<Option<String>> {
        Ok(self.token.clone())
    }
}
