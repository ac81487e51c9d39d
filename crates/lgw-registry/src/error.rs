use thiserror::Error;

/// Errors produced by upstream registry reads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Connectivity failure, timeout or a server-side error from the
    /// upstream.
    #[error("{upstream} unavailable: {reason}")]
    UpstreamUnavailable { upstream: &'static str, reason: String },

    /// The referenced contract, round or allocation does not exist or is no
    /// longer open.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid registry response: {0}")]
    InvalidResponse(String),
}

impl RegistryError {
    pub fn unavailable(upstream: &'static str, reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            upstream,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidResponse(reason.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::NotFound(_) => "not_found",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
