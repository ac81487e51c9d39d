use axum::http::StatusCode;
use lgw_auth::AuthError;
use lgw_codec::CodecError;
use lgw_ledger::LedgerError;
use lgw_registry::RegistryError;
use lgw_store::StoreError;
use lgw_types::TypeError;
use thiserror::Error;

/// Failure taxonomy exposed to the controller layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// A payload or argument does not match its schema.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Ledger or database connectivity. Retrying with the same command id is
    /// safe.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("command rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{count} contracts matched where at most one was expected")]
    MultipleResults { count: usize },

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Encoding(_) => "encoding_error",
            Self::Transport(_) => "transport_error",
            Self::Rejected { .. } => "rejected",
            Self::NotFound(_) => "not_found",
            Self::MultipleResults { .. } => "multiple_results",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Encoding(_) | Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Rejected { .. } | Self::MultipleResults { .. } => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TypeError> for GatewayError {
    fn from(value: TypeError) -> Self {
        Self::InvalidArgument(value.to_string())
    }
}

impl From<CodecError> for GatewayError {
    fn from(value: CodecError) -> Self {
        Self::Encoding(value.to_string())
    }
}

impl From<LedgerError> for GatewayError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::Encoding(e) => e.into(),
            LedgerError::Transport(_) | LedgerError::Timeout => Self::Transport(value.to_string()),
            LedgerError::Rejected { code, message } => Self::Rejected { code, message },
            LedgerError::MissingExerciseResult { .. } | LedgerError::InvalidResponse(_) => {
                Self::Internal(value.to_string())
            }
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { .. } => Self::NotFound(value.to_string()),
            StoreError::MultipleResults { count } => Self::MultipleResults { count },
            StoreError::Decode(e) => e.into(),
            StoreError::Timeout | StoreError::Database(_) => Self::Transport(value.to_string()),
            StoreError::ParameterCount { .. } | StoreError::InvalidPredicate { .. } => {
                Self::Internal(value.to_string())
            }
        }
    }
}

impl From<RegistryError> for GatewayError {
    fn from(value: RegistryError) -> Self {
        match value {
            RegistryError::NotFound(_) => Self::NotFound(value.to_string()),
            RegistryError::UpstreamUnavailable { .. } | RegistryError::InvalidResponse(_) => {
                Self::UpstreamUnavailable(value.to_string())
            }
        }
    }
}

impl From<AuthError> for GatewayError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::Unauthenticated | AuthError::InvalidClaim { .. } => Self::Unauthenticated,
            AuthError::Forbidden { party } => Self::Forbidden(party),
            AuthError::Token(reason) => Self::Transport(reason),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
