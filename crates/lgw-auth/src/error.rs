use thiserror::Error;

/// Errors produced while resolving the acting party.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("no authenticated party")]
    Unauthenticated,

    #[error("authenticated party is not the administrative party: {party}")]
    Forbidden { party: String },

    #[error("claim {claim:?} is malformed: {reason}")]
    InvalidClaim { claim: String, reason: String },

    #[error("access token unavailable: {0}")]
    Token(String),
}

pub type AuthResult<T> = Result<T, AuthError>;
