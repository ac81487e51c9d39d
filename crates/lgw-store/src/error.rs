use lgw_codec::CodecError;
use lgw_types::Identifier;
use thiserror::Error;

/// Errors produced by projection reads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Archived, unknown, of another template, or not yet projected.
    #[error("no active {template_id} contract {contract_id}")]
    NotFound {
        template_id: Identifier,
        contract_id: String,
    },

    #[error("{count} active contracts matched where at most one was expected")]
    MultipleResults { count: usize },

    #[error("query expects {expected} parameters, {actual} supplied")]
    ParameterCount { expected: usize, actual: usize },

    #[error("invalid predicate at offset {offset}: {reason}")]
    InvalidPredicate { offset: usize, reason: String },

    #[error("stored payload does not decode: {0}")]
    Decode(#[from] CodecError),

    #[error("projection query timed out")]
    Timeout,

    #[error("projection database error: {0}")]
    Database(String),
}

impl StoreError {
    pub(crate) fn predicate(offset: usize, reason: impl Into<String>) -> Self {
        Self::InvalidPredicate {
            offset,
            reason: reason.into(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::PoolTimedOut => Self::Timeout,
            other => Self::Database(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
