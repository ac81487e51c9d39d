use lgw_codec::CodecError;
use lgw_types::Identifier;
use thiserror::Error;

/// Errors produced by ledger submissions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The payload or argument does not match its declared schema.
    #[error("encoding error: {0}")]
    Encoding(#[from] CodecError),

    /// Connectivity failure or a server-side (5xx) error. The command may or
    /// may not have reached the ledger; resubmit with the same command id.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("ledger call timed out")]
    Timeout,

    /// The ledger refused the command.
    #[error("command rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("no exercised root event for {template_id} {choice}")]
    MissingExerciseResult { template_id: Identifier, choice: String },

    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),
}

impl LedgerError {
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether resubmitting the same command id could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }

    /// Short label used in audit records and span fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Encoding(_) => "encoding_error",
            Self::Transport(_) => "transport_error",
            Self::Timeout => "timeout",
            Self::Rejected { .. } => "rejected",
            Self::MissingExerciseResult { .. } => "missing_exercise_result",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else if value.is_decode() {
            Self::InvalidResponse(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
