use lgw_types::Identifier;
use thiserror::Error;

/// Errors produced while converting between typed payloads, JSON, and wire values.
///
/// Every structural error carries the JSON-style path (`$.params.meta`) of
/// the offending node.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error("missing field {field:?} at {path}")]
    MissingField { path: String, field: String },

    #[error("unknown field {field:?} at {path}")]
    UnknownField { path: String, field: String },

    #[error("unknown constructor {constructor:?} at {path}")]
    UnknownConstructor { path: String, constructor: String },

    #[error("invalid value at {path}: {reason}")]
    InvalidValue { path: String, reason: String },

    #[error("template not registered: {0}")]
    UnknownTemplate(Identifier),

    #[error("choice {choice:?} not registered on template {template}")]
    UnknownChoice { template: Identifier, choice: String },

    #[error("serde conversion failed: {0}")]
    Serde(String),
}

pub type CodecResult<T> = Result<T, CodecError>;
