use thiserror::Error;

/// Errors produced by type construction and parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("party must not be empty")]
    EmptyParty,

    #[error("invalid command id {value:?}: {reason}")]
    InvalidCommandId { value: String, reason: String },

    #[error("invalid identifier {0:?}: expected <package>:<module>:<entity>")]
    InvalidIdentifier(String),
}
