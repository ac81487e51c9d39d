use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Longest command id the ledger accepts.
pub const MAX_COMMAND_ID_LEN: usize = 255;

/// A ledger party identifier (e.g. `alice::1220abcd...`).
///
/// Parties are opaque to the gateway; the only invariant enforced here is
/// that the identifier is non-empty.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Party(String);

impl Party {
    /// Parse a party identifier, rejecting empty or blank strings.
    pub fn parse(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(TypeError::EmptyParty);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The human-readable hint before the `::` fingerprint separator.
    pub fn hint(&self) -> &str {
        self.0.split("::").next().unwrap_or(&self.0)
    }
}

impl fmt::Debug for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Party({})", self.0)
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Party {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Caller-supplied idempotency key for a ledger submission.
///
/// The ledger deduplicates submissions by `(actAs, commandId)`: resubmitting
/// the same id for the same actor never duplicates ledger effects. The gateway
/// only validates and forwards it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommandId(String);

impl CommandId {
    /// Parse a command id supplied by a client.
    pub fn parse(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.is_empty() {
            return Err(TypeError::InvalidCommandId {
                value,
                reason: "must not be empty".into(),
            });
        }
        if value.len() > MAX_COMMAND_ID_LEN {
            return Err(TypeError::InvalidCommandId {
                reason: format!("longer than {MAX_COMMAND_ID_LEN} characters"),
                value,
            });
        }
        if let Some(c) = value.chars().find(|c| !is_command_id_char(*c)) {
            return Err(TypeError::InvalidCommandId {
                reason: format!("illegal character {c:?}"),
                value,
            });
        }
        Ok(Self(value))
    }

    /// Generate a fresh time-ordered command id (UUID v7).
    ///
    /// Only for callers that have no client-supplied key; a generated id gives
    /// no retry protection across process restarts.
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_command_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-' | '#' | '/' | ' ')
}

impl TryFrom<String> for CommandId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<CommandId> for String {
    fn from(id: CommandId) -> Self {
        id.0
    }
}

impl fmt::Debug for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandId({})", self.0)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn party_rejects_blank() {
        assert_eq!(Party::parse(""), Err(TypeError::EmptyParty));
        assert_eq!(Party::parse("   "), Err(TypeError::EmptyParty));
    }

    #[test]
    fn party_hint_strips_fingerprint() {
        let p = Party::parse("alice::1220abcdef").unwrap();
        assert_eq!(p.hint(), "alice");
        assert_eq!(p.to_string(), "alice::1220abcdef");

        let bare = Party::parse("bob").unwrap();
        assert_eq!(bare.hint(), "bob");
    }

    #[test]
    fn command_id_accepts_client_keys() {
        let keys = ["cmd-1", "renew/licence#42", "a.b_c:d", "7f0c9a40-2b1e-7c4b-9c1b-1c2a3b4c5d6e"];
        for raw in keys {
            assert!(CommandId::parse(raw).is_ok(), "{raw} should parse");
        }
    }

    #[test]
    fn command_id_rejects_bad_input() {
        assert!(CommandId::parse("").is_err());
        assert!(CommandId::parse("semi;colon").is_err());
        assert!(CommandId::parse("x".repeat(MAX_COMMAND_ID_LEN + 1)).is_err());
        assert!(CommandId::parse("x".repeat(MAX_COMMAND_ID_LEN)).is_ok());
    }

    #[test]
    fn generated_ids_are_unique_and_valid() {
        let a = CommandId::generate();
        let b = CommandId::generate();
        assert_ne!(a, b);
        assert!(CommandId::parse(a.as_str()).is_ok());
    }

    #[test]
    fn command_id_serde_validates() {
        let id: CommandId = serde_json::from_str("\"cmd-7\"").unwrap();
        assert_eq!(id.as_str(), "cmd-7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"cmd-7\"");
        assert!(serde_json::from_str::<CommandId>("\"\"").is_err());
    }
}
