use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Fully qualified reference to a ledger template, interface, or choice owner.
///
/// `package_id` is either a package hash or a package-name reference of the
/// form `#package-name`. Identifiers are immutable and built from static
/// metadata at startup.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier {
    package_id: String,
    module_name: String,
    entity_name: String,
}

impl Identifier {
    pub fn new(
        package_id: impl Into<String>,
        module_name: impl Into<String>,
        entity_name: impl Into<String>,
    ) -> Self {
        Self {
            package_id: package_id.into(),
            module_name: module_name.into(),
            entity_name: entity_name.into(),
        }
    }

    /// Parse `<package>:<module>:<entity>`.
    ///
    /// Everything after the second colon belongs to the entity name, so
    /// `pkg:Mod:Outer:Inner` has entity `Outer:Inner`.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let mut parts = s.splitn(3, ':');
        let (Some(package), Some(module), Some(entity)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(TypeError::InvalidIdentifier(s.to_string()));
        };
        if package.is_empty() || module.is_empty() || entity.is_empty() {
            return Err(TypeError::InvalidIdentifier(s.to_string()));
        }
        Ok(Self::new(package, module, entity))
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Package reference without the `#` package-name marker.
    pub fn package_name(&self) -> &str {
        self.package_id.strip_prefix('#').unwrap_or(&self.package_id)
    }

    /// Qualified name as used by the active-contracts projection,
    /// e.g. `quickstart-licensing:Licensing.License:License`.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}:{}", self.package_name(), self.module_name, self.entity_name)
    }

    /// Reference as sent to the ledger, keeping the package-name marker.
    pub fn ledger_ref(&self) -> String {
        format!("{}:{}:{}", self.package_id, self.module_name, self.entity_name)
    }

    /// Compare ignoring whether the package is referenced by name or `#name`.
    pub fn same_entity(&self, other: &Identifier) -> bool {
        self.package_name() == other.package_name()
            && self.module_name == other.module_name
            && self.entity_name == other.entity_name
    }
}

impl FromStr for Identifier {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.ledger_ref()
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.ledger_ref())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn license() -> Identifier {
        Identifier::new("#quickstart-licensing", "Licensing.License", "License")
    }

    #[test]
    fn qualified_name_strips_package_marker() {
        assert_eq!(
            license().qualified_name(),
            "quickstart-licensing:Licensing.License:License"
        );
        assert_eq!(
            license().ledger_ref(),
            "#quickstart-licensing:Licensing.License:License"
        );
    }

    #[test]
    fn parse_keeps_colons_in_entity() {
        let id = Identifier::parse("abc123:Mod.Sub:Outer:Inner").unwrap();
        assert_eq!(id.package_id(), "abc123");
        assert_eq!(id.module_name(), "Mod.Sub");
        assert_eq!(id.entity_name(), "Outer:Inner");
    }

    #[test]
    fn parse_rejects_short_or_empty_segments() {
        assert!(Identifier::parse("pkg:Mod").is_err());
        assert!(Identifier::parse("pkg::Entity").is_err());
        assert!(Identifier::parse("").is_err());
    }

    #[test]
    fn same_entity_ignores_package_marker() {
        let by_name = license();
        let plain = Identifier::parse("quickstart-licensing:Licensing.License:License").unwrap();
        assert_ne!(by_name, plain);
        assert!(by_name.same_entity(&plain));
        let other =
            Identifier::new("#quickstart-licensing", "Licensing.License", "LicenseRenewalRequest");
        assert!(!by_name.same_entity(&other));
    }

    #[test]
    fn serde_uses_ledger_ref() {
        let json = serde_json::to_string(&license()).unwrap();
        assert_eq!(json, "\"#quickstart-licensing:Licensing.License:License\"");
        let back: Identifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, license());
    }
}
