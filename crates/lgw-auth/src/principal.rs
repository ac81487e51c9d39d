use lgw_types::Party;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuthError, AuthResult};

/// The caller of a request, resolved from session or token state.
///
/// Lives for one request only and is never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedPrincipal {
    pub username: String,
    pub party: Option<Party>,
    pub tenant_id: Option<String>,
    pub roles: Vec<String>,
    pub is_admin: bool,
}

impl AuthenticatedPrincipal {
    pub fn new(username: impl Into<String>, party: Party) -> Self {
        Self {
            username: username.into(),
            party: Some(party),
            tenant_id: None,
            roles: Vec::new(),
            is_admin: false,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>, admin_role: &str) -> Self {
        let role = role.into();
        self.is_admin |= role == admin_role;
        self.roles.push(role);
        self
    }
}

/// Names of the token claims a principal is assembled from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimMapping {
    pub party_claim: String,
    pub tenant_claim: String,
    pub name_claim: String,
    pub roles_claim: String,
    pub admin_role: String,
}

impl Default for ClaimMapping {
    fn default() -> Self {
        Self {
            party_claim: "virtual_partyId".into(),
            tenant_claim: "virtual_tenantId".into(),
            name_claim: "name".into(),
            roles_claim: "roles".into(),
            admin_role: "ROLE_ADMIN".into(),
        }
    }
}

impl ClaimMapping {
    /// Build a principal from already-verified claims.
    ///
    /// A missing party claim yields a principal without a party; operations
    /// that need one fail later with `Unauthenticated`. A party claim that is
    /// present but blank, or a roles claim that is not a list of strings, is
    /// rejected.
    pub fn principal(&self, claims: &Map<String, Value>) -> AuthResult<AuthenticatedPrincipal> {
        let party = match claims.get(&self.party_claim) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(Party::parse(s.as_str()).map_err(|e| {
                AuthError::InvalidClaim {
                    claim: self.party_claim.clone(),
                    reason: e.to_string(),
                }
            })?),
            Some(_) => return Err(self.invalid(&self.party_claim, "expected a string")),
        };

        let tenant_id = match claims.get(&self.tenant_claim) {
            Some(Value::String(s)) => Some(s.clone()),
            None | Some(Value::Null) => None,
            Some(_) => return Err(self.invalid(&self.tenant_claim, "expected a string")),
        };

        let username = claims
            .get(&self.name_claim)
            .or_else(|| claims.get("sub"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let roles = match claims.get(&self.roles_claim) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.invalid(&self.roles_claim, "expected strings"))
                })
                .collect::<AuthResult<Vec<_>>>()?,
            Some(_) => return Err(self.invalid(&self.roles_claim, "expected a list")),
        };
        let is_admin = roles.iter().any(|r| r == &self.admin_role);

        Ok(AuthenticatedPrincipal {
            username,
            party,
            tenant_id,
            roles,
            is_admin,
        })
    }

    fn invalid(&self, claim: &str, reason: &str) -> AuthError {
        AuthError::InvalidClaim {
            claim: claim.to_string(),
            reason: reason.to_string(),
        }
    }
}
