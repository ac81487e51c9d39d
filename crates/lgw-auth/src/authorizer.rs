use std::future::Future;

use lgw_types::Party;
use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};
use crate::principal::AuthenticatedPrincipal;

/// Resolves the acting party for a request.
#[derive(Clone, Debug)]
pub struct PartyAuthorizer {
    admin_party: Party,
}

impl PartyAuthorizer {
    pub fn new(admin_party: Party) -> Self {
        Self { admin_party }
    }

    pub fn admin_party(&self) -> &Party {
        &self.admin_party
    }

    /// The principal's party, or `Unauthenticated`.
    pub fn authenticated_party(
        &self,
        principal: Option<&AuthenticatedPrincipal>,
    ) -> AuthResult<Party> {
        principal
            .and_then(|p| p.party.clone())
            .ok_or(AuthError::Unauthenticated)
    }

    /// The administrative party, if the principal acts as it.
    pub fn admin(&self, principal: Option<&AuthenticatedPrincipal>) -> AuthResult<Party> {
        let party = self.authenticated_party(principal)?;
        if party != self.admin_party {
            warn!(party = %party, "non-admin party on admin operation");
            return Err(AuthError::Forbidden {
                party: party.to_string(),
            });
        }
        Ok(party)
    }

    /// Run `f` on behalf of the principal's party.
    pub async fn as_authenticated_party<F, Fut, T, E>(
        &self,
        principal: Option<&AuthenticatedPrincipal>,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Party) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<AuthError>,
    {
        let party = self.authenticated_party(principal)?;
        debug!(party = %party, "acting as authenticated party");
        f(party).await
    }

    /// Run `f` on behalf of the administrative party.
    ///
    /// Fails with `Forbidden` unless the principal's party is the configured
    /// administrative party. The admin role claim alone is not enough.
    pub async fn as_admin_party<F, Fut, T, E>(
        &self,
        principal: Option<&AuthenticatedPrincipal>,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Party) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<AuthError>,
    {
        let party = self.admin(principal)?;
        debug!(party = %party, "acting as admin party");
        f(party).await
    }
}
