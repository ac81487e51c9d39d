//! Authorization context for the ledger gateway.
//!
//! Resolves the party a request acts for and gates operations reserved for
//! the administrative party:
//! - `AuthenticatedPrincipal` built from verified token claims via `ClaimMapping`
//! - `PartyAuthorizer` with `as_authenticated_party` / `as_admin_party`
//! - `TokenProvider` supplying the bearer token presented to the ledger, either
//!   fixed or obtained through the OAuth2 client-credentials grant
//!
//! Nothing here caches decisions; every call re-evaluates the principal it
//! is given.

pub mod authorizer;
pub mod error;
pub mod oauth;
pub mod principal;
pub mod token;

pub use authorizer::PartyAuthorizer;
pub use error::{AuthError, AuthResult};
pub use oauth::{
    ClientCredentials, ClientCredentialsTokenProvider, HttpTokenEndpoint, IssuedToken,
    TokenEndpoint,
};
pub use principal::{AuthenticatedPrincipal, ClaimMapping};
pub use token::{StaticTokenProvider, TokenProvider};
