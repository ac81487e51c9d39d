use std::sync::Arc;

use lgw_auth::{
    ClaimMapping, ClientCredentialsTokenProvider, PartyAuthorizer, StaticTokenProvider,
    TokenProvider,
};
use lgw_codec::Dictionary;
use lgw_ledger::{CommandGateway, HttpLedgerClient, InMemoryLedger, LedgerClient};
use lgw_licensing::LicensingRepository;
use lgw_registry::{DisclosureResolver, HttpRegistry};
use lgw_store::{ContractStore, InMemoryProjection, PgProjection, ProjectionBackend};
use lgw_types::Party;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::error::GatewayResult;

/// Which implementation backs an outbound dependency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    Remote,
    InMemory,
}

/// Where the bearer token for the ledger and scan proxy comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    None,
    Static,
    ClientCredentials,
}

/// Long-lived handles shared by every request.
pub struct Services {
    pub gateway: CommandGateway,
    pub store: ContractStore,
    pub licensing: LicensingRepository,
    pub resolver: DisclosureResolver,
    pub authorizer: PartyAuthorizer,
    pub claims: ClaimMapping,
    pub ledger_mode: BackendMode,
    pub store_mode: BackendMode,
    pub token_source: TokenSource,
}

impl Services {
    /// Build from configuration.
    ///
    /// Without `ledger.base_url` the gateway runs against an in-memory
    /// ledger; without `store.database_url` the store reads an empty
    /// in-memory projection.
    pub async fn from_config(
        config: &GatewayConfig,
        dictionary: Dictionary,
    ) -> GatewayResult<Self> {
        let (tokens, token_source): (Arc<dyn TokenProvider>, _) =
            match (&config.ledger.oauth, &config.ledger.access_token) {
                (Some(credentials), _) => {
                    info!(client_id = %credentials.client_id, "using client-credentials tokens");
                    let provider = ClientCredentialsTokenProvider::http(
                        credentials.clone(),
                        config.ledger.timeout(),
                    )?;
                    (Arc::new(provider), TokenSource::ClientCredentials)
                }
                (None, Some(token)) => {
                    (Arc::new(StaticTokenProvider::new(token.clone())), TokenSource::Static)
                }
                (None, None) => (Arc::new(StaticTokenProvider::none()), TokenSource::None),
            };

        let (ledger, ledger_mode): (Arc<dyn LedgerClient>, _) = match &config.ledger.base_url {
            Some(url) => {
                info!(url = %url, "using JSON ledger API");
                let client =
                    HttpLedgerClient::new(url.clone(), config.ledger.timeout(), tokens.clone())?;
                (Arc::new(client), BackendMode::Remote)
            }
            None => {
                warn!("no ledger.base_url configured, commands run against an in-memory ledger");
                (Arc::new(InMemoryLedger::new()), BackendMode::InMemory)
            }
        };

        let store = &config.store;
        let (backend, store_mode): (Arc<dyn ProjectionBackend>, _) = match &store.database_url {
            Some(url) => {
                let pg =
                    PgProjection::connect(url, store.max_connections, store.query_timeout()).await?;
                info!("connected to projection database");
                (Arc::new(pg), BackendMode::Remote)
            }
            None => {
                warn!("no store.database_url configured, reads run against an empty projection");
                (Arc::new(InMemoryProjection::new()), BackendMode::InMemory)
            }
        };

        let registry = HttpRegistry::new(
            config.registry.scan_proxy_url.clone(),
            config.registry.registry_url.clone(),
            config.registry.timeout(),
            tokens,
        )?;

        let contracts = ContractStore::new(backend, dictionary.clone());
        Ok(Self {
            gateway: CommandGateway::new(ledger, dictionary, config.ledger.user_id.clone()),
            licensing: LicensingRepository::new(contracts.clone()),
            store: contracts,
            resolver: DisclosureResolver::new(Arc::new(registry)),
            authorizer: PartyAuthorizer::new(Party::parse(config.auth.admin_party.clone())?),
            claims: config.auth.claims.clone(),
            ledger_mode,
            store_mode,
            token_source,
        })
    }

    pub fn dictionary(&self) -> &Dictionary {
        self.gateway.dictionary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.auth.admin_party = "app_provider::1220".into();
        config
    }

    #[tokio::test]
    async fn local_mode_uses_in_memory_doubles() {
        let services = Services::from_config(&local_config(), Dictionary::default())
            .await
            .unwrap();
        assert_eq!(services.ledger_mode, BackendMode::InMemory);
        assert_eq!(services.store_mode, BackendMode::InMemory);
        assert_eq!(services.token_source, TokenSource::None);
        assert_eq!(services.authorizer.admin_party().as_str(), "app_provider::1220");
        assert_eq!(services.gateway.user_id(), "app-provider");
    }

    #[tokio::test]
    async fn licensing_reads_start_empty() {
        let services = Services::from_config(&local_config(), lgw_licensing::dictionary())
            .await
            .unwrap();
        assert_eq!(services.dictionary().len(), 5);
        assert!(services.licensing.find_active_app_installs().await.unwrap().is_empty());
        let user = Party::parse("app_user::1220").unwrap();
        assert!(services.licensing.find_active_licenses(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remote_ledger_is_built_without_connecting() {
        let mut config = local_config();
        config.ledger.base_url = Some("http://127.0.0.1:9".into());
        let services = Services::from_config(&config, Dictionary::default()).await.unwrap();
        assert_eq!(services.ledger_mode, BackendMode::Remote);
    }

    #[tokio::test]
    async fn token_source_follows_configuration() {
        let mut config = local_config();
        config.ledger.oauth = Some(lgw_auth::ClientCredentials {
            token_url: "http://127.0.0.1:9/token".into(),
            client_id: "app-provider-backend".into(),
            client_secret: "secret".into(),
            scope: None,
            audience: None,
        });
        let services = Services::from_config(&config, Dictionary::default()).await.unwrap();
        assert_eq!(services.token_source, TokenSource::ClientCredentials);

        config.ledger.oauth = None;
        config.ledger.access_token = Some("static".into());
        let services = Services::from_config(&config, Dictionary::default()).await.unwrap();
        assert_eq!(services.token_source, TokenSource::Static);
    }

    #[tokio::test]
    async fn blank_admin_party_is_rejected() {
        let mut config = local_config();
        config.auth.admin_party = " ".into();
        let err = Services::from_config(&config, Dictionary::default()).await.err().unwrap();
        assert_eq!(err.kind(), "invalid_argument");
    }
}
