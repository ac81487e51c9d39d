use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use lgw_auth::{ClaimMapping, ClientCredentials};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GatewayError, GatewayResult};

/// Service configuration.
///
/// Loaded from TOML, then overridden by `LGW_*` environment variables. Every
/// section and field has a default, so an empty file is a valid local
/// configuration: without `ledger.base_url` or `store.database_url` the
/// service runs against in-memory doubles.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub ledger: LedgerConfig,
    pub store: StoreConfig,
    pub registry: RegistryConfig,
    pub auth: AuthConfig,
    pub log: LogConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON Ledger API endpoint of the participant.
    pub base_url: Option<String>,
    pub user_id: String,
    pub timeout_ms: u64,
    /// Fixed bearer token. Mutually exclusive with `oauth`.
    pub access_token: Option<String>,
    /// Client-credentials registration used to obtain and refresh tokens
    /// for the ledger and the scan proxy.
    pub oauth: Option<ClientCredentials>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            user_id: "app-provider".into(),
            timeout_ms: 30_000,
            access_token: None,
            oauth: None,
        }
    }
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id)
            .field("timeout_ms", &self.timeout_ms)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("oauth", &self.oauth)
            .finish()
    }
}

impl LedgerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// PostgreSQL URL of the active-contracts projection.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub query_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 8,
            query_timeout_ms: 5_000,
        }
    }
}

impl StoreConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Validator base URL; scan-proxy paths are appended to it.
    pub scan_proxy_url: String,
    pub registry_url: String,
    pub timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            scan_proxy_url: "http://localhost:5003".into(),
            registry_url: "http://localhost:5012".into(),
            timeout_ms: 10_000,
        }
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// The application provider's party; the only party allowed on admin
    /// operations.
    pub admin_party: String,
    #[serde(flatten)]
    pub claims: ClaimMapping,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            format: LogFormat::Pretty,
        }
    }
}

impl GatewayConfig {
    /// Load from an optional TOML file, apply environment overrides and
    /// validate.
    pub fn load(path: Option<&Path>) -> GatewayResult<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| GatewayError::Config(format!("reading {}: {e}", path.display())))?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> GatewayResult<Self> {
        toml::from_str(text).map_err(|e| GatewayError::Config(e.to_string()))
    }

    /// Apply `LGW_*` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> GatewayResult<()> {
        if let Some(v) = lookup("LGW_BIND_ADDR") {
            self.server.bind_addr = v
                .parse()
                .map_err(|e| GatewayError::Config(format!("LGW_BIND_ADDR: {e}")))?;
        }
        if let Some(v) = lookup("LGW_LEDGER_URL") {
            self.ledger.base_url = Some(v);
        }
        if let Some(v) = lookup("LGW_LEDGER_USER_ID") {
            self.ledger.user_id = v;
        }
        if let Some(v) = lookup("LGW_LEDGER_TOKEN") {
            self.ledger.access_token = Some(v);
        }
        let token_url = lookup("LGW_OAUTH_TOKEN_URL");
        let client_id = lookup("LGW_OAUTH_CLIENT_ID");
        let client_secret = lookup("LGW_OAUTH_CLIENT_SECRET");
        if let Some(existing) = self.ledger.oauth.as_mut() {
            if let Some(v) = token_url {
                existing.token_url = v;
            }
            if let Some(v) = client_id {
                existing.client_id = v;
            }
            if let Some(v) = client_secret {
                existing.client_secret = v;
            }
        } else {
            match (token_url, client_id, client_secret) {
                (None, None, None) => {}
                (Some(token_url), Some(client_id), Some(client_secret)) => {
                    self.ledger.oauth = Some(ClientCredentials {
                        token_url,
                        client_id,
                        client_secret,
                        scope: None,
                        audience: None,
                    });
                }
                _ => {
                    return Err(GatewayError::Config(
                        "LGW_OAUTH_TOKEN_URL, LGW_OAUTH_CLIENT_ID and LGW_OAUTH_CLIENT_SECRET \
                         must be set together"
                            .into(),
                    ))
                }
            }
        }
        if let Some(v) = lookup("LGW_DATABASE_URL") {
            self.store.database_url = Some(v);
        }
        if let Some(v) = lookup("LGW_SCAN_PROXY_URL") {
            self.registry.scan_proxy_url = v;
        }
        if let Some(v) = lookup("LGW_REGISTRY_URL") {
            self.registry.registry_url = v;
        }
        if let Some(v) = lookup("LGW_ADMIN_PARTY") {
            self.auth.admin_party = v;
        }
        if let Some(v) = lookup("LGW_LOG") {
            self.log.filter = v;
        }
        if let Some(v) = lookup("LGW_LOG_FORMAT") {
            self.log.format = match v.as_str() {
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                other => {
                    return Err(GatewayError::Config(format!(
                        "LGW_LOG_FORMAT: unknown format {other:?}"
                    )))
                }
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> GatewayResult<()> {
        if self.ledger.user_id.trim().is_empty() {
            return Err(GatewayError::Config("ledger.user_id must not be empty".into()));
        }
        if self.auth.admin_party.trim().is_empty() {
            return Err(GatewayError::Config("auth.admin_party must not be empty".into()));
        }
        if let Some(url) = &self.ledger.base_url {
            check_url("ledger.base_url", url)?;
        }
        if let Some(oauth) = &self.ledger.oauth {
            if self.ledger.access_token.is_some() {
                return Err(GatewayError::Config(
                    "ledger.access_token and ledger.oauth are mutually exclusive".into(),
                ));
            }
            check_url("ledger.oauth.token_url", &oauth.token_url)?;
            if oauth.client_id.trim().is_empty() {
                return Err(GatewayError::Config("ledger.oauth.client_id must not be empty".into()));
            }
        }
        if let Some(url) = &self.store.database_url {
            check_url("store.database_url", url)?;
        }
        check_url("registry.scan_proxy_url", &self.registry.scan_proxy_url)?;
        check_url("registry.registry_url", &self.registry.registry_url)?;
        for (name, value) in [
            ("ledger.timeout_ms", self.ledger.timeout_ms),
            ("store.query_timeout_ms", self.store.query_timeout_ms),
            ("registry.timeout_ms", self.registry.timeout_ms),
            ("store.max_connections", u64::from(self.store.max_connections)),
        ] {
            if value == 0 {
                return Err(GatewayError::Config(format!("{name} must be positive")));
            }
        }
        Ok(())
    }
}

fn check_url(name: &str, value: &str) -> GatewayResult<()> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| GatewayError::Config(format!("{name}: {e}")))
}
