//! Host process for the ledger gateway.
//!
//! - [`GatewayConfig`]: TOML configuration with `LGW_*` environment overrides
//! - [`telemetry::init`]: `tracing` subscriber setup, pretty or JSON
//! - [`GatewayError`]: the failure taxonomy every library error converts into
//! - [`Services`]: gateway, contract store, licensing repository, disclosure
//!   resolver and authorizer built once and shared
//! - [`GatewayServer`]: axum host for `/v1/health` and `/v1/info`

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;
pub mod telemetry;

pub use config::{
    AuthConfig, GatewayConfig, LedgerConfig, LogConfig, LogFormat, RegistryConfig, ServerConfig,
    StoreConfig,
};
pub use error::{GatewayError, GatewayResult};
pub use handler::HealthResponse;
pub use server::GatewayServer;
pub use state::{BackendMode, Services, TokenSource};
