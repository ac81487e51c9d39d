use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::router::build_router;
use crate::state::Services;

/// Ledger gateway host process.
pub struct GatewayServer {
    config: GatewayConfig,
    services: Arc<Services>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, services: Services) -> Self {
        Self {
            config,
            services: Arc::new(services),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn services(&self) -> Arc<Services> {
        self.services.clone()
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.services.clone())
    }

    /// Serve until ctrl-c.
    pub async fn serve(self) -> GatewayResult<()> {
        let app = self.router();
        let addr = self.config.server.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Internal(format!("binding {addr}: {e}")))?;
        tracing::info!("ledger gateway listening on {addr}");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use lgw_codec::Dictionary;

    use super::*;

    #[tokio::test]
    async fn server_construction() {
        let mut config = GatewayConfig::default();
        config.auth.admin_party = "app_provider::1220".into();
        let services = Services::from_config(&config, Dictionary::default()).await.unwrap();
        let server = GatewayServer::new(config, services);
        assert_eq!(server.config().server.bind_addr, "127.0.0.1:8080".parse().unwrap());
        let _router = server.router();
    }
}
