use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, LogFormat};
use crate::error::{GatewayError, GatewayResult};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured filter when set.
pub fn init(config: &LogConfig) -> GatewayResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| GatewayError::Config(format!("log.filter: {e}")))?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| GatewayError::Internal(format!("installing tracing subscriber: {e}")))
}
