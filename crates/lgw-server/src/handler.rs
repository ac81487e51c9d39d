use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::state::Services;

/// Liveness payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Reports which backends the process is wired to.
pub async fn info_handler(State(services): State<Arc<Services>>) -> Json<serde_json::Value> {
    Json(json!({
        "name": "lgw-server",
        "version": env!("CARGO_PKG_VERSION"),
        "ledger": services.ledger_mode,
        "store": services.store_mode,
        "tokens": services.token_source,
        "user_id": services.gateway.user_id(),
        "templates": services.dictionary().len(),
    }))
}
