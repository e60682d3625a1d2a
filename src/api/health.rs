use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check handler.
/// Returns JSON with status and a config summary; never the credential.
pub fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "msgbridge is running",
        "config": {
            "upstream": {
                "base_url": config.upstream.base_url,
                "api_version": config.upstream.api_version,
                "auth_scheme": config.upstream.auth_scheme.to_string(),
                "model_map_size": config.upstream.model_map.len(),
            },
            "client_keys_count": config.client_authentication.allowed_keys.len(),
            "features": {
                "log_level": config.features.log_level,
                "stream_usage": config.features.stream_usage,
            }
        }
    }))
}
