use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: ConnectionInfo,
}

#[derive(Serialize)]
pub struct ConnectionInfo {
    pub websocket: usize,
    pub max_websocket: usize,
}

/// Reports `degraded` once the game loop has stopped accepting commands.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.commands.is_closed() {
        "degraded"
    } else {
        "healthy"
    };
    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        connections: ConnectionInfo {
            websocket: state.ws_connection_count.load(Ordering::Relaxed),
            max_websocket: state.config.limits.max_ws_connections,
        },
    })
}
