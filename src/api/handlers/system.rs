use axum::{extract::State, Json};

use crate::api::{state::AppState, types::HealthResponse};

/// GET /health -- liveness probe with a few in-memory gauges
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let coordinator = state.coordinator.state();
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.uptime_seconds(),
        connections: coordinator.hub.connection_count(),
        positions: coordinator.store.position_count(),
    })
}
