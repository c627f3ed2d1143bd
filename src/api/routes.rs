use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::{handlers, state::AppState, websocket::websocket_handler};

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_handler))
        // Location endpoints
        .route("/api/location/update", post(handlers::update_location))
        .route("/api/friends/nearby", get(handlers::nearby_members))
        // Group endpoints
        .route("/api/groups/resolve/:code", get(handlers::resolve_group_code))
        .route("/api/groups/:group_id/locations", get(handlers::group_locations))
        .route("/api/groups/:group_id/nearest", get(handlers::nearest_member))
        .route("/api/groups/:group_id/destination", get(handlers::get_destination))
        .route("/api/group/geofence-radius", post(handlers::set_geofence_radius))
        .route("/api/group/set-destination", post(handlers::set_destination))
        .route("/api/group/confirm-destination", post(handlers::confirm_destination))
        // WebSocket endpoint
        .route("/ws", get(websocket_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
