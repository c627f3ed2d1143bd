use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use tracing::debug;

use crate::api::{
    auth::authenticate,
    error::ApiError,
    handlers::required,
    state::AppState,
    types::{NearbyQuery, PointQuery, UpdateLocationRequest},
};
use crate::domain::{GroupId, PositionView};

/// POST /api/location/update
pub async fn update_location(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateLocationRequest>,
) -> Result<Json<PositionView>, ApiError> {
    let member_id = authenticate(&state, &headers).await?;
    let group_id = GroupId::new(required(req.group_id, "groupId")?);
    let lat = required(req.lat, "lat")?;
    let lng = required(req.lng, "lng")?;

    let view = state
        .coordinator
        .update_location(&member_id, &group_id, lat, lng, req.speed)
        .await?;
    Ok(Json(view))
}

/// GET /api/groups/:group_id/locations
pub async fn group_locations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<PositionView>>, ApiError> {
    authenticate(&state, &headers).await?;
    let views = state
        .coordinator
        .list_group_locations(&GroupId::new(group_id))
        .await?;
    Ok(Json(views))
}

/// GET /api/groups/:group_id/nearest?lat&lng
pub async fn nearest_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
    Query(query): Query<PointQuery>,
) -> Result<Json<PositionView>, ApiError> {
    authenticate(&state, &headers).await?;
    let lat = required(query.lat, "lat")?;
    let lng = required(query.lng, "lng")?;

    let view = state
        .coordinator
        .query_nearest(&GroupId::new(group_id), lat, lng)
        .await?;
    Ok(Json(view))
}

/// GET /api/friends/nearby?lat&lng&maxDistanceKm
pub async fn nearby_members(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Vec<PositionView>>, ApiError> {
    let member_id = authenticate(&state, &headers).await?;
    let lat = required(query.lat, "lat")?;
    let lng = required(query.lng, "lng")?;

    let views = state
        .coordinator
        .query_nearby(lat, lng, query.max_distance_km)
        .await?;
    debug!(member = %member_id, found = views.len(), "nearby lookup");
    Ok(Json(views))
}
