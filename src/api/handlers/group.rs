use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use tracing::info;

use crate::api::{
    auth::authenticate,
    error::ApiError,
    handlers::required,
    state::AppState,
    types::{
        ConfirmDestinationRequest, DestinationResponse, GeofenceRadiusRequest,
        GeofenceRadiusResponse, ResolvedGroupResponse, SetDestinationRequest,
    },
};
use crate::domain::{Destination, DestinationState, GroupId};
use crate::error::ConvoyError;

/// POST /api/group/geofence-radius
pub async fn set_geofence_radius(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GeofenceRadiusRequest>,
) -> Result<Json<GeofenceRadiusResponse>, ApiError> {
    let member_id = authenticate(&state, &headers).await?;
    let group_id = GroupId::new(required(req.group_id, "groupId")?);
    let radius_km = required(req.radius_km, "radiusKm")?;

    state
        .coordinator
        .set_geofence_radius(&group_id, radius_km)
        .await?;
    info!(member = %member_id, group = %group_id, radius_km, "geofence radius changed via api");
    Ok(Json(GeofenceRadiusResponse {
        group_id,
        radius_km,
    }))
}

/// POST /api/group/set-destination
pub async fn set_destination(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SetDestinationRequest>,
) -> Result<Json<Destination>, ApiError> {
    let member_id = authenticate(&state, &headers).await?;
    let group_id = GroupId::new(required(req.group_id, "groupId")?);
    let lat = required(req.lat, "lat")?;
    let lng = required(req.lng, "lng")?;

    let destination = state
        .coordinator
        .propose_destination(&group_id, lat, lng)
        .await?;
    info!(member = %member_id, group = %group_id, "destination proposed via api");
    Ok(Json(destination))
}

/// POST /api/group/confirm-destination
pub async fn confirm_destination(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ConfirmDestinationRequest>,
) -> Result<Json<Destination>, ApiError> {
    let member_id = authenticate(&state, &headers).await?;
    let group_id = GroupId::new(required(req.group_id, "groupId")?);

    let destination = state.coordinator.confirm_destination(&group_id).await?;
    info!(member = %member_id, group = %group_id, "destination confirmed via api");
    Ok(Json(destination))
}

/// GET /api/groups/:group_id/destination
pub async fn get_destination(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
) -> Result<Json<DestinationResponse>, ApiError> {
    authenticate(&state, &headers).await?;
    let group_id = GroupId::new(group_id);
    let destination = state.coordinator.current_destination(&group_id).await?;
    let current = destination
        .as_ref()
        .map(|d| d.state())
        .unwrap_or(DestinationState::None);

    Ok(Json(DestinationResponse {
        group_id,
        state: current.to_string(),
        destination,
    }))
}

/// GET /api/groups/resolve/:code
pub async fn resolve_group_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> Result<Json<ResolvedGroupResponse>, ApiError> {
    authenticate(&state, &headers).await?;
    let group_id = state
        .directory
        .resolve_code(&code)
        .await
        .ok_or_else(|| ConvoyError::not_found(format!("group code {code}")))?;
    let group = state
        .directory
        .group(&group_id)
        .await
        .ok_or_else(|| ConvoyError::not_found(format!("group {group_id}")))?;

    Ok(Json(ResolvedGroupResponse {
        group_id: group.id,
        name: group.name,
        code: group.code,
    }))
}
