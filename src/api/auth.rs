use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::debug;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::domain::MemberId;

pub fn extract_bearer_token(raw: &str) -> Option<&str> {
    raw.strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve a raw token to the member it identifies
pub async fn member_for_token(state: &AppState, token: &str) -> Result<MemberId, ApiError> {
    match state.directory.authenticate(token).await {
        Some(member_id) => Ok(member_id),
        None => {
            debug!("rejected unknown token");
            Err(ApiError::unauthorized("invalid token"))
        }
    }
}

/// Identify the caller from `Authorization: Bearer <token>`
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<MemberId, ApiError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
        .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
    member_for_token(state, token).await
}
