use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::presence::{OnlineStatusRequest, PresenceQuery, PresenceResponse, PresenceState};
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Explicit online/offline signal for the caller.
pub async fn set_status(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<OnlineStatusRequest>,
) -> impl IntoResponse {
    match payload.status {
        PresenceState::Online => state.presence.set_online(auth_user.caller.user_id),
        PresenceState::Offline => state.presence.set_offline(auth_user.caller.user_id),
    }

    StatusCode::NO_CONTENT
}

/// Keep-alive refresh of the caller's presence.
pub async fn heartbeat(auth_user: AuthUser, State(state): State<AppState>) -> impl IntoResponse {
    state.presence.heartbeat(auth_user.caller.user_id);
    StatusCode::NO_CONTENT
}

/// Presence of the requested users (`userIds` is comma-separated).
///
/// # Errors
/// Returns `AppError::Validation` if any id fails to parse.
pub async fn get_status(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PresenceQuery>,
) -> Result<impl IntoResponse> {
    let user_ids = query
        .user_ids
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Uuid::parse_str)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| AppError::Validation("Invalid userIds".into()))?;

    let statuses = state.presence.status(&user_ids);

    Ok(Json(PresenceResponse { statuses: statuses.into_iter().map(|(id, s)| (id, s.into())).collect() }))
}
