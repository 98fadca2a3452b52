use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::typing::{TypersResponse, TypingQuery, TypingRequest};
use crate::error::{AppError, Result};
use crate::services::message_service::check_access;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};

/// Records or clears the caller's typing state for a conversation.
///
/// # Errors
/// Returns `AppError::Forbidden` if the caller is not a participant.
pub async fn set_typing(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<TypingRequest>,
) -> Result<impl IntoResponse> {
    let conversation =
        state.conversation_service.find(payload.conversation_id).await?.ok_or(AppError::NotFound)?;
    if !conversation.is_participant(auth_user.caller.user_id) {
        return Err(AppError::Forbidden);
    }

    if payload.is_typing {
        state.typing.set_typing(payload.conversation_id, auth_user.caller.user_id, auth_user.display_name);
    } else {
        state.typing.clear_typing(payload.conversation_id, auth_user.caller.user_id);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Who is currently typing in a conversation, excluding the caller.
///
/// # Errors
/// Returns `AppError::Forbidden` if the caller may not see the conversation.
pub async fn get_typers(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<TypingQuery>,
) -> Result<impl IntoResponse> {
    let conversation =
        state.conversation_service.find(query.conversation_id).await?.ok_or(AppError::NotFound)?;
    check_access(&conversation, auth_user.caller)?;

    let typers = state.typing.typers(query.conversation_id, auth_user.caller.user_id);

    Ok(Json(TypersResponse { typers: typers.into_iter().map(Into::into).collect() }))
}
