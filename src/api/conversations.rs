use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::conversations::{
    ConversationResponse, ConversationSummaryResponse, CreateConversationRequest,
};
use crate::error::Result;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

/// Lists the caller's conversations, most recently active first.
///
/// # Errors
/// Returns `AppError::Database` if a query fails.
pub async fn list(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let summaries = state.conversation_service.list(auth_user.caller).await?;

    let response: Vec<ConversationSummaryResponse> = summaries.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

/// Opens a conversation with a recipient, reusing an existing one for the
/// same participant pair and booking context.
///
/// # Errors
/// Returns `AppError::Validation` if the participant pair is degenerate.
pub async fn create(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse> {
    let conversation = state
        .conversation_service
        .open(
            auth_user.caller,
            payload.recipient_id,
            payload.subject,
            payload.booking_id,
            payload.initial_message,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ConversationResponse::from(conversation))))
}
