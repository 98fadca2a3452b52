use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::messaging::{
    HistoryQuery, MessagePageResponse, MessageResponse, PollQuery, PollResponse, SendMessageRequest,
};
use crate::domain::message::MessageType;
use crate::error::{AppError, Result};
use crate::services::attachment_service::IncomingFile;
use axum::{
    Json,
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Incremental sync: everything that changed since the caller's watermark.
///
/// # Errors
/// Returns `AppError::RateLimited` when called inside the minimum poll interval.
pub async fn poll(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PollQuery>,
) -> Result<impl IntoResponse> {
    let outcome = state.poll_coordinator.poll(auth_user.caller, query.since, query.conversation_id).await?;

    Ok(Json(PollResponse {
        updated_conversations: outcome.conversations.into_iter().map(Into::into).collect(),
        new_messages: outcome.messages.into_iter().map(Into::into).collect(),
        timestamp: outcome.timestamp,
    }))
}

/// One page of conversation history, newest first.
///
/// # Errors
/// Returns `AppError::Forbidden` if the caller may not see the conversation.
pub async fn history(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse> {
    let page = state
        .message_service
        .history(auth_user.caller, query.conversation_id, query.cursor, query.page_size)
        .await?;

    Ok(Json(MessagePageResponse {
        messages: page.messages.into_iter().map(Into::into).collect(),
        has_more: page.has_more,
        next_cursor: page.next_cursor,
    }))
}

/// Posts a text message to a conversation.
///
/// # Errors
/// Returns `AppError::Forbidden` if the sender is not a participant.
pub async fn send(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    let message_type = payload.message_type.unwrap_or(MessageType::Text);
    if message_type == MessageType::Attachment {
        return Err(AppError::Validation("Attachment messages must use the attachment endpoint".into()));
    }

    let message = state
        .message_service
        .send(payload.conversation_id, auth_user.caller.user_id, payload.content, message_type, None)
        .await?;

    // Sending implies the user stopped typing.
    state.typing.clear_typing(payload.conversation_id, auth_user.caller.user_id);

    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}

/// Posts a message carrying a file (multipart: conversationId, file, content?).
///
/// # Errors
/// Returns `AppError::Validation` for a missing, oversized, or
/// disallowed-type file; the file is never stored in that case.
pub async fn send_attachment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut conversation_id: Option<Uuid> = None;
    let mut content = String::new();
    let mut file: Option<IncomingFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        match field.name() {
            Some("conversationId") => {
                let text = field.text().await.map_err(bad_multipart)?;
                conversation_id = Some(
                    Uuid::parse_str(&text).map_err(|_| AppError::Validation("Invalid conversationId".into()))?,
                );
            }
            Some("content") => content = field.text().await.map_err(bad_multipart)?,
            Some("file") => {
                let declared_name = field.file_name().unwrap_or("attachment").to_string();
                let declared_mime_type = field.content_type().unwrap_or("application/octet-stream").to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                file = Some(IncomingFile { bytes, declared_name, declared_mime_type });
            }
            _ => {}
        }
    }

    let conversation_id =
        conversation_id.ok_or_else(|| AppError::Validation("conversationId is required".into()))?;
    let file = file.ok_or_else(|| AppError::Validation("file is required".into()))?;

    // Membership and file rules are checked before any storage write.
    let conversation =
        state.conversation_service.find(conversation_id).await?.ok_or(AppError::NotFound)?;
    if !conversation.is_participant(auth_user.caller.user_id) {
        return Err(AppError::Forbidden);
    }

    let attachment = state.attachment_service.accept(file).await?;

    let message = state
        .message_service
        .send(conversation_id, auth_user.caller.user_id, content, MessageType::Attachment, Some(attachment))
        .await?;

    state.typing.clear_typing(conversation_id, auth_user.caller.user_id);

    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("Malformed multipart request: {e}"))
}
