use crate::domain::auth::Caller;
use crate::domain::conversation::Conversation;
use crate::domain::message::{AttachmentMeta, Message, MessageType};
use crate::error::{AppError, Result};
use crate::services::notification_service::NotificationDispatcher;
use crate::storage::conversation_repo::ConversationRepository;
use crate::storage::message_repo::MessageRepository;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    sent_total: Counter<u64>,
    page_size: Histogram<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("encore-messaging");
        Self {
            sent_total: meter
                .u64_counter("encore_messages_sent_total")
                .with_description("Total messages successfully appended")
                .build(),
            page_size: meter
                .u64_histogram("encore_message_page_size")
                .with_description("Number of messages returned in a single history page")
                .build(),
        }
    }
}

/// One page of conversation history, newest first.
#[derive(Debug, Clone)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

#[derive(Clone, Debug)]
pub struct MessageService {
    conversations: ConversationRepository,
    messages: MessageRepository,
    dispatcher: NotificationDispatcher,
    default_page_size: i64,
    max_page_size: i64,
    metrics: Metrics,
}

impl MessageService {
    #[must_use]
    pub fn new(
        conversations: ConversationRepository,
        messages: MessageRepository,
        dispatcher: NotificationDispatcher,
        default_page_size: i64,
        max_page_size: i64,
    ) -> Self {
        Self { conversations, messages, dispatcher, default_page_size, max_page_size, metrics: Metrics::new() }
    }

    /// Appends a message to a conversation and fans out notifications.
    ///
    /// The append seeds `read_by` with the sender and advances the
    /// conversation watermark; fan-out is best-effort and never fails the send.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` for an unknown conversation,
    /// `AppError::Forbidden` if the sender is not a participant, and
    /// `AppError::Validation` for an empty message without an attachment.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, content, attachment),
        fields(conversation_id = %conversation_id, sender_id = %sender_id)
    )]
    pub async fn send(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: String,
        message_type: MessageType,
        attachment: Option<AttachmentMeta>,
    ) -> Result<Message> {
        let conversation = self
            .conversations
            .find_by_id(conversation_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if !conversation.is_participant(sender_id) {
            return Err(AppError::Forbidden);
        }

        validate_payload(&content, message_type, attachment.as_ref())?;

        let message = self
            .messages
            .append(conversation_id, sender_id, &content, message_type, attachment.as_ref())
            .await?;

        self.metrics.sent_total.add(1, &[KeyValue::new("type", type_label(message_type))]);
        tracing::debug!(message_id = %message.id, "Message appended");

        self.dispatcher.on_message_created(&message, &conversation).await;

        Ok(message)
    }

    /// Fetches one page of history, newest first, and marks the returned
    /// messages read for participant callers. Admin reads are observational
    /// and never mutate read state.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` for an unknown conversation,
    /// `AppError::Forbidden` for a caller who is neither participant nor
    /// admin, and `AppError::Validation` for an unparseable cursor.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, cursor),
        fields(conversation_id = %conversation_id, user_id = %caller.user_id)
    )]
    pub async fn history(
        &self,
        caller: Caller,
        conversation_id: Uuid,
        cursor: Option<String>,
        page_size: Option<i64>,
    ) -> Result<MessagePage> {
        let conversation = self
            .conversations
            .find_by_id(conversation_id)
            .await?
            .ok_or(AppError::NotFound)?;
        check_access(&conversation, caller)?;

        let limit = page_size.unwrap_or(self.default_page_size).clamp(1, self.max_page_size);
        let decoded = cursor.as_deref().map(decode_cursor).transpose()?;

        // Fetch one extra row to learn whether another page exists.
        let mut messages = self.messages.page(conversation_id, decoded, limit + 1).await?;
        let has_more = messages.len() as i64 > limit;
        messages.truncate(limit as usize);

        self.metrics.page_size.record(messages.len() as u64, &[]);

        if !caller.is_admin() && !messages.is_empty() {
            let ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();
            self.messages.mark_read(&ids, caller.user_id).await?;
        }

        // The cursor points at the oldest message returned.
        let next_cursor = if has_more {
            messages.last().map(|m| encode_cursor(m.created_at, m.id))
        } else {
            None
        };

        Ok(MessagePage { messages, has_more, next_cursor })
    }

    /// Idempotently adds the user to `read_by` for each message.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    pub async fn mark_read(&self, message_ids: &[Uuid], user_id: Uuid) -> Result<u64> {
        self.messages.mark_read(message_ids, user_id).await
    }
}

fn type_label(message_type: MessageType) -> &'static str {
    match message_type {
        MessageType::Text => "text",
        MessageType::Attachment => "attachment",
    }
}

fn validate_payload(
    content: &str,
    message_type: MessageType,
    attachment: Option<&AttachmentMeta>,
) -> Result<()> {
    match message_type {
        MessageType::Text => {
            if attachment.is_some() {
                return Err(AppError::Validation("A text message cannot carry an attachment".into()));
            }
            if content.trim().is_empty() {
                return Err(AppError::Validation("Message content is required".into()));
            }
        }
        MessageType::Attachment => {
            if attachment.is_none() {
                return Err(AppError::Validation("An attachment message requires a file".into()));
            }
        }
    }
    Ok(())
}

pub(crate) fn check_access(conversation: &Conversation, caller: Caller) -> Result<()> {
    if caller.is_admin() || conversation.is_participant(caller.user_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Encodes a `(created_at, id)` ordering key as an opaque pagination token.
pub(crate) fn encode_cursor(created_at: OffsetDateTime, id: Uuid) -> String {
    let raw = format!("{}:{}", created_at.unix_timestamp_nanos(), id);
    URL_SAFE_NO_PAD.encode(raw)
}

/// Decodes a pagination token produced by [`encode_cursor`].
///
/// # Errors
/// Returns `AppError::Validation` for a token this server did not produce.
pub(crate) fn decode_cursor(cursor: &str) -> Result<(OffsetDateTime, Uuid)> {
    let invalid = || AppError::Validation("Invalid pagination cursor".into());

    let raw = URL_SAFE_NO_PAD.decode(cursor).map_err(|_| invalid())?;
    let raw = String::from_utf8(raw).map_err(|_| invalid())?;
    let (nanos, id) = raw.split_once(':').ok_or_else(invalid)?;

    let nanos: i128 = nanos.parse().map_err(|_| invalid())?;
    let created_at = OffsetDateTime::from_unix_timestamp_nanos(nanos).map_err(|_| invalid())?;
    let id = Uuid::parse_str(id).map_err(|_| invalid())?;

    Ok((created_at, id))
}
