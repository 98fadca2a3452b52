use crate::domain::message::{AttachmentMeta, Message, MessageType};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
pub(crate) struct MessageRecord {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: i16,
    pub attachment_url: Option<String>,
    pub attachment_mime_type: Option<String>,
    pub attachment_name: Option<String>,
    pub attachment_size_bytes: Option<i64>,
    pub read_by: Vec<Uuid>,
    pub created_at: OffsetDateTime,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        let attachment = match (
            record.attachment_url,
            record.attachment_mime_type,
            record.attachment_name,
            record.attachment_size_bytes,
        ) {
            (Some(url), Some(mime_type), Some(original_name), Some(size_bytes)) => {
                Some(AttachmentMeta { url, mime_type, original_name, size_bytes })
            }
            _ => None,
        };

        Self {
            id: record.id,
            conversation_id: record.conversation_id,
            sender_id: record.sender_id,
            content: record.content,
            message_type: MessageType::try_from(record.message_type).unwrap_or(MessageType::Text),
            attachment,
            read_by: record.read_by,
            created_at: record.created_at,
        }
    }
}
