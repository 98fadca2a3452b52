use crate::domain::conversation::Conversation;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
pub(crate) struct ConversationRecord {
    pub id: Uuid,
    pub participant_ids: Vec<Uuid>,
    pub subject: Option<String>,
    pub related_booking_id: Option<Uuid>,
    pub last_message_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

impl From<ConversationRecord> for Conversation {
    fn from(record: ConversationRecord) -> Self {
        Self {
            id: record.id,
            participant_ids: record.participant_ids,
            subject: record.subject,
            related_booking_id: record.related_booking_id,
            last_message_at: record.last_message_at,
            created_at: record.created_at,
        }
    }
}
