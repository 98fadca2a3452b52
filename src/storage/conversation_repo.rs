use crate::domain::conversation::Conversation;
use crate::error::Result;
use crate::storage::DbPool;
use crate::storage::records::conversation::ConversationRecord;
use time::OffsetDateTime;
use uuid::Uuid;

const CONVERSATION_COLUMNS: &str = "id, participant_ids, subject, related_booking_id, last_message_at, created_at";

#[derive(Clone, Debug)]
pub struct ConversationRepository {
    pool: DbPool,
}

impl ConversationRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Inserts a new conversation. Participant ids must already be normalized (sorted, distinct).
    ///
    /// # Errors
    /// Returns `AppError::Database` if the insert fails.
    pub async fn create(
        &self,
        participant_ids: &[Uuid],
        subject: Option<&str>,
        related_booking_id: Option<Uuid>,
    ) -> Result<Conversation> {
        let record = sqlx::query_as::<_, ConversationRecord>(&format!(
            r"
            INSERT INTO conversations (participant_ids, subject, related_booking_id)
            VALUES ($1, $2, $3)
            RETURNING {CONVERSATION_COLUMNS}
            "
        ))
        .bind(participant_ids)
        .bind(subject)
        .bind(related_booking_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(record.into())
    }

    /// Looks up a conversation for the same participant set and booking context.
    ///
    /// Participant arrays are stored sorted, so set equality reduces to array equality.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub async fn find_existing(
        &self,
        participant_ids: &[Uuid],
        related_booking_id: Option<Uuid>,
    ) -> Result<Option<Conversation>> {
        let record = sqlx::query_as::<_, ConversationRecord>(&format!(
            r"
            SELECT {CONVERSATION_COLUMNS}
            FROM conversations
            WHERE participant_ids = $1 AND related_booking_id IS NOT DISTINCT FROM $2
            LIMIT 1
            "
        ))
        .bind(participant_ids)
        .bind(related_booking_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Into::into))
    }

    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>> {
        let record = sqlx::query_as::<_, ConversationRecord>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Into::into))
    }

    /// Conversations the user participates in, most recently active first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub async fn list_for_participant(&self, user_id: Uuid) -> Result<Vec<Conversation>> {
        let records = sqlx::query_as::<_, ConversationRecord>(&format!(
            r"
            SELECT {CONVERSATION_COLUMNS}
            FROM conversations
            WHERE $1 = ANY(participant_ids)
            ORDER BY last_message_at DESC
            "
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// All conversations, most recently active first. Admin visibility only.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Conversation>> {
        let records = sqlx::query_as::<_, ConversationRecord>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations ORDER BY last_message_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Conversations for the user with activity at or after the watermark.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub async fn list_for_participant_since(
        &self,
        user_id: Uuid,
        since: OffsetDateTime,
    ) -> Result<Vec<Conversation>> {
        let records = sqlx::query_as::<_, ConversationRecord>(&format!(
            r"
            SELECT {CONVERSATION_COLUMNS}
            FROM conversations
            WHERE $1 = ANY(participant_ids) AND last_message_at >= $2
            ORDER BY last_message_at DESC
            "
        ))
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// All conversations with activity at or after the watermark. Admin visibility only.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub async fn list_all_since(&self, since: OffsetDateTime) -> Result<Vec<Conversation>> {
        let records = sqlx::query_as::<_, ConversationRecord>(&format!(
            r"
            SELECT {CONVERSATION_COLUMNS}
            FROM conversations
            WHERE last_message_at >= $1
            ORDER BY last_message_at DESC
            "
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }
}
