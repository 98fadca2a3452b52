use crate::domain::message::{AttachmentMeta, Message, MessageType};
use crate::error::Result;
use crate::storage::DbPool;
use crate::storage::records::message::MessageRecord;
use time::OffsetDateTime;
use uuid::Uuid;

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, content, message_type, \
     attachment_url, attachment_mime_type, attachment_name, attachment_size_bytes, read_by, created_at";

#[derive(Clone, Debug)]
pub struct MessageRepository {
    pool: DbPool,
}

impl MessageRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Appends a message and advances the conversation watermark in one transaction.
    ///
    /// The insert seeds `read_by` with the sender, and the watermark advance is
    /// update-if-greater so concurrent appends can never move it backward.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the transaction fails.
    pub async fn append(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
        message_type: MessageType,
        attachment: Option<&AttachmentMeta>,
    ) -> Result<Message> {
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            r"
            INSERT INTO messages (conversation_id, sender_id, content, message_type,
                                  attachment_url, attachment_mime_type, attachment_name, attachment_size_bytes,
                                  read_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, ARRAY[$2])
            RETURNING {MESSAGE_COLUMNS}
            "
        ))
        .bind(conversation_id)
        .bind(sender_id)
        .bind(content)
        .bind(message_type.code())
        .bind(attachment.map(|a| a.url.as_str()))
        .bind(attachment.map(|a| a.mime_type.as_str()))
        .bind(attachment.map(|a| a.original_name.as_str()))
        .bind(attachment.map(|a| a.size_bytes))
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET last_message_at = GREATEST(last_message_at, $2) WHERE id = $1")
            .bind(conversation_id)
            .bind(record.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(record.into())
    }

    /// One page of history, newest first, using a `(created_at, id)` keyset cursor.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub async fn page(
        &self,
        conversation_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Message>> {
        let records = if let Some((created_at, id)) = cursor {
            sqlx::query_as::<_, MessageRecord>(&format!(
                r"
                SELECT {MESSAGE_COLUMNS}
                FROM messages
                WHERE conversation_id = $1 AND (created_at, id) < ($2, $3)
                ORDER BY created_at DESC, id DESC
                LIMIT $4
                "
            ))
            .bind(conversation_id)
            .bind(created_at)
            .bind(id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, MessageRecord>(&format!(
                r"
                SELECT {MESSAGE_COLUMNS}
                FROM messages
                WHERE conversation_id = $1
                ORDER BY created_at DESC, id DESC
                LIMIT $2
                "
            ))
            .bind(conversation_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Messages created at or after the watermark, oldest first for chronological display.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub async fn list_since(&self, conversation_id: Uuid, since: OffsetDateTime) -> Result<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            r"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE conversation_id = $1 AND created_at >= $2
            ORDER BY created_at ASC, id ASC
            "
        ))
        .bind(conversation_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Adds the user to `read_by` for each listed message that does not contain them yet.
    ///
    /// The containment guard makes this idempotent; a repeat call affects zero rows.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    pub async fn mark_read(&self, message_ids: &[Uuid], user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE messages
            SET read_by = array_append(read_by, $2)
            WHERE id = ANY($1) AND NOT (read_by @> ARRAY[$2])
            ",
        )
        .bind(message_ids)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Count of messages in the conversation the user has not read.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub async fn count_unread(&self, conversation_id: Uuid, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = $1 AND NOT (read_by @> ARRAY[$2])",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Total message count, surfaced to admins in place of a personal unread count.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub async fn count_all(&self, conversation_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = $1")
            .bind(conversation_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
