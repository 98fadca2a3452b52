use crate::domain::notification::NewNotification;
use crate::error::Result;
use crate::storage::DbPool;
use async_trait::async_trait;

/// Destination for fan-out notification rows.
///
/// The dispatcher only needs "write one row for one recipient"; keeping this a
/// trait lets tests substitute a failing sink to exercise per-recipient isolation.
#[async_trait]
pub trait NotificationSink: Send + Sync + std::fmt::Debug {
    /// Records a single notification for a single recipient.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the row cannot be written.
    async fn deliver(&self, notification: &NewNotification) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct NotificationRepository {
    pool: DbPool,
}

impl NotificationRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for NotificationRepository {
    async fn deliver(&self, notification: &NewNotification) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO notifications (user_id, kind, title, body, related_id, related_type, action_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(notification.related_id)
        .bind(notification.related_type)
        .bind(&notification.action_url)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
