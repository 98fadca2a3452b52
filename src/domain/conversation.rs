use crate::error::{AppError, Result};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: Uuid,
    pub participant_ids: Vec<Uuid>,
    pub subject: Option<String>,
    pub related_booking_id: Option<Uuid>,
    pub last_message_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

impl Conversation {
    #[must_use]
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participant_ids.contains(&user_id)
    }
}

/// A conversation annotated with the caller-appropriate unread figure:
/// a personal unread count for participants, the total message count for admins.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub unread_count: i64,
}

/// Sorts and dedupes a participant set.
///
/// Participant arrays are stored sorted so that set equality reduces to array
/// equality when looking up an existing conversation.
///
/// # Errors
/// Returns `AppError::Validation` if fewer than two distinct participants remain.
pub fn normalize_participants(mut ids: Vec<Uuid>) -> Result<Vec<Uuid>> {
    ids.sort_unstable();
    ids.dedup();
    if ids.len() < 2 {
        return Err(AppError::Validation("A conversation requires at least two distinct participants".into()));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_sorts_and_dedupes() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let normalized = normalize_participants(vec![b, a, b]).unwrap();

        let mut expected = vec![a, b];
        expected.sort_unstable();
        assert_eq!(normalized, expected);
    }

    #[test]
    fn normalize_rejects_fewer_than_two_distinct() {
        let a = Uuid::new_v4();
        assert!(matches!(normalize_participants(vec![a, a]), Err(AppError::Validation(_))));
        assert!(matches!(normalize_participants(vec![a]), Err(AppError::Validation(_))));
        assert!(matches!(normalize_participants(vec![]), Err(AppError::Validation(_))));
    }
}
