use crate::domain::typing::Typer;
use dashmap::DashMap;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct TypingEntry {
    user_id: Uuid,
    user_name: String,
    at: OffsetDateTime,
}

/// Ephemeral per-conversation set of "currently typing" users.
///
/// Expiry is evaluated lazily on every read or write of a conversation's
/// list; staleness only ever affects UI ephemera.
#[derive(Clone, Debug)]
pub struct TypingTracker {
    typers: Arc<DashMap<Uuid, Vec<TypingEntry>>>,
    timeout: Duration,
}

impl TypingTracker {
    #[must_use]
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            typers: Arc::new(DashMap::new()),
            timeout: Duration::milliseconds(i64::try_from(timeout_ms).unwrap_or(i64::MAX)),
        }
    }

    pub fn set_typing(&self, conversation_id: Uuid, user_id: Uuid, user_name: String) {
        self.set_typing_at(conversation_id, user_id, user_name, OffsetDateTime::now_utc());
    }

    /// Removes the user's entry immediately (stop-typing signal or message send).
    pub fn clear_typing(&self, conversation_id: Uuid, user_id: Uuid) {
        if let Some(mut entries) = self.typers.get_mut(&conversation_id) {
            entries.retain(|entry| entry.user_id != user_id);
        }
    }

    #[must_use]
    pub fn typers(&self, conversation_id: Uuid, excluding_user_id: Uuid) -> Vec<Typer> {
        self.typers_at(conversation_id, excluding_user_id, OffsetDateTime::now_utc())
    }

    pub(crate) fn set_typing_at(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        user_name: String,
        now: OffsetDateTime,
    ) {
        let mut entries = self.typers.entry(conversation_id).or_default();
        entries.retain(|entry| now - entry.at <= self.timeout && entry.user_id != user_id);
        entries.push(TypingEntry { user_id, user_name, at: now });
    }

    pub(crate) fn typers_at(
        &self,
        conversation_id: Uuid,
        excluding_user_id: Uuid,
        now: OffsetDateTime,
    ) -> Vec<Typer> {
        let Some(mut entries) = self.typers.get_mut(&conversation_id) else {
            return Vec::new();
        };

        entries.retain(|entry| now - entry.at <= self.timeout);

        entries
            .iter()
            .filter(|entry| entry.user_id != excluding_user_id)
            .map(|entry| Typer { user_id: entry.user_id, user_name: entry.user_name.clone() })
            .collect()
    }
}
