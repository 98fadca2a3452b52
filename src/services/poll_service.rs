use crate::domain::auth::Caller;
use crate::domain::conversation::ConversationSummary;
use crate::domain::message::Message;
use crate::error::{AppError, Result};
use crate::services::message_service::check_access;
use crate::services::poll_gate::{GateDecision, PollGate};
use crate::storage::conversation_repo::ConversationRepository;
use crate::storage::message_repo::MessageRepository;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::time::Instant;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    polls_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("encore-messaging");
        Self {
            polls_total: meter
                .u64_counter("encore_polls_total")
                .with_description("Poll requests by outcome")
                .build(),
        }
    }
}

/// What changed since the caller's watermark.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub conversations: Vec<ConversationSummary>,
    pub messages: Vec<Message>,
    pub timestamp: OffsetDateTime,
}

/// The incremental-sync protocol: given a watermark, returns new and changed
/// state since that point. The per-user poll gate is consulted before any
/// store access.
#[derive(Clone, Debug)]
pub struct PollCoordinator {
    conversations: ConversationRepository,
    messages: MessageRepository,
    gate: PollGate,
    default_lookback: Duration,
    max_lookback: Duration,
    metrics: Metrics,
}

impl PollCoordinator {
    #[must_use]
    pub fn new(
        conversations: ConversationRepository,
        messages: MessageRepository,
        gate: PollGate,
        default_lookback_secs: i64,
        max_lookback_secs: i64,
    ) -> Self {
        Self {
            conversations,
            messages,
            gate,
            default_lookback: Duration::seconds(default_lookback_secs),
            max_lookback: Duration::seconds(max_lookback_secs),
            metrics: Metrics::new(),
        }
    }

    /// Runs one poll for the caller.
    ///
    /// # Errors
    /// Returns `AppError::RateLimited` if the caller polled inside the
    /// minimum interval, `AppError::NotFound`/`AppError::Forbidden` for a
    /// bad or inaccessible conversation scope.
    #[tracing::instrument(
        err(level = "debug"),
        skip(self),
        fields(user_id = %caller.user_id, conversation_id = ?conversation_id)
    )]
    pub async fn poll(
        &self,
        caller: Caller,
        since: Option<OffsetDateTime>,
        conversation_id: Option<Uuid>,
    ) -> Result<PollOutcome> {
        if let GateDecision::Denied { retry_after_ms } = self.gate.check_and_record(caller.user_id, Instant::now())
        {
            self.metrics.polls_total.add(1, &[KeyValue::new("outcome", "throttled")]);
            return Err(AppError::RateLimited { retry_after_ms });
        }

        let now = OffsetDateTime::now_utc();
        let since = clamp_since(since, now, self.default_lookback, self.max_lookback);

        let outcome = match conversation_id {
            Some(id) => self.poll_conversation(caller, id, since, now).await,
            None => self.poll_overview(caller, since, now).await,
        };

        let label = if outcome.is_ok() { "ok" } else { "error" };
        self.metrics.polls_total.add(1, &[KeyValue::new("outcome", label)]);

        outcome
    }

    /// Every conversation the caller can see with activity since the
    /// watermark, annotated with the role-appropriate unread figure, plus the
    /// new messages in those conversations. The overview never marks anything
    /// read; only a detail fetch does.
    async fn poll_overview(
        &self,
        caller: Caller,
        since: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Result<PollOutcome> {
        let conversations = if caller.is_admin() {
            self.conversations.list_all_since(since).await?
        } else {
            self.conversations.list_for_participant_since(caller.user_id, since).await?
        };

        let mut summaries = Vec::with_capacity(conversations.len());
        let mut messages = Vec::new();
        for conversation in conversations {
            // Admins observe total activity volume; they own no reading state.
            let unread_count = if caller.is_admin() {
                self.messages.count_all(conversation.id).await?
            } else {
                self.messages.count_unread(conversation.id, caller.user_id).await?
            };
            messages.extend(self.messages.list_since(conversation.id, since).await?);
            summaries.push(ConversationSummary { conversation, unread_count });
        }

        // Chronological across conversations, id tiebreak for equal timestamps.
        messages.sort_by_key(|m| (m.created_at, m.id));

        Ok(PollOutcome { conversations: summaries, messages, timestamp: now })
    }

    /// New messages in one conversation since the watermark, oldest first.
    /// Participant reads mark the returned messages read; admin reads never
    /// mutate `read_by`.
    async fn poll_conversation(
        &self,
        caller: Caller,
        conversation_id: Uuid,
        since: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Result<PollOutcome> {
        let conversation = self
            .conversations
            .find_by_id(conversation_id)
            .await?
            .ok_or(AppError::NotFound)?;
        check_access(&conversation, caller)?;

        let messages = self.messages.list_since(conversation_id, since).await?;

        if !caller.is_admin() && !messages.is_empty() {
            let ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();
            self.messages.mark_read(&ids, caller.user_id).await?;
        }

        Ok(PollOutcome { conversations: Vec::new(), messages, timestamp: now })
    }
}

/// Applies the default lookback when `since` is absent and clamps it to the
/// maximum lookback to bound query cost.
fn clamp_since(
    requested: Option<OffsetDateTime>,
    now: OffsetDateTime,
    default_lookback: Duration,
    max_lookback: Duration,
) -> OffsetDateTime {
    let floor = now - max_lookback;
    requested.unwrap_or_else(|| now - default_lookback).max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: Duration = Duration::seconds(30);
    const MAX: Duration = Duration::seconds(300);

    #[test]
    fn missing_since_defaults_to_thirty_seconds_ago() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(clamp_since(None, now, DEFAULT, MAX), now - DEFAULT);
    }

    #[test]
    fn recent_since_passes_through() {
        let now = OffsetDateTime::now_utc();
        let requested = now - Duration::seconds(10);
        assert_eq!(clamp_since(Some(requested), now, DEFAULT, MAX), requested);
    }

    #[test]
    fn ancient_since_is_clamped_to_the_floor() {
        let now = OffsetDateTime::now_utc();
        let requested = now - Duration::hours(6);
        assert_eq!(clamp_since(Some(requested), now, DEFAULT, MAX), now - MAX);
    }

    #[test]
    fn future_since_is_accepted_verbatim() {
        // A future watermark simply yields an empty diff; no special casing.
        let now = OffsetDateTime::now_utc();
        let requested = now + Duration::seconds(5);
        assert_eq!(clamp_since(Some(requested), now, DEFAULT, MAX), requested);
    }
}
