use crate::domain::conversation::Conversation;
use crate::domain::message::{Message, MessageType};
use crate::domain::notification::{NewNotification, NotificationKind};
use crate::storage::notification_repo::NotificationSink;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use uuid::Uuid;

const BODY_PREVIEW_CHARS: usize = 120;

#[derive(Clone, Debug)]
struct Metrics {
    fanout_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("encore-messaging");
        Self {
            fanout_total: meter
                .u64_counter("encore_notification_fanout_total")
                .with_description("Per-recipient notification fan-out attempts")
                .build(),
        }
    }
}

/// Fans out "new activity" notifications to every other participant of a conversation.
///
/// Each recipient is an independent attempt: one failed write is logged and
/// never blocks delivery to the rest, and never fails the parent send. There
/// is no retry queue; the polling protocol remains the source of truth.
#[derive(Clone, Debug)]
pub struct NotificationDispatcher {
    sink: Arc<dyn NotificationSink>,
    metrics: Metrics,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink, metrics: Metrics::new() }
    }

    #[tracing::instrument(skip(self, message, conversation), fields(message_id = %message.id, conversation_id = %conversation.id))]
    pub async fn on_message_created(&self, message: &Message, conversation: &Conversation) {
        let title = match message.message_type {
            MessageType::Text => "New message",
            MessageType::Attachment => "New attachment",
        };
        let body = preview(message);

        for &participant in &conversation.participant_ids {
            if participant == message.sender_id {
                continue;
            }

            let notification = NewNotification {
                user_id: participant,
                kind: NotificationKind::Message,
                title: title.to_string(),
                body: body.clone(),
                related_id: message.id,
                related_type: "message",
                action_url: conversation_url(conversation.id),
            };

            match self.sink.deliver(&notification).await {
                Ok(()) => {
                    self.metrics.fanout_total.add(1, &[KeyValue::new("status", "sent")]);
                }
                Err(e) => {
                    tracing::warn!(error = %e, recipient = %participant, "Notification fan-out failed for recipient");
                    self.metrics.fanout_total.add(1, &[KeyValue::new("status", "error")]);
                }
            }
        }
    }
}

fn conversation_url(conversation_id: Uuid) -> String {
    format!("/conversations/{conversation_id}")
}

fn preview(message: &Message) -> String {
    if message.message_type == MessageType::Attachment {
        return message
            .attachment
            .as_ref()
            .map_or_else(String::new, |attachment| attachment.original_name.clone());
    }

    message.content.chars().take(BODY_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use time::OffsetDateTime;

    #[derive(Debug, Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<Uuid>>,
        fail_for: Option<Uuid>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn deliver(&self, notification: &NewNotification) -> Result<()> {
            if self.fail_for == Some(notification.user_id) {
                return Err(AppError::Internal);
            }
            self.delivered.lock().unwrap().push(notification.user_id);
            Ok(())
        }
    }

    fn conversation(participants: Vec<Uuid>) -> Conversation {
        let now = OffsetDateTime::now_utc();
        Conversation {
            id: Uuid::new_v4(),
            participant_ids: participants,
            subject: None,
            related_booking_id: None,
            last_message_at: now,
            created_at: now,
        }
    }

    fn text_message(conversation_id: Uuid, sender_id: Uuid) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            content: "Hello".into(),
            message_type: MessageType::Text,
            attachment: None,
            read_by: vec![sender_id],
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn fans_out_to_everyone_but_the_sender() {
        crate::telemetry::init_test_telemetry();
        let sender = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let conversation = conversation(vec![sender, b, c]);
        let message = text_message(conversation.id, sender);

        let sink = Arc::new(RecordingSink::default());
        let dispatcher = NotificationDispatcher::new(Arc::clone(&sink) as Arc<dyn NotificationSink>);

        dispatcher.on_message_created(&message, &conversation).await;

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert!(delivered.contains(&b));
        assert!(delivered.contains(&c));
        assert!(!delivered.contains(&sender));
    }

    #[tokio::test]
    async fn one_failed_recipient_does_not_block_the_rest() {
        crate::telemetry::init_test_telemetry();
        let sender = Uuid::new_v4();
        let failing = Uuid::new_v4();
        let c = Uuid::new_v4();
        let d = Uuid::new_v4();
        let conversation = conversation(vec![sender, failing, c, d]);
        let message = text_message(conversation.id, sender);

        let sink = Arc::new(RecordingSink { delivered: Mutex::new(Vec::new()), fail_for: Some(failing) });
        let dispatcher = NotificationDispatcher::new(Arc::clone(&sink) as Arc<dyn NotificationSink>);

        dispatcher.on_message_created(&message, &conversation).await;

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert!(delivered.contains(&c));
        assert!(delivered.contains(&d));
    }

    #[tokio::test]
    async fn attachment_messages_carry_a_distinguishing_title() {
        crate::telemetry::init_test_telemetry();
        let sender = Uuid::new_v4();
        let b = Uuid::new_v4();
        let conversation = conversation(vec![sender, b]);
        let mut message = text_message(conversation.id, sender);
        message.message_type = MessageType::Attachment;
        message.content = String::new();
        message.attachment = Some(crate::domain::message::AttachmentMeta {
            url: "https://cdn.example/abc".into(),
            mime_type: "application/pdf".into(),
            original_name: "rider.pdf".into(),
            size_bytes: 1024,
        });

        #[derive(Debug, Default)]
        struct TitleSink {
            titles: Mutex<Vec<String>>,
        }

        #[async_trait]
        impl NotificationSink for TitleSink {
            async fn deliver(&self, notification: &NewNotification) -> Result<()> {
                self.titles.lock().unwrap().push(notification.title.clone());
                Ok(())
            }
        }

        let sink = Arc::new(TitleSink::default());
        let dispatcher = NotificationDispatcher::new(Arc::clone(&sink) as Arc<dyn NotificationSink>);

        dispatcher.on_message_created(&message, &conversation).await;

        let titles = sink.titles.lock().unwrap();
        assert_eq!(titles.as_slice(), ["New attachment"]);
    }
}
