use crate::domain::auth::Caller;
use crate::domain::conversation::{Conversation, ConversationSummary, normalize_participants};
use crate::domain::message::MessageType;
use crate::error::Result;
use crate::services::message_service::MessageService;
use crate::storage::conversation_repo::ConversationRepository;
use crate::storage::message_repo::MessageRepository;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct ConversationService {
    conversations: ConversationRepository,
    messages: MessageRepository,
    sender: MessageService,
}

impl ConversationService {
    #[must_use]
    pub const fn new(
        conversations: ConversationRepository,
        messages: MessageRepository,
        sender: MessageService,
    ) -> Self {
        Self { conversations, messages, sender }
    }

    /// Opens a conversation between the caller and a recipient, reusing an
    /// existing one for the same participant pair and booking context. An
    /// optional initial message is appended to whichever conversation results.
    ///
    /// # Errors
    /// Returns `AppError::Validation` if the participant pair is degenerate.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, subject, initial_message),
        fields(user_id = %caller.user_id, recipient_id = %recipient_id)
    )]
    pub async fn open(
        &self,
        caller: Caller,
        recipient_id: Uuid,
        subject: Option<String>,
        booking_id: Option<Uuid>,
        initial_message: Option<String>,
    ) -> Result<Conversation> {
        let participants = normalize_participants(vec![caller.user_id, recipient_id])?;

        let conversation = match self.conversations.find_existing(&participants, booking_id).await? {
            Some(existing) => {
                tracing::debug!(conversation_id = %existing.id, "Reusing existing conversation");
                existing
            }
            None => self.conversations.create(&participants, subject.as_deref(), booking_id).await?,
        };

        if let Some(content) = initial_message.filter(|c| !c.trim().is_empty()) {
            self.sender.send(conversation.id, caller.user_id, content, MessageType::Text, None).await?;
        }

        Ok(conversation)
    }

    /// Lists the caller's conversations (all of them for admins), most
    /// recently active first, annotated with the role-appropriate unread figure.
    ///
    /// # Errors
    /// Returns `AppError::Database` if a query fails.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(user_id = %caller.user_id))]
    pub async fn list(&self, caller: Caller) -> Result<Vec<ConversationSummary>> {
        let conversations = if caller.is_admin() {
            self.conversations.list_all().await?
        } else {
            self.conversations.list_for_participant(caller.user_id).await?
        };

        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let unread_count = if caller.is_admin() {
                self.messages.count_all(conversation.id).await?
            } else {
                self.messages.count_unread(conversation.id, caller.user_id).await?
            };
            summaries.push(ConversationSummary { conversation, unread_count });
        }

        Ok(summaries)
    }

    /// # Errors
    /// Returns `AppError::Database` if the lookup fails.
    pub async fn find(&self, conversation_id: Uuid) -> Result<Option<Conversation>> {
        self.conversations.find_by_id(conversation_id).await
    }
}
