use encore_messaging::domain::auth::{Caller, Role};
use encore_messaging::services::conversation_service::ConversationService;
use encore_messaging::services::message_service::MessageService;
use encore_messaging::services::notification_service::NotificationDispatcher;
use encore_messaging::services::poll_gate::PollGate;
use encore_messaging::services::poll_service::PollCoordinator;
use encore_messaging::storage::conversation_repo::ConversationRepository;
use encore_messaging::storage::message_repo::MessageRepository;
use encore_messaging::storage::notification_repo::NotificationRepository;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

mod common;

struct Services {
    conversations: ConversationService,
    messages: MessageService,
    poll: PollCoordinator,
}

fn services(pool: &PgPool) -> Services {
    let conversation_repo = ConversationRepository::new(pool.clone());
    let message_repo = MessageRepository::new(pool.clone());
    let dispatcher = NotificationDispatcher::new(Arc::new(NotificationRepository::new(pool.clone())));

    let messages =
        MessageService::new(conversation_repo.clone(), message_repo.clone(), dispatcher, 50, 100);
    let conversations =
        ConversationService::new(conversation_repo.clone(), message_repo.clone(), messages.clone());

    // A zero-width window keeps the gate out of the way of back-to-back polls.
    let gate = PollGate::new(Duration::ZERO, Duration::from_secs(60));
    let poll = PollCoordinator::new(conversation_repo, message_repo, gate, 30, 300);

    Services { conversations, messages, poll }
}

#[tokio::test]
async fn overview_poll_carries_the_new_message_and_unread_count() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("ENCORE_TEST_DATABASE_URL not set; skipping");
        return;
    };
    let services = services(&pool);
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let caller_a = Caller { user_id: a, role: Role::Participant };
    let caller_b = Caller { user_id: b, role: Role::Participant };

    let conversation =
        services.conversations.open(caller_a, b, None, None, Some("Hello".into())).await.unwrap();
    let since = conversation.created_at - time::Duration::seconds(1);

    let outcome = services.poll.poll(caller_b, Some(since), None).await.unwrap();
    let summary = outcome
        .conversations
        .iter()
        .find(|s| s.conversation.id == conversation.id)
        .expect("updated conversation must appear in the overview");
    assert_eq!(summary.unread_count, 1);
    assert_eq!(outcome.messages.len(), 1);
    assert_eq!(outcome.messages[0].content, "Hello");
    assert_eq!(outcome.messages[0].conversation_id, conversation.id);

    // The overview is observational; polling again still reports it unread.
    let outcome = services.poll.poll(caller_b, Some(since), None).await.unwrap();
    let summary = outcome.conversations.iter().find(|s| s.conversation.id == conversation.id).unwrap();
    assert_eq!(summary.unread_count, 1);

    // Fetching history marks the page read, and the next poll reflects it.
    let page = services.messages.history(caller_b, conversation.id, None, None).await.unwrap();
    assert_eq!(page.messages.len(), 1);

    let outcome = services.poll.poll(caller_b, Some(since), None).await.unwrap();
    let summary = outcome.conversations.iter().find(|s| s.conversation.id == conversation.id).unwrap();
    assert_eq!(summary.unread_count, 0);
}

#[tokio::test]
async fn detail_poll_marks_returned_messages_read_for_participants_only() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("ENCORE_TEST_DATABASE_URL not set; skipping");
        return;
    };
    let services = services(&pool);
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let caller_a = Caller { user_id: a, role: Role::Participant };
    let caller_b = Caller { user_id: b, role: Role::Participant };
    let admin = Caller { user_id: Uuid::new_v4(), role: Role::Admin };

    let conversation =
        services.conversations.open(caller_a, b, None, None, Some("Soundcheck at 5".into())).await.unwrap();
    let since = conversation.created_at - time::Duration::seconds(1);

    // An admin detail poll sees the message but never mutates read state.
    let outcome = services.poll.poll(admin, Some(since), Some(conversation.id)).await.unwrap();
    assert_eq!(outcome.messages.len(), 1);

    let overview = services.poll.poll(caller_b, Some(since), None).await.unwrap();
    assert_eq!(overview.conversations[0].unread_count, 1);

    // A participant detail poll marks the returned messages read.
    let outcome = services.poll.poll(caller_b, Some(since), Some(conversation.id)).await.unwrap();
    assert_eq!(outcome.messages.len(), 1);

    let overview = services.poll.poll(caller_b, Some(since), None).await.unwrap();
    assert_eq!(overview.conversations[0].unread_count, 0);
}
