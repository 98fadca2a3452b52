use encore_messaging::domain::conversation::normalize_participants;
use encore_messaging::domain::message::MessageType;
use encore_messaging::storage::conversation_repo::ConversationRepository;
use encore_messaging::storage::message_repo::MessageRepository;
use sqlx::PgPool;
use uuid::Uuid;

mod common;

struct Store {
    conversations: ConversationRepository,
    messages: MessageRepository,
}

fn store(pool: &PgPool) -> Store {
    Store {
        conversations: ConversationRepository::new(pool.clone()),
        messages: MessageRepository::new(pool.clone()),
    }
}

async fn fresh_conversation(store: &Store, a: Uuid, b: Uuid) -> Uuid {
    let participants = normalize_participants(vec![a, b]).unwrap();
    store.conversations.create(&participants, None, None).await.unwrap().id
}

#[tokio::test]
async fn append_seeds_read_by_with_the_sender() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("ENCORE_TEST_DATABASE_URL not set; skipping");
        return;
    };
    let store = store(&pool);
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation_id = fresh_conversation(&store, a, b).await;

    let message = store.messages.append(conversation_id, a, "Hello", MessageType::Text, None).await.unwrap();

    assert!(message.is_read_by(a));
    assert!(!message.is_read_by(b));
}

#[tokio::test]
async fn mark_read_is_idempotent() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("ENCORE_TEST_DATABASE_URL not set; skipping");
        return;
    };
    let store = store(&pool);
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation_id = fresh_conversation(&store, a, b).await;

    let m1 = store.messages.append(conversation_id, a, "one", MessageType::Text, None).await.unwrap();
    let m2 = store.messages.append(conversation_id, a, "two", MessageType::Text, None).await.unwrap();

    let first = store.messages.mark_read(&[m1.id, m2.id], b).await.unwrap();
    assert_eq!(first, 2);

    let repeat = store.messages.mark_read(&[m1.id, m2.id], b).await.unwrap();
    assert_eq!(repeat, 0, "a repeat call must be a no-op");

    // No duplicate entries either.
    let messages = store.messages.list_since(conversation_id, m1.created_at).await.unwrap();
    for message in messages {
        assert_eq!(message.read_by.iter().filter(|&&u| u == b).count(), 1);
    }
}

#[tokio::test]
async fn unread_counts_diverge_for_participants_and_admins() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("ENCORE_TEST_DATABASE_URL not set; skipping");
        return;
    };
    let store = store(&pool);
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation_id = fresh_conversation(&store, a, b).await;

    let mut ids = Vec::new();
    for n in 0..5 {
        let message =
            store.messages.append(conversation_id, a, &format!("message {n}"), MessageType::Text, None).await.unwrap();
        ids.push(message.id);
    }
    store.messages.mark_read(&ids[..3], b).await.unwrap();

    assert_eq!(store.messages.count_unread(conversation_id, b).await.unwrap(), 2);
    assert_eq!(store.messages.count_all(conversation_id).await.unwrap(), 5);
}

#[tokio::test]
async fn watermark_advances_to_the_max_created_at_under_concurrent_appends() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("ENCORE_TEST_DATABASE_URL not set; skipping");
        return;
    };
    let store = store(&pool);
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation_id = fresh_conversation(&store, a, b).await;

    let (r1, r2, r3, r4) = tokio::join!(
        store.messages.append(conversation_id, a, "m1", MessageType::Text, None),
        store.messages.append(conversation_id, b, "m2", MessageType::Text, None),
        store.messages.append(conversation_id, a, "m3", MessageType::Text, None),
        store.messages.append(conversation_id, b, "m4", MessageType::Text, None),
    );
    let created = [r1.unwrap(), r2.unwrap(), r3.unwrap(), r4.unwrap()];
    let max_created_at = created.iter().map(|m| m.created_at).max().unwrap();

    let refreshed = store.conversations.find_by_id(conversation_id).await.unwrap().unwrap();
    assert_eq!(refreshed.last_message_at, max_created_at, "watermark must equal the newest message");
}
