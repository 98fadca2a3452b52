use uuid::Uuid;

/// A user currently typing in a conversation, as surfaced to other participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typer {
    pub user_id: Uuid,
    pub user_name: String,
}
