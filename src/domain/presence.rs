use time::OffsetDateTime;

/// Derived online state for one user at the moment of the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceStatus {
    pub is_online: bool,
    pub last_seen_at: Option<OffsetDateTime>,
}

impl PresenceStatus {
    #[must_use]
    pub const fn offline() -> Self {
        Self { is_online: false, last_seen_at: None }
    }
}
