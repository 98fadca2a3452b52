use crate::domain::presence::PresenceStatus;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Ephemeral online state keyed by user, refreshed by heartbeats.
///
/// Process-local by design; a restart resets everyone to offline. Stale
/// entries are evicted lazily while answering status queries.
#[derive(Clone, Debug)]
pub struct PresenceTracker {
    seen: Arc<DashMap<Uuid, OffsetDateTime>>,
    online_cutoff: Duration,
}

impl PresenceTracker {
    #[must_use]
    pub fn new(online_cutoff_ms: u64) -> Self {
        Self {
            seen: Arc::new(DashMap::new()),
            online_cutoff: Duration::milliseconds(i64::try_from(online_cutoff_ms).unwrap_or(i64::MAX)),
        }
    }

    pub fn set_online(&self, user_id: Uuid) {
        self.set_online_at(user_id, OffsetDateTime::now_utc());
    }

    pub fn set_offline(&self, user_id: Uuid) {
        self.seen.remove(&user_id);
    }

    /// A heartbeat is just a presence refresh.
    pub fn heartbeat(&self, user_id: Uuid) {
        self.set_online(user_id);
    }

    #[must_use]
    pub fn status(&self, user_ids: &[Uuid]) -> HashMap<Uuid, PresenceStatus> {
        self.status_at(user_ids, OffsetDateTime::now_utc())
    }

    pub(crate) fn set_online_at(&self, user_id: Uuid, now: OffsetDateTime) {
        self.seen.insert(user_id, now);
    }

    pub(crate) fn status_at(&self, user_ids: &[Uuid], now: OffsetDateTime) -> HashMap<Uuid, PresenceStatus> {
        let mut statuses = HashMap::with_capacity(user_ids.len());

        for &user_id in user_ids {
            // Copy out before any removal; holding a shard ref across remove would deadlock.
            let last_seen = self.seen.get(&user_id).map(|entry| *entry.value());

            let status = match last_seen {
                Some(at) if now - at <= self.online_cutoff => {
                    PresenceStatus { is_online: true, last_seen_at: Some(at) }
                }
                Some(_) => {
                    self.seen.remove(&user_id);
                    PresenceStatus::offline()
                }
                None => PresenceStatus::offline(),
            };

            statuses.insert(user_id, status);
        }

        statuses
    }
}
