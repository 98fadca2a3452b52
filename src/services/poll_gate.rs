use dashmap::DashMap;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    decisions_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("encore-messaging");
        Self {
            decisions_total: meter
                .u64_counter("encore_poll_gate_decisions_total")
                .with_description("Poll gate decisions (allowed/throttled)")
                .build(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Denied { retry_after_ms: u64 },
}

/// Per-user minimum-interval gate in front of the polling endpoint.
///
/// A purged entry is indistinguishable from a user who never polled, so the
/// sweeper only bounds memory and never affects gate decisions.
#[derive(Clone, Debug)]
pub struct PollGate {
    last_poll: Arc<DashMap<Uuid, Instant>>,
    window: Duration,
    idle_ttl: Duration,
    metrics: Metrics,
}

impl PollGate {
    #[must_use]
    pub fn new(window: Duration, idle_ttl: Duration) -> Self {
        Self { last_poll: Arc::new(DashMap::new()), window, idle_ttl, metrics: Metrics::new() }
    }

    /// Atomically checks the window and records the poll time on success.
    ///
    /// The dashmap entry lock makes check-then-set one operation, so two
    /// near-simultaneous requests from the same user cannot both pass.
    pub fn check_and_record(&self, user_id: Uuid, now: Instant) -> GateDecision {
        let mut decision = GateDecision::Allowed;

        self.last_poll
            .entry(user_id)
            .and_modify(|last| {
                let elapsed = now.duration_since(*last);
                if elapsed < self.window {
                    let remaining = self.window - elapsed;
                    decision = GateDecision::Denied { retry_after_ms: remaining.as_millis() as u64 };
                } else {
                    *last = now;
                }
            })
            .or_insert(now);

        let label = match decision {
            GateDecision::Allowed => "allowed",
            GateDecision::Denied { .. } => "throttled",
        };
        self.metrics.decisions_total.add(1, &[KeyValue::new("status", label)]);

        decision
    }

    /// Purges entries idle longer than the TTL to bound memory.
    pub fn sweep(&self, now: Instant) {
        let before = self.last_poll.len();
        self.last_poll.retain(|_, last| now.duration_since(*last) < self.idle_ttl);
        let purged = before.saturating_sub(self.last_poll.len());
        if purged > 0 {
            tracing::debug!(purged, "Poll gate sweep purged idle entries");
        }
    }

    /// Spawns the periodic sweeper, stopping on shutdown signal.
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let gate = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => gate.sweep(Instant::now()),
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Poll gate sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> PollGate {
        PollGate::new(Duration::from_millis(10_000), Duration::from_millis(60_000))
    }

    #[test]
    fn second_poll_within_window_is_denied_with_remaining_wait() {
        let gate = gate();
        let user = Uuid::new_v4();
        let t0 = Instant::now();

        assert_eq!(gate.check_and_record(user, t0), GateDecision::Allowed);

        match gate.check_and_record(user, t0 + Duration::from_millis(3000)) {
            GateDecision::Denied { retry_after_ms } => assert_eq!(retry_after_ms, 7000),
            GateDecision::Allowed => panic!("expected denial inside the window"),
        }
    }

    #[test]
    fn polls_outside_window_both_succeed() {
        let gate = gate();
        let user = Uuid::new_v4();
        let t0 = Instant::now();

        assert_eq!(gate.check_and_record(user, t0), GateDecision::Allowed);
        assert_eq!(gate.check_and_record(user, t0 + Duration::from_millis(11_000)), GateDecision::Allowed);
    }

    #[test]
    fn denial_does_not_reset_the_window() {
        let gate = gate();
        let user = Uuid::new_v4();
        let t0 = Instant::now();

        assert_eq!(gate.check_and_record(user, t0), GateDecision::Allowed);
        let _ = gate.check_and_record(user, t0 + Duration::from_millis(9000));
        // The denied attempt must not have recorded a new poll time.
        assert_eq!(gate.check_and_record(user, t0 + Duration::from_millis(10_500)), GateDecision::Allowed);
    }

    #[test]
    fn users_are_isolated() {
        let gate = gate();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let t0 = Instant::now();

        assert_eq!(gate.check_and_record(a, t0), GateDecision::Allowed);
        assert_eq!(gate.check_and_record(b, t0 + Duration::from_millis(1)), GateDecision::Allowed);
    }

    #[test]
    fn purged_user_is_treated_as_never_having_polled() {
        let gate = gate();
        let user = Uuid::new_v4();
        let t0 = Instant::now();

        assert_eq!(gate.check_and_record(user, t0), GateDecision::Allowed);
        gate.sweep(t0 + Duration::from_millis(61_000));
        assert_eq!(gate.check_and_record(user, t0 + Duration::from_millis(61_001)), GateDecision::Allowed);
    }

    #[test]
    fn sweep_keeps_recent_entries() {
        let gate = gate();
        let user = Uuid::new_v4();
        let t0 = Instant::now();

        assert_eq!(gate.check_and_record(user, t0), GateDecision::Allowed);
        gate.sweep(t0 + Duration::from_millis(30_000));
        // Entry survived the sweep, so the window still applies.
        assert!(matches!(
            gate.check_and_record(user, t0 + Duration::from_millis(31_000)),
            GateDecision::Denied { .. }
        ));
    }
}
