//! Sliding-window indices the detectors read from.
//!
//! Three independently-scoped views over the same stream of
//! [`EventProjection`]s, mirroring the differing scopes each detector needs:
//! per-host (BruteForce, AttackChain), per-user (LateralMovement), and global
//! per-type (TemporalBurst). Grounded on `security/toka-rate-limiter`'s
//! per-key sliding-window bookkeeping, generalized from counters to ring
//! buffers of projections.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use vigil_types::SecurityEventType;

use crate::types::EventProjection;

fn trim(buffer: &mut VecDeque<EventProjection>, now: DateTime<Utc>, window: Duration, cap: usize) {
    while let Some(front) = buffer.front() {
        if now - front.time > window {
            buffer.pop_front();
        } else {
            break;
        }
    }
    while buffer.len() > cap {
        buffer.pop_front();
    }
}

/// Sliding indices feeding the correlation detectors.
pub struct CorrelationIndex {
    per_host: DashMap<String, VecDeque<EventProjection>>,
    per_user: DashMap<String, VecDeque<EventProjection>>,
    global_by_type: DashMap<SecurityEventType, VecDeque<EventProjection>>,
    max_window: Duration,
    max_per_bucket: usize,
}

impl CorrelationIndex {
    /// Construct an index retaining at most `max_window` of history and at
    /// most `max_per_bucket` projections per bucket.
    pub fn new(max_window: Duration, max_per_bucket: usize) -> Self {
        Self {
            per_host: DashMap::new(),
            per_user: DashMap::new(),
            global_by_type: DashMap::new(),
            max_window,
            max_per_bucket,
        }
    }

    /// Record `projection`, trimming each bucket it lands in.
    pub fn record(&self, projection: EventProjection) {
        let now = projection.time;

        let mut host_buf = self.per_host.entry(projection.host.clone()).or_default();
        host_buf.push_back(projection.clone());
        trim(&mut host_buf, now, self.max_window, self.max_per_bucket);
        drop(host_buf);

        let mut user_buf = self.per_user.entry(projection.user.clone()).or_default();
        user_buf.push_back(projection.clone());
        trim(&mut user_buf, now, self.max_window, self.max_per_bucket);
        drop(user_buf);

        let mut type_buf = self.global_by_type.entry(projection.event_type).or_default();
        type_buf.push_back(projection);
        trim(&mut type_buf, now, self.max_window, self.max_per_bucket);
    }

    /// Projections for `host` within `window` of `now`, oldest first.
    pub fn host_window(&self, host: &str, now: DateTime<Utc>, window: Duration) -> Vec<EventProjection> {
        self.per_host
            .get(host)
            .map(|buf| buf.iter().filter(|p| now - p.time <= window).cloned().collect())
            .unwrap_or_default()
    }

    /// Projections for `user` within `window` of `now`, oldest first.
    pub fn user_window(&self, user: &str, now: DateTime<Utc>, window: Duration) -> Vec<EventProjection> {
        self.per_user
            .get(user)
            .map(|buf| buf.iter().filter(|p| now - p.time <= window).cloned().collect())
            .unwrap_or_default()
    }

    /// Projections of `event_type` within `window` of `now`, across all
    /// hosts/users, oldest first.
    pub fn type_window(
        &self,
        event_type: SecurityEventType,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Vec<EventProjection> {
        self.global_by_type
            .get(&event_type)
            .map(|buf| buf.iter().filter(|p| now - p.time <= window).cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn projection(host: &str, user: &str, event_type: SecurityEventType, seconds: i64) -> EventProjection {
        EventProjection {
            id: Uuid::new_v4(),
            host: host.into(),
            user: user.into(),
            event_type,
            time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(seconds),
        }
    }

    #[test]
    fn host_window_excludes_entries_outside_range() {
        let index = CorrelationIndex::new(Duration::minutes(30), 500);
        index.record(projection("H", "alice", SecurityEventType::AuthenticationFailure, 0));
        index.record(projection("H", "alice", SecurityEventType::AuthenticationFailure, 700));
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(700);
        let window = index.host_window("H", now, Duration::minutes(10));
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn buckets_are_independent_per_key() {
        let index = CorrelationIndex::new(Duration::minutes(30), 500);
        index.record(projection("H1", "alice", SecurityEventType::NetworkConnection, 0));
        index.record(projection("H2", "alice", SecurityEventType::NetworkConnection, 1));
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap();
        assert_eq!(index.host_window("H1", now, Duration::minutes(30)).len(), 1);
        assert_eq!(index.user_window("alice", now, Duration::minutes(30)).len(), 2);
    }

    #[test]
    fn max_per_bucket_caps_retained_entries() {
        let index = CorrelationIndex::new(Duration::minutes(30), 2);
        for i in 0..5 {
            index.record(projection("H", "alice", SecurityEventType::ProcessCreation, i));
        }
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 4).unwrap();
        assert_eq!(index.host_window("H", now, Duration::minutes(30)).len(), 2);
    }
}
