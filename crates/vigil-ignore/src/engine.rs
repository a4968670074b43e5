//! The ignore-pattern engine itself (component F).

use std::collections::VecDeque;

use chrono::Duration;
use dashmap::DashMap;
use uuid::Uuid;
use vigil_types::{IgnorePattern, SecurityEvent, StepMatcher};

use crate::extract;
use crate::types::{ClassifiedRecord, IgnoreDecision, IgnoreEngineConfig};

fn step_matches(step: &StepMatcher, record: &ClassifiedRecord) -> bool {
    if let Some(ref types) = step.event_type {
        if !types.contains(&record.event_type) {
            return false;
        }
    }
    if let Some(ref mitre) = step.mitre {
        if !mitre.iter().any(|t| record.mitre.contains(t)) {
            return false;
        }
    }
    if let Some(ref hosts) = step.source_machines {
        if !hosts.contains(&record.host) {
            return false;
        }
    }
    if let Some(ref names) = step.account_names {
        match &record.account_name {
            Some(name) if names.contains(name) => {}
            _ => return false,
        }
    }
    if let Some(ref types) = step.logon_types {
        match record.logon_type {
            Some(lt) if types.contains(&lt) => {}
            _ => return false,
        }
    }
    true
}

/// Attempt to match `pattern` ending at `current`, scanning `buffer` from
/// newest to oldest for the earlier steps. Returns the ids of the matched
/// prior events (chronological order) on success.
fn match_sequence(
    pattern: &IgnorePattern,
    current: &ClassifiedRecord,
    buffer: &VecDeque<ClassifiedRecord>,
    window: Duration,
) -> Option<Vec<Uuid>> {
    let (last_step, earlier_steps) = pattern.sequence.split_last()?;
    if !step_matches(last_step, current) {
        return None;
    }
    if earlier_steps.is_empty() {
        return Some(Vec::new());
    }

    let mut matched_ids = Vec::with_capacity(earlier_steps.len());
    let mut buf_iter = buffer.iter().rev();

    for step in earlier_steps.iter().rev() {
        loop {
            let record = buf_iter.next()?;
            if record.time >= current.time || current.time - record.time > window {
                return None;
            }
            if step_matches(step, record) {
                matched_ids.push(record.event_id);
                break;
            }
        }
    }

    matched_ids.reverse();
    Some(matched_ids)
}

/// Per-host sequence suppression over a sliding window of recently
/// classified events.
///
/// One ring buffer per host, sharded by `DashMap` so each host is owned by a
/// single logical writer — the concurrency model `toka-rate-limiter` uses
/// for its per-key sliding windows, generalized from counters to buffers.
pub struct IgnoreEngine {
    config: IgnoreEngineConfig,
    buffers: DashMap<String, VecDeque<ClassifiedRecord>>,
}

impl IgnoreEngine {
    /// Construct an engine with the given configuration.
    pub fn new(config: IgnoreEngineConfig) -> Self {
        Self {
            config,
            buffers: DashMap::new(),
        }
    }

    /// Evaluate `event` against the ignore configuration, updating this
    /// host's buffer as a side effect.
    pub fn process(&self, event: &SecurityEvent) -> IgnoreDecision {
        if !self.config.enabled {
            return IgnoreDecision::default();
        }

        let host = event.original.host.clone();

        if self.config.filter_all_local_events && self.config.local_machines.contains(&host) {
            return IgnoreDecision {
                suppress: true,
                reasons: vec!["event host is a local machine".to_string()],
                also_marked_ignored: Vec::new(),
            };
        }

        let current = ClassifiedRecord {
            event_id: event.id,
            event_type: event.event_type,
            mitre: event.mitre_techniques.clone(),
            host: host.clone(),
            account_name: extract::account_name(&event.original.message),
            logon_type: extract::logon_type(&event.original.message),
            time: event.original.time,
        };

        let window = Duration::seconds(self.config.sequence_time_window_seconds);
        let mut decision = IgnoreDecision::default();

        {
            let buffer = self.buffers.entry(host.clone()).or_default();
            for pattern in &self.config.patterns {
                if let Some(matched_ids) = match_sequence(pattern, &current, &buffer, window) {
                    decision.suppress = true;
                    decision.reasons.push(pattern.reason.clone());
                    if pattern.ignore_all_in_sequence {
                        decision.also_marked_ignored.extend(matched_ids);
                    }
                }
            }
        }

        let mut buffer = self.buffers.entry(host).or_default();
        buffer.push_back(current.clone());
        while buffer.len() > self.config.max_recent_events {
            buffer.pop_front();
        }
        while let Some(front) = buffer.front() {
            if current.time - front.time > window {
                buffer.pop_front();
            } else {
                break;
            }
        }

        decision
    }
}
