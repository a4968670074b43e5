//! Supporting types for the ignore-pattern engine.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;
use vigil_types::{IgnorePattern, SecurityEventType};

/// A lightweight per-host ring-buffer entry derived from a classified event.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRecord {
    /// Id of the originating [`vigil_types::SecurityEvent`].
    pub event_id: Uuid,
    /// Classification.
    pub event_type: SecurityEventType,
    /// MITRE techniques associated with the event.
    pub mitre: BTreeSet<String>,
    /// Host the event was observed on.
    pub host: String,
    /// Account name extracted from the rendered message, if present.
    pub account_name: Option<String>,
    /// Logon type extracted from the rendered message, if present.
    pub logon_type: Option<i32>,
    /// When the event occurred.
    pub time: DateTime<Utc>,
}

/// Configuration for [`crate::engine::IgnoreEngine`].
#[derive(Debug, Clone)]
pub struct IgnoreEngineConfig {
    /// Global kill switch; when false every event is kept.
    pub enabled: bool,
    /// When true, every event from a host in `local_machines` is dropped
    /// unconditionally, bypassing sequence matching.
    pub filter_all_local_events: bool,
    /// Hosts considered "local" for `filter_all_local_events`.
    pub local_machines: HashSet<String>,
    /// Per-host ring buffer bound.
    pub max_recent_events: usize,
    /// Sliding window, in seconds, a sequence must fit within.
    pub sequence_time_window_seconds: i64,
    /// Configured sequence patterns.
    pub patterns: Vec<IgnorePattern>,
}

impl Default for IgnoreEngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter_all_local_events: false,
            local_machines: HashSet::new(),
            max_recent_events: 200,
            sequence_time_window_seconds: 300,
            patterns: Vec::new(),
        }
    }
}

/// Outcome of running an event through the ignore-pattern engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IgnoreDecision {
    /// Whether the triggering event itself should be suppressed.
    pub suppress: bool,
    /// Reasons recorded by every pattern that matched (OR-across-patterns:
    /// any single match suppresses the event).
    pub reasons: Vec<String>,
    /// Prior buffered events retroactively marked ignored for reporting,
    /// when a matched pattern has `ignore_all_in_sequence = true`. These
    /// events were already emitted and are not retracted.
    pub also_marked_ignored: Vec<Uuid>,
}
