//! Supporting types for the correlation engine.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use vigil_types::{Correlation, CorrelationType, SecurityEvent, SecurityEventType};

/// A lightweight, bounded-lifetime projection of a [`vigil_types::SecurityEvent`]
/// held in the engine's sliding windows. The engine never owns full events —
/// only ids plus the handful of fields its detectors need, per the spec's
/// "cache holds ids plus a bounded cache of recent light-weight projections"
/// ownership note.
#[derive(Debug, Clone, PartialEq)]
pub struct EventProjection {
    /// Id of the originating security event.
    pub id: Uuid,
    /// Host the event was observed on.
    pub host: String,
    /// User associated with the event.
    pub user: String,
    /// Classification.
    pub event_type: SecurityEventType,
    /// When the event occurred.
    pub time: DateTime<Utc>,
}

impl EventProjection {
    /// Project the fields the detectors need out of a full security event.
    pub fn from_event(event: &SecurityEvent) -> Self {
        Self {
            id: event.id,
            host: event.original.host.clone(),
            user: event.original.user.clone(),
            event_type: event.event_type,
            time: event.original.time,
        }
    }
}

/// Tunables for [`crate::engine::CorrelationEngine`].
#[derive(Debug, Clone)]
pub struct CorrelationEngineConfig {
    /// Longest window any detector looks back over (bounds index retention).
    pub max_window: Duration,
    /// Cap on projections retained per host/user/type bucket.
    pub max_per_bucket: usize,
    /// Window within which two correlations with the same `dedup_key` are
    /// treated as the same correlation and not re-emitted.
    pub dedup_window: Duration,
    /// Minimum confirmed-sample count `train_models` requires to do
    /// anything beyond logging a warning.
    pub min_training_samples: usize,
}

impl Default for CorrelationEngineConfig {
    fn default() -> Self {
        Self {
            max_window: Duration::minutes(30),
            max_per_bucket: 2_000,
            dedup_window: Duration::minutes(30),
            min_training_samples: 20,
        }
    }
}

/// Result of a single synchronous [`crate::engine::CorrelationEngine::analyze`]
/// call.
#[derive(Debug, Clone, Default)]
pub struct AnalysisResult {
    /// Whether any correlation touched the triggering event.
    pub has_correlation: bool,
    /// Confidence of the correlation selected for enrichment, if any.
    pub confidence: Option<f64>,
    /// The correlation selected for enrichment (highest `(risk, confidence)`
    /// among all that matched), if any.
    pub correlation: Option<Correlation>,
    /// Human-readable explanation, always populated even when nothing
    /// matched (`"no correlation"`).
    pub explanation: String,
}

/// Outcome of a [`crate::engine::CorrelationEngine::train_models`] call.
///
/// Training is always a no-op per the spec's non-goals; `accepted` only
/// records whether the sample count met the configured minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingOutcome {
    /// Whether the sample count met the configured minimum.
    pub accepted: bool,
}

/// Running totals surfaced by [`crate::engine::CorrelationEngine::get_statistics`].
#[derive(Debug, Clone, Default)]
pub struct CorrelationStatistics {
    /// Total correlations emitted since the engine started.
    pub total_emitted: u64,
    /// Correlations emitted per type.
    pub by_type: HashMap<CorrelationType, u64>,
}

/// Errors raised by the correlation engine.
#[derive(Debug, thiserror::Error)]
pub enum CorrelationError {
    /// The backing correlation store was unavailable.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    /// `update_rule` referenced an unknown rule id.
    #[error("unknown correlation rule: {0}")]
    UnknownRule(Uuid),
}

impl From<vigil_store_core::StoreError> for CorrelationError {
    fn from(e: vigil_store_core::StoreError) -> Self {
        CorrelationError::StorageUnavailable(e.to_string())
    }
}
