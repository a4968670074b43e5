//! Correlation and correlation-rule types.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::RiskLevel;

/// Closed enumeration of correlation kinds the correlation engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationType {
    /// Ordered multi-stage attack sequence on a single host.
    AttackChain,
    /// Repeated authentication failures followed by success.
    BruteForce,
    /// Network connections from one user across multiple distinct hosts.
    LateralMovement,
    /// A burst of same-typed events in a short window.
    TemporalBurst,
    /// Correlation sourced from an advisory ML adapter.
    MLDetected,
}

/// An emitted correlation. Correlations are append-only and arena-style:
/// they reference events only by id, never the reverse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Correlation {
    /// Store-assigned unique identifier.
    pub id: Uuid,
    /// Kind of correlation.
    pub r#type: CorrelationType,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Human-readable description of the matched pattern.
    pub pattern: String,
    /// Ids of the security events that make up this correlation.
    pub event_ids: BTreeSet<Uuid>,
    /// Time window (duration) over which the correlation was evaluated.
    pub time_window: Duration,
    /// Risk level to propagate to enriched events.
    pub risk_level: RiskLevel,
    /// MITRE ATT&CK techniques implicated by this correlation.
    pub mitre_techniques: BTreeSet<String>,
    /// Recommended actions specific to this correlation type.
    pub recommended_actions: Vec<String>,
    /// For `AttackChain`, the stage index reached. `None` otherwise.
    pub attack_chain_stage: Option<usize>,
    /// When this correlation was detected.
    pub detected_at: DateTime<Utc>,
}

impl Correlation {
    /// Deduplication key: correlations are deduplicated within a window by
    /// `(type, event_ids)`.
    pub fn dedup_key(&self) -> (CorrelationType, BTreeSet<Uuid>) {
        (self.r#type, self.event_ids.clone())
    }

    /// Risk rank used for tie-breaking enrichment when multiple
    /// correlations match the same event: higher risk wins, then higher
    /// confidence.
    pub fn tie_break_key(&self) -> (RiskLevel, ordered_float::NotNan) {
        (self.risk_level, ordered_float::NotNan::new(self.confidence))
    }
}

/// Minimal ordered-float helper so correlation confidence can be compared
/// without pulling in a crate the teacher workspace doesn't otherwise use.
pub mod ordered_float {
    /// A wrapper guaranteeing the wrapped `f64` is never `NaN`, so it can
    /// implement a total order for tie-break comparisons.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct NotNan(f64);

    impl NotNan {
        /// Wrap `value`, clamping `NaN` to `0.0` (correlation confidence is
        /// always produced from arithmetic on finite inputs; this is a
        /// defensive fallback, never expected to trigger).
        pub fn new(value: f64) -> Self {
            if value.is_nan() {
                Self(0.0)
            } else {
                Self(value)
            }
        }

        /// The wrapped value.
        pub fn get(self) -> f64 {
            self.0
        }
    }

    impl Eq for NotNan {}

    impl PartialOrd for NotNan {
        fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }

    impl Ord for NotNan {
        fn cmp(&self, other: &Self) -> std::cmp::Ordering {
            self.0.partial_cmp(&other.0).expect("NotNan is never NaN")
        }
    }
}

/// A correlation rule: enables/disables and thresholds a correlation type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorrelationRule {
    /// Rule identifier.
    pub id: Uuid,
    /// Human-readable rule name, e.g. `"Brute Force Attack"`.
    pub name: String,
    /// Whether this rule currently participates in detection.
    pub enabled: bool,
    /// Minimum confidence a correlation of this rule's type must reach to
    /// be emitted.
    pub min_confidence: f64,
}

impl CorrelationRule {
    /// The engine's default rule set: Temporal Burst, Brute Force, Lateral
    /// Movement, Privilege Escalation (attack-chain stage).
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                id: Uuid::new_v4(),
                name: "Temporal Burst".into(),
                enabled: true,
                min_confidence: 0.5,
            },
            Self {
                id: Uuid::new_v4(),
                name: "Brute Force Attack".into(),
                enabled: true,
                min_confidence: 0.5,
            },
            Self {
                id: Uuid::new_v4(),
                name: "Lateral Movement".into(),
                enabled: true,
                min_confidence: 0.5,
            },
            Self {
                id: Uuid::new_v4(),
                name: "Privilege Escalation".into(),
                enabled: true,
                min_confidence: 0.5,
            },
        ]
    }
}
