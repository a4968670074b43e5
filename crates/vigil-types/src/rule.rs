//! Deterministic classification rule table entries.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::event::{RiskLevel, SecurityEventType};

/// A single `{channel, event_id} -> classification template` rule.
///
/// Rules are ordered by `priority DESC, event_id ASC`; only `enabled` rules
/// participate in matching. `(channel, event_id, priority)` must be unique
/// across the enabled rule set — a conflicting insert is rejected with
/// `RuleConflict` by the rule store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityEventRule {
    /// Numeric event identifier this rule matches.
    pub event_id: i64,
    /// Channel this rule matches.
    pub channel: String,
    /// Classification to assign on match.
    pub event_type: SecurityEventType,
    /// Base risk level, before contextual adjustment.
    pub base_risk: RiskLevel,
    /// Base confidence, in `[0, 100]`, before contextual adjustment.
    pub base_confidence: u8,
    /// Template used to render `SecurityEvent::summary`.
    pub summary_template: String,
    /// MITRE ATT&CK techniques associated with this rule.
    pub mitre_techniques: BTreeSet<String>,
    /// Recommended actions to pre-populate on match.
    pub recommended_actions: Vec<String>,
    /// Match priority; higher wins ties, evaluated before `event_id ASC`.
    pub priority: i32,
    /// Whether this rule currently participates in matching.
    pub enabled: bool,
}

impl SecurityEventRule {
    /// Ordering key used by the rule store: `(priority DESC, event_id ASC)`.
    pub fn ordering_key(&self) -> (std::cmp::Reverse<i32>, i64) {
        (std::cmp::Reverse(self.priority), self.event_id)
    }

    /// Whether `other` would conflict with this rule under the uniqueness
    /// constraint on `(channel, event_id, priority)`.
    pub fn conflicts_with(&self, other: &SecurityEventRule) -> bool {
        self.channel == other.channel
            && self.event_id == other.event_id
            && self.priority == other.priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(event_id: i64, priority: i32) -> SecurityEventRule {
        SecurityEventRule {
            event_id,
            channel: "Security".into(),
            event_type: SecurityEventType::AuthenticationSuccess,
            base_risk: RiskLevel::Medium,
            base_confidence: 85,
            summary_template: "logon".into(),
            mitre_techniques: BTreeSet::from(["T1078".to_string()]),
            recommended_actions: vec![],
            priority,
            enabled: true,
        }
    }

    #[test]
    fn ordering_prefers_higher_priority() {
        let mut rules = vec![rule(1, 1), rule(2, 5), rule(3, 3)];
        rules.sort_by_key(|r| r.ordering_key());
        assert_eq!(rules[0].event_id, 2);
        assert_eq!(rules[1].event_id, 3);
        assert_eq!(rules[2].event_id, 1);
    }

    #[test]
    fn ordering_tie_breaks_by_event_id_asc() {
        let mut rules = vec![rule(5, 1), rule(1, 1)];
        rules.sort_by_key(|r| r.ordering_key());
        assert_eq!(rules[0].event_id, 1);
    }

    #[test]
    fn conflict_detection() {
        let a = rule(4624, 10);
        let mut b = rule(4624, 10);
        assert!(a.conflicts_with(&b));
        b.priority = 11;
        assert!(!a.conflicts_with(&b));
    }
}
