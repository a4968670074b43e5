//! Risk-upgrade policy applied when propagating a correlation onto the
//! triggering [`vigil_types::SecurityEvent`].
//!
//! This is deliberately separate from a [`Correlation`]'s own `risk_level`
//! field (the detector table in the correlation engine assigns that): the
//! upgrade a correlation causes on the *event* it enriches follows its own,
//! narrower table.

use vigil_types::{Correlation, CorrelationType, RiskLevel, SecurityEvent, SecurityEventType};

/// Risk level to upgrade the enriched event to, or `None` to leave it
/// unchanged (the event's own risk still applies via
/// [`SecurityEvent::enrich`]'s never-downgrade rule).
fn enrichment_risk(correlation: &Correlation, event: &SecurityEvent) -> Option<RiskLevel> {
    match correlation.r#type {
        CorrelationType::AttackChain => Some(RiskLevel::Critical),
        CorrelationType::LateralMovement => Some(RiskLevel::High),
        CorrelationType::TemporalBurst => None,
        CorrelationType::BruteForce => {
            matches!(
                event.event_type,
                SecurityEventType::AuthenticationSuccess | SecurityEventType::AuthenticationFailure
            )
            .then_some(RiskLevel::High)
        }
        CorrelationType::MLDetected => None,
    }
}

/// Type-specific suggestions appended (never replacing existing ones) when
/// enriching an event with `correlation_type`.
fn recommended_action_for(correlation_type: CorrelationType) -> &'static str {
    match correlation_type {
        CorrelationType::AttackChain => "Investigate entire attack sequence",
        CorrelationType::LateralMovement => "Investigate lateral movement across systems",
        CorrelationType::TemporalBurst => "Investigate burst pattern for automation",
        CorrelationType::MLDetected => "Review ML-detected anomaly pattern",
        CorrelationType::BruteForce => "Consider updating correlation rules",
    }
}

/// Apply `correlation`'s enrichment to `event`, honoring the upgrade policy,
/// the flat `+10` confidence boost, and the never-downgrade/never-exceed-100
/// invariants implemented by [`SecurityEvent::enrich`].
pub fn apply_enrichment(event: &mut SecurityEvent, correlation: &Correlation) {
    let risk = enrichment_risk(correlation, event).unwrap_or(event.risk_level);
    event.enrich(
        risk,
        10,
        [recommended_action_for(correlation.r#type).to_string()],
        correlation.id,
        correlation_explanation(correlation),
        correlation.confidence,
    );
}

fn correlation_explanation(correlation: &Correlation) -> String {
    format!("{:?}: {}", correlation.r#type, correlation.pattern)
}
