//! Pure detector functions implementing the correlation trigger/confidence
//! table. None of these touch storage or the clock beyond the `now` they are
//! given; the engine wires them to the sliding indices.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use vigil_types::{Correlation, CorrelationType, RiskLevel, SecurityEventType};

use crate::types::EventProjection;

fn new_correlation(
    r#type: CorrelationType,
    confidence: f64,
    pattern: String,
    event_ids: BTreeSet<Uuid>,
    time_window: Duration,
    risk_level: RiskLevel,
    mitre_techniques: BTreeSet<String>,
    recommended_actions: Vec<String>,
    attack_chain_stage: Option<usize>,
    now: DateTime<Utc>,
) -> Correlation {
    Correlation {
        id: Uuid::new_v4(),
        r#type,
        confidence: confidence.clamp(0.0, 1.0),
        pattern,
        event_ids,
        time_window,
        risk_level,
        mitre_techniques,
        recommended_actions,
        attack_chain_stage,
        detected_at: now,
    }
}

/// `≥5 AuthenticationFailure` on `host` within 10 minutes, followed by an
/// `AuthenticationSuccess` for the same host/user. `host_window` must
/// already include `current`.
pub fn detect_brute_force(
    host_window: &[EventProjection],
    current: &EventProjection,
    current_type: SecurityEventType,
    now: DateTime<Utc>,
) -> Option<Correlation> {
    if current_type != SecurityEventType::AuthenticationSuccess {
        return None;
    }
    let window = Duration::minutes(10);
    let failures: Vec<&EventProjection> = host_window
        .iter()
        .filter(|p| {
            p.event_type == SecurityEventType::AuthenticationFailure
                && p.user == current.user
                && current.time - p.time <= window
                && p.time <= current.time
        })
        .collect();
    if failures.len() < 5 {
        return None;
    }
    let confidence = (0.7 + 0.05 * (failures.len() as f64 - 5.0)).min(0.95);
    let mut event_ids: BTreeSet<Uuid> = failures.iter().map(|p| p.id).collect();
    event_ids.insert(current.id);
    Some(new_correlation(
        CorrelationType::BruteForce,
        confidence,
        format!("{} authentication failures then success on {}", failures.len(), current.host),
        event_ids,
        window,
        RiskLevel::High,
        BTreeSet::from(["T1110".to_string()]),
        vec!["Investigate burst pattern for automation".to_string()],
        None,
        now,
    ))
}

/// `≥6` events of `current`'s type within 2 minutes, across all hosts/users.
pub fn detect_temporal_burst(
    type_window: &[EventProjection],
    current: &EventProjection,
    base_risk: RiskLevel,
    now: DateTime<Utc>,
) -> Option<Correlation> {
    let window = Duration::minutes(2);
    let recent: Vec<&EventProjection> = type_window
        .iter()
        .filter(|p| current.time - p.time <= window && p.time <= current.time)
        .collect();
    if recent.len() < 6 {
        return None;
    }
    let confidence = 0.8 + ((recent.len() as f64 - 6.0) * 0.02).min(0.15);
    let event_ids: BTreeSet<Uuid> = recent.iter().map(|p| p.id).collect();
    Some(new_correlation(
        CorrelationType::TemporalBurst,
        confidence,
        format!("{} events of type {:?} within 2 minutes", recent.len(), current.event_type),
        event_ids,
        window,
        base_risk,
        BTreeSet::new(),
        vec!["Investigate burst pattern for automation".to_string()],
        None,
        now,
    ))
}

/// `≥3 NetworkConnection` events from the same user across `≥3` distinct
/// hosts within 30 minutes.
pub fn detect_lateral_movement(
    user_window: &[EventProjection],
    current: &EventProjection,
    current_type: SecurityEventType,
    now: DateTime<Utc>,
) -> Option<Correlation> {
    if current_type != SecurityEventType::NetworkConnection {
        return None;
    }
    let window = Duration::minutes(30);
    let recent: Vec<&EventProjection> = user_window
        .iter()
        .filter(|p| {
            p.event_type == SecurityEventType::NetworkConnection
                && current.time - p.time <= window
                && p.time <= current.time
        })
        .collect();
    let hosts: HashSet<&str> = recent.iter().map(|p| p.host.as_str()).collect();
    if recent.len() < 3 || hosts.len() < 3 {
        return None;
    }
    let confidence = (0.75 + 0.05 * (hosts.len() as f64 - 3.0)).min(0.9);
    let event_ids: BTreeSet<Uuid> = recent.iter().map(|p| p.id).collect();
    Some(new_correlation(
        CorrelationType::LateralMovement,
        confidence,
        format!("network connections from {} across {} hosts", current.user, hosts.len()),
        event_ids,
        window,
        RiskLevel::High,
        BTreeSet::from(["T1021".to_string()]),
        vec!["Investigate lateral movement across systems".to_string()],
        None,
        now,
    ))
}

/// Ordered `AuthenticationSuccess → PrivilegeEscalation → {NetworkConnection
/// | ProcessCreation}` within 30 minutes on the same host.
pub fn detect_attack_chain(
    host_window: &[EventProjection],
    current: &EventProjection,
    current_type: SecurityEventType,
    now: DateTime<Utc>,
) -> Option<Correlation> {
    if !matches!(
        current_type,
        SecurityEventType::NetworkConnection | SecurityEventType::ProcessCreation
    ) {
        return None;
    }
    let window = Duration::minutes(30);
    let in_window: Vec<&EventProjection> = host_window
        .iter()
        .filter(|p| current.time - p.time <= window && p.time <= current.time)
        .collect();

    let escalation = in_window
        .iter()
        .filter(|p| p.event_type == SecurityEventType::PrivilegeEscalation)
        .max_by_key(|p| p.time)?;

    let success = in_window
        .iter()
        .filter(|p| p.event_type == SecurityEventType::AuthenticationSuccess && p.time <= escalation.time)
        .max_by_key(|p| p.time)?;

    let event_ids: BTreeSet<Uuid> = [success.id, escalation.id, current.id].into_iter().collect();
    Some(new_correlation(
        CorrelationType::AttackChain,
        0.8,
        format!("authentication -> privilege escalation -> {:?} on {}", current_type, current.host),
        event_ids,
        window,
        RiskLevel::High,
        BTreeSet::from(["T1078".to_string(), "T1068".to_string()]),
        vec!["Investigate entire attack sequence".to_string()],
        Some(3),
        now,
    ))
}
