//! Classified security event types and risk/confidence model.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::LogEvent;

/// Closed enumeration of security event classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    /// Successful authentication (e.g. Windows 4624).
    AuthenticationSuccess,
    /// Failed authentication attempt (e.g. Windows 4625).
    AuthenticationFailure,
    /// Privilege escalation (e.g. special logon, token manipulation).
    PrivilegeEscalation,
    /// Account creation, deletion or modification.
    AccountManagement,
    /// New process creation.
    ProcessCreation,
    /// Service installation.
    ServiceInstallation,
    /// Scheduled task creation or modification.
    ScheduledTask,
    /// Change to a security policy or audit configuration.
    SecurityPolicyChange,
    /// Outbound or inbound network connection.
    NetworkConnection,
    /// PowerShell script block or module execution.
    PowerShellExecution,
    /// System startup.
    SystemStartup,
    /// System shutdown.
    SystemShutdown,
    /// Activity that does not fit a more specific category but is notable.
    SuspiciousActivity,
    /// No rule matched; used only as a transient marker, never persisted.
    Unknown,
}

/// Risk level assigned to a [`SecurityEvent`].
///
/// Ordered so that correlation enrichment can compare levels with `>=`
/// without special-casing: `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Routine, expected activity.
    Low,
    /// Activity that warrants awareness but not immediate action.
    Medium,
    /// Activity that warrants investigation.
    High,
    /// Activity that warrants immediate response.
    Critical,
}

/// A classified security event: the core output of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityEvent {
    /// Store-assigned unique identifier.
    pub id: Uuid,
    /// The normalized log event this classification is derived from.
    pub original: LogEvent,
    /// Classification produced by the normalizer (or enrichment).
    pub event_type: SecurityEventType,
    /// Current risk level. Monotonic under correlation enrichment: it is
    /// never downgraded once set.
    pub risk_level: RiskLevel,
    /// Confidence in the classification, in `[0, 100]`.
    pub confidence: u8,
    /// Human-readable summary of the event.
    pub summary: String,
    /// MITRE ATT&CK technique identifiers associated with this event.
    pub mitre_techniques: BTreeSet<String>,
    /// Ordered list of recommended response actions.
    pub recommended_actions: Vec<String>,
    /// True iff produced by a rule-table match (never by statistical inference).
    pub is_deterministic: bool,
    /// True iff this event was produced purely from correlation (no rule match).
    pub is_correlation_based: bool,
    /// True iff enriched by the correlation engine after initial classification.
    pub is_enhanced: bool,
    /// Ids of correlations that touched this event, if any.
    pub correlation_ids: Option<BTreeSet<Uuid>>,
    /// Free-text explanation of the correlation enrichment, if any.
    pub correlation_context: Option<String>,
    /// Correlation confidence score in `[0.0, 1.0]`, if enriched.
    pub correlation_score: Option<f64>,
}

impl SecurityEvent {
    /// Construct a new deterministic (rule-based) security event.
    #[allow(clippy::too_many_arguments)]
    pub fn new_deterministic(
        original: LogEvent,
        event_type: SecurityEventType,
        risk_level: RiskLevel,
        confidence: u8,
        summary: String,
        mitre_techniques: BTreeSet<String>,
        recommended_actions: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            original,
            event_type,
            risk_level,
            confidence: confidence.min(100),
            summary,
            mitre_techniques,
            recommended_actions,
            is_deterministic: true,
            is_correlation_based: false,
            is_enhanced: false,
            correlation_ids: None,
            correlation_context: None,
            correlation_score: None,
        }
    }

    /// Apply correlation enrichment, honoring the "never downgrade risk,
    /// never exceed 100 confidence" invariants from the spec.
    pub fn enrich(
        &mut self,
        new_risk: RiskLevel,
        confidence_boost: u8,
        extra_actions: impl IntoIterator<Item = String>,
        correlation_id: Uuid,
        context: String,
        score: f64,
    ) {
        if new_risk > self.risk_level {
            self.risk_level = new_risk;
        }
        self.confidence = self.confidence.saturating_add(confidence_boost).min(100);
        for action in extra_actions {
            if !self.recommended_actions.contains(&action) {
                self.recommended_actions.push(action);
            }
        }
        self.correlation_ids.get_or_insert_with(BTreeSet::new).insert(correlation_id);
        self.correlation_context = Some(context);
        self.correlation_score = Some(score.clamp(0.0, 1.0));
        self.is_enhanced = true;
    }
}
