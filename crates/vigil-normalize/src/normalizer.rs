//! Normalizer: turns a [`LogEvent`] into a classified [`SecurityEvent`]
//! (component D).

use std::sync::Arc;

use chrono::Timelike;
use once_cell::sync::Lazy;
use regex::Regex;
use vigil_store_core::{RuleStore, StoreError};
use vigil_types::{LogEvent, RiskLevel, SecurityEvent};

use crate::cache::RuleCache;

static ADMIN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(administrator|admin|root|system)$").expect("valid admin regex")
});

fn is_admin_user(user: &str) -> bool {
    ADMIN_PATTERN.is_match(user.trim())
}

/// Business hours are evaluated against `LogEvent::time`'s hour-of-day
/// directly: channel watchers run attached to a single host, so the
/// timestamp they stamp is already that host's wall-clock time and needs no
/// further timezone conversion.
fn is_outside_business_hours(event: &LogEvent) -> bool {
    let hour = event.time.hour();
    !(8..18).contains(&hour)
}

fn render_summary(template: &str, event: &LogEvent) -> String {
    template
        .replace("{user}", &event.user)
        .replace("{host}", &event.host)
        .replace("{channel}", &event.channel)
}

/// Classifies raw [`LogEvent`]s against a cached rule table, then applies
/// the deterministic contextual risk adjustments from the spec.
pub struct Normalizer<S: RuleStore> {
    rules: Arc<RuleCache<S>>,
}

impl<S: RuleStore> Normalizer<S> {
    /// Construct a normalizer over the given rule cache.
    pub fn new(rules: Arc<RuleCache<S>>) -> Self {
        Self { rules }
    }

    /// Classify `event`. Returns `Ok(None)` when no enabled rule matches
    /// `(channel, event_id)` — the spec's "no event" outcome, not an error.
    pub async fn classify(&self, event: LogEvent) -> Result<Option<SecurityEvent>, StoreError> {
        let Some(rule) = self.rules.resolve(&event.channel, event.event_id).await? else {
            return Ok(None);
        };

        let mut risk = rule.base_risk;
        if is_admin_user(&event.user) && risk == RiskLevel::Medium {
            risk = RiskLevel::High;
        }
        if is_outside_business_hours(&event) && risk == RiskLevel::Low {
            risk = RiskLevel::Medium;
        }

        let summary = render_summary(&rule.summary_template, &event);

        Ok(Some(SecurityEvent::new_deterministic(
            event,
            rule.event_type,
            risk,
            rule.base_confidence,
            summary,
            rule.mitre_techniques.clone(),
            rule.recommended_actions.clone(),
        )))
    }
}
