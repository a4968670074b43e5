//! The correlation engine itself (component G).

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;
use vigil_store_core::CorrelationStore;
use vigil_types::{Correlation, CorrelationRule, CorrelationType, SecurityEvent};

use crate::detectors::{detect_attack_chain, detect_brute_force, detect_lateral_movement, detect_temporal_burst};
use crate::enrich::apply_enrichment;
use crate::index::CorrelationIndex;
use crate::types::{AnalysisResult, CorrelationEngineConfig, CorrelationStatistics, EventProjection, TrainingOutcome};

/// A source of advisory, model-detected correlations. `MLDetected`
/// correlations only ever reach the engine through this seam; the engine
/// itself never performs statistical inference.
#[async_trait]
pub trait AdvisoryCorrelationSource: Send + Sync {
    /// Poll for newly available advisory correlations.
    async fn poll(&self) -> Vec<Correlation>;
}

fn rule_for(rules: &[CorrelationRule], correlation_type: CorrelationType) -> Option<CorrelationRule> {
    let name = match correlation_type {
        CorrelationType::TemporalBurst => "Temporal Burst",
        CorrelationType::BruteForce => "Brute Force Attack",
        CorrelationType::LateralMovement => "Lateral Movement",
        CorrelationType::AttackChain => "Privilege Escalation",
        CorrelationType::MLDetected => return None,
    };
    rules.iter().find(|r| r.name == name).cloned()
}

/// Sliding-window correlation engine: per-event synchronous analysis plus
/// offline batch/attack-chain detection, rule tracking and statistics.
pub struct CorrelationEngine<S: CorrelationStore> {
    store: Arc<S>,
    index: CorrelationIndex,
    rules: RwLock<Vec<CorrelationRule>>,
    seen: DashMap<(CorrelationType, BTreeSet<Uuid>), DateTime<Utc>>,
    total_emitted: AtomicU64,
    by_type: DashMap<CorrelationType, AtomicU64>,
    config: CorrelationEngineConfig,
}

impl<S: CorrelationStore> CorrelationEngine<S> {
    /// Construct an engine over `store`, seeded with the default rule set.
    pub fn new(store: Arc<S>, config: CorrelationEngineConfig) -> Self {
        Self {
            store,
            index: CorrelationIndex::new(config.max_window, config.max_per_bucket),
            rules: RwLock::new(CorrelationRule::defaults()),
            seen: DashMap::new(),
            total_emitted: AtomicU64::new(0),
            by_type: DashMap::new(),
            config,
        }
    }

    fn dedup_and_keep(&self, candidate: Correlation, now: DateTime<Utc>) -> Option<Correlation> {
        let key = candidate.dedup_key();
        if let Some(last) = self.seen.get(&key) {
            if now - *last <= self.config.dedup_window {
                return None;
            }
        }
        self.seen.insert(key, now);
        Some(candidate)
    }

    async fn rule_allows(&self, candidate: &Correlation) -> bool {
        if candidate.r#type == CorrelationType::MLDetected {
            return candidate.confidence >= 0.6;
        }
        let rules = self.rules.read().await;
        match rule_for(&rules, candidate.r#type) {
            Some(rule) => rule.enabled && candidate.confidence >= rule.min_confidence,
            None => true,
        }
    }

    fn record_stats(&self, correlation_type: CorrelationType) {
        self.total_emitted.fetch_add(1, Ordering::Relaxed);
        self.by_type
            .entry(correlation_type)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    async fn persist(&self, correlation: &Correlation) {
        if let Err(err) = self.store.add(correlation).await {
            warn!(error = %err, correlation_id = %correlation.id, "failed to persist correlation");
        }
    }

    /// Synchronous per-event analysis: records the event's projection into
    /// the sliding indices, runs the detectors it can run without an
    /// external sample, and (if any fire) persists and enriches.
    ///
    /// Never propagates detector panics as pipeline failures: an internal
    /// error here is logged and the caller continues with the un-enriched
    /// base event.
    pub async fn analyze(&self, event: &mut SecurityEvent) -> AnalysisResult {
        let projection = EventProjection::from_event(event);
        let now = projection.time;
        self.index.record(projection.clone());

        let host_window = self.index.host_window(&projection.host, now, self.config.max_window);
        let user_window = self.index.user_window(&projection.user, now, self.config.max_window);
        let type_window = self.index.type_window(projection.event_type, now, self.config.max_window);

        let mut candidates = Vec::new();
        if let Some(c) = detect_brute_force(&host_window, &projection, projection.event_type, now) {
            candidates.push(c);
        }
        if let Some(c) = detect_temporal_burst(&type_window, &projection, event.risk_level, now) {
            candidates.push(c);
        }
        if let Some(c) = detect_lateral_movement(&user_window, &projection, projection.event_type, now) {
            candidates.push(c);
        }
        if let Some(c) = detect_attack_chain(&host_window, &projection, projection.event_type, now) {
            candidates.push(c);
        }

        let mut matches = Vec::new();
        for candidate in candidates {
            if !self.rule_allows(&candidate).await {
                continue;
            }
            if let Some(kept) = self.dedup_and_keep(candidate, now) {
                self.record_stats(kept.r#type);
                self.persist(&kept).await;
                matches.push(kept);
            }
        }

        if matches.is_empty() {
            return AnalysisResult {
                has_correlation: false,
                confidence: None,
                correlation: None,
                explanation: "no correlation".to_string(),
            };
        }

        let best = matches
            .iter()
            .max_by_key(|c| c.tie_break_key())
            .expect("matches is non-empty")
            .clone();
        apply_enrichment(event, &best);

        AnalysisResult {
            has_correlation: true,
            confidence: Some(best.confidence),
            explanation: format!("{:?}: {}", best.r#type, best.pattern),
            correlation: Some(best),
        }
    }

    /// Accept an advisory (`MLDetected`) correlation produced outside this
    /// engine, subjecting it to the same dedup/threshold/persist path as a
    /// detector match.
    pub async fn ingest_advisory(&self, candidate: Correlation) -> Option<Correlation> {
        if candidate.r#type != CorrelationType::MLDetected {
            return None;
        }
        let now = candidate.detected_at;
        if !self.rule_allows(&candidate).await {
            return None;
        }
        let kept = self.dedup_and_keep(candidate, now)?;
        self.record_stats(kept.r#type);
        self.persist(&kept).await;
        Some(kept)
    }

    /// Offline analysis over an explicit event batch, independent of the
    /// engine's live sliding indices.
    pub async fn analyze_batch(&self, events: &[SecurityEvent], window: Duration) -> Vec<Correlation> {
        let batch_index = CorrelationIndex::new(window, events.len().max(1));
        for event in events {
            batch_index.record(EventProjection::from_event(event));
        }

        let mut results = Vec::new();
        for event in events {
            let projection = EventProjection::from_event(event);
            let now = projection.time;
            let host_window = batch_index.host_window(&projection.host, now, window);
            let user_window = batch_index.user_window(&projection.user, now, window);
            let type_window = batch_index.type_window(projection.event_type, now, window);

            for candidate in [
                detect_brute_force(&host_window, &projection, projection.event_type, now),
                detect_temporal_burst(&type_window, &projection, event.risk_level, now),
                detect_lateral_movement(&user_window, &projection, projection.event_type, now),
                detect_attack_chain(&host_window, &projection, projection.event_type, now),
            ]
            .into_iter()
            .flatten()
            {
                if self.rule_allows(&candidate).await {
                    if let Some(kept) = self.dedup_and_keep(candidate, now) {
                        self.record_stats(kept.r#type);
                        self.persist(&kept).await;
                        results.push(kept);
                    }
                }
            }
        }
        results
    }

    /// Offline attack-chain detection over an explicit event batch.
    pub async fn detect_attack_chains(&self, events: &[SecurityEvent], window: Duration) -> Vec<Correlation> {
        self.analyze_batch(events, window)
            .await
            .into_iter()
            .filter(|c| c.r#type == CorrelationType::AttackChain)
            .collect()
    }

    /// Correlations detected in `[from, to]`, newest first.
    pub async fn get_correlations(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Correlation>, vigil_store_core::StoreError> {
        self.store.get_in_range(from, to).await
    }

    /// Running emission totals.
    pub fn get_statistics(&self) -> CorrelationStatistics {
        let by_type: HashMap<CorrelationType, u64> = self
            .by_type
            .iter()
            .map(|entry| (*entry.key(), entry.value().load(Ordering::Relaxed)))
            .collect();
        CorrelationStatistics {
            total_emitted: self.total_emitted.load(Ordering::Relaxed),
            by_type,
        }
    }

    /// Current correlation rule set.
    pub async fn get_rules(&self) -> Vec<CorrelationRule> {
        self.rules.read().await.clone()
    }

    /// Replace a rule by id. `UnknownRule` if no rule with that id exists.
    pub async fn update_rule(&self, rule: CorrelationRule) -> Result<(), crate::types::CorrelationError> {
        let mut rules = self.rules.write().await;
        match rules.iter_mut().find(|r| r.id == rule.id) {
            Some(slot) => {
                *slot = rule;
                Ok(())
            }
            None => Err(crate::types::CorrelationError::UnknownRule(rule.id)),
        }
    }

    /// Accept a confirmed-sample batch for training. Never performs online
    /// training; only records whether the sample count met the configured
    /// minimum.
    pub fn train_models(&self, confirmed: &[Correlation]) -> TrainingOutcome {
        if confirmed.len() < self.config.min_training_samples {
            warn!(
                samples = confirmed.len(),
                minimum = self.config.min_training_samples,
                "train_models received too few confirmed samples, ignoring"
            );
            return TrainingOutcome { accepted: false };
        }
        warn!(samples = confirmed.len(), "train_models is a no-op in this build");
        TrainingOutcome { accepted: true }
    }

    /// Delete correlations older than `max_age` from the backing store.
    pub async fn cleanup_old_correlations(&self, max_age: Duration) -> Result<u64, vigil_store_core::StoreError> {
        self.store.cleanup_older_than(max_age).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeSet as BSet;
    use vigil_store_memory::MemoryStore;
    use vigil_types::{LogEvent, RiskLevel};

    fn make_event(
        event_type: SecurityEventType,
        host: &str,
        user: &str,
        risk: RiskLevel,
        seconds: i64,
        unique_id: &str,
    ) -> SecurityEvent {
        let raw = LogEvent {
            time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(seconds),
            host: host.into(),
            channel: "Security".into(),
            event_id: 4624,
            level: "Information".into(),
            user: user.into(),
            message: "m".into(),
            raw_json: "{}".into(),
            unique_id: unique_id.into(),
        };
        SecurityEvent::new_deterministic(raw, event_type, risk, 80, "s".into(), BSet::new(), vec![])
    }

    #[tokio::test]
    async fn brute_force_sequence_fires_through_analyze() {
        let store = Arc::new(MemoryStore::new());
        let engine = CorrelationEngine::new(store, CorrelationEngineConfig::default());

        for i in 0..5 {
            let mut event = make_event(
                SecurityEventType::AuthenticationFailure,
                "H",
                "alice",
                RiskLevel::Medium,
                i * 10,
                &format!("fail-{i}"),
            );
            let result = engine.analyze(&mut event).await;
            assert!(!result.has_correlation);
        }

        let mut success = make_event(
            SecurityEventType::AuthenticationSuccess,
            "H",
            "alice",
            RiskLevel::Low,
            60,
            "success",
        );
        let result = engine.analyze(&mut success).await;
        assert!(result.has_correlation);
        assert_eq!(success.risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn unmatched_event_returns_no_correlation() {
        let store = Arc::new(MemoryStore::new());
        let engine = CorrelationEngine::new(store, CorrelationEngineConfig::default());
        let mut event = make_event(
            SecurityEventType::SystemStartup,
            "H",
            "alice",
            RiskLevel::Low,
            0,
            "only",
        );
        let result = engine.analyze(&mut event).await;
        assert!(!result.has_correlation);
        assert_eq!(result.explanation, "no correlation");
    }

    #[tokio::test]
    async fn rule_below_min_confidence_suppresses_emission() {
        let store = Arc::new(MemoryStore::new());
        let engine = CorrelationEngine::new(store, CorrelationEngineConfig::default());
        {
            let mut rules = engine.rules.write().await;
            for rule in rules.iter_mut() {
                rule.min_confidence = 1.1;
            }
        }

        for i in 0..5 {
            let mut event = make_event(
                SecurityEventType::AuthenticationFailure,
                "H",
                "bob",
                RiskLevel::Medium,
                i * 10,
                &format!("f{i}"),
            );
            engine.analyze(&mut event).await;
        }
        let mut success = make_event(
            SecurityEventType::AuthenticationSuccess,
            "H",
            "bob",
            RiskLevel::Low,
            60,
            "s",
        );
        let result = engine.analyze(&mut success).await;
        assert!(!result.has_correlation);
    }

    #[tokio::test]
    async fn train_models_rejects_small_batches() {
        let store = Arc::new(MemoryStore::new());
        let engine = CorrelationEngine::new(store, CorrelationEngineConfig::default());
        let outcome = engine.train_models(&[]);
        assert!(!outcome.accepted);
    }

    #[tokio::test]
    async fn update_rule_rejects_unknown_id() {
        let store = Arc::new(MemoryStore::new());
        let engine = CorrelationEngine::new(store, CorrelationEngineConfig::default());
        let bogus = CorrelationRule {
            id: Uuid::new_v4(),
            name: "Ghost".into(),
            enabled: true,
            min_confidence: 0.5,
        };
        assert!(engine.update_rule(bogus).await.is_err());
    }
}
