//! Explicit configuration structs for the whole pipeline.
//!
//! No file-loading and no dependency injection: the host process builds a
//! [`PipelineConfig`] directly (per §9's replacement of the source's
//! options-pattern/DI with construction-time structs) and passes it to
//! [`crate::pipeline::Pipeline::new`].

use std::time::Duration;

use vigil_bus::BackpressurePolicy;
use vigil_correlate::CorrelationEngineConfig;
use vigil_ignore::IgnoreEngineConfig;
use vigil_respond::OrchestratorConfig;
use vigil_store_core::HEALTH_CHECK_TIMEOUT;
use vigil_watch::{ChannelConfig, WatcherConfig};

use crate::retry::RetryConfig;

/// Whole-pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// One entry per watched channel.
    pub channels: Vec<ChannelConfig>,
    /// Tunables shared across all channel watchers.
    pub watcher: WatcherConfig,
    /// Ignore-pattern engine configuration.
    pub ignore: IgnoreEngineConfig,
    /// Correlation engine configuration.
    pub correlation: CorrelationEngineConfig,
    /// Response orchestrator configuration.
    pub respond: OrchestratorConfig,
    /// Ring-buffer capacity of the broadcast fan-out.
    pub broadcast_capacity: usize,
    /// Backpressure policy for the broadcaster.
    pub backpressure: BackpressurePolicy,
    /// Interval between store health probes; each probe is bounded by
    /// [`PipelineConfig::health_check_timeout`].
    pub health_check_interval: Duration,
    /// Per-probe timeout. Spec §5 default: 5 seconds.
    pub health_check_timeout: Duration,
    /// Retry policy applied to transient `EventStore::add` failures.
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            watcher: WatcherConfig::default(),
            ignore: IgnoreEngineConfig::default(),
            correlation: CorrelationEngineConfig::default(),
            respond: OrchestratorConfig::default(),
            broadcast_capacity: 1024,
            backpressure: BackpressurePolicy::DropOnLag,
            health_check_interval: Duration::from_secs(30),
            health_check_timeout: HEALTH_CHECK_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }
}
