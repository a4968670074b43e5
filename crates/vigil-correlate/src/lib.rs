#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **vigil-correlate** – Correlation engine (component G).
//!
//! Maintains sliding per-host, per-user and global-by-type indices over
//! recently seen events and runs the BruteForce / TemporalBurst /
//! LateralMovement / AttackChain detectors against them, grounded on
//! `security/toka-rate-limiter`'s per-key sliding-window bookkeeping
//! generalized from counters to ring buffers.

/// Supporting configuration, result and error types.
pub mod types;
/// Sliding indices the detectors read from.
pub mod index;
/// Pure detector functions.
pub mod detectors;
/// Risk-upgrade policy applied when enriching a triggering event.
pub mod enrich;
/// The engine itself.
pub mod engine;

pub use engine::{AdvisoryCorrelationSource, CorrelationEngine};
pub use types::{AnalysisResult, CorrelationEngineConfig, CorrelationError, CorrelationStatistics, EventProjection, TrainingOutcome};
