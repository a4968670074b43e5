#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **vigil-ignore** – Ignore-pattern engine (component F).
//!
//! Suppresses known-benign single events and ordered multi-step sequences
//! using a per-host sliding window, grounded on
//! `security/toka-rate-limiter`'s per-key sliding-window bookkeeping
//! generalized from counters to ring buffers of classified events.

/// Field extraction helpers (`account_name`, `logon_type`) from rendered
/// messages.
pub mod extract;
/// The engine itself.
pub mod engine;
/// Supporting configuration and result types.
pub mod types;

pub use engine::IgnoreEngine;
pub use types::{ClassifiedRecord, IgnoreDecision, IgnoreEngineConfig};
