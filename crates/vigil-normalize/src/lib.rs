#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **vigil-normalize** – Normalizer and cached rule store (components D/E).
//!
//! Grounded on `toka-kernel`'s ordered dispatch-then-validate shape and its
//! `registry` module's cache-with-explicit-invalidation pattern, generalized
//! here to a positive cache over an async [`vigil_store_core::RuleStore`].

/// Positive cache over the durable rule store.
pub mod cache;
/// LogEvent → SecurityEvent classification.
pub mod normalizer;

pub use cache::{RuleCache, RuleCacheStats};
pub use normalizer::Normalizer;
