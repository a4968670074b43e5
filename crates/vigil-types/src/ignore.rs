//! Ignore-pattern sequence matcher configuration.

use serde::{Deserialize, Serialize};

use crate::event::SecurityEventType;

/// Matcher applied to a single step of an ignore-pattern sequence.
///
/// Fields are OR-within-field (any listed value may match) and AND-across-
/// field (every declared field must match).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StepMatcher {
    /// Accepted event types for this step. `None` matches any.
    pub event_type: Option<Vec<SecurityEventType>>,
    /// Accepted MITRE techniques for this step. `None` matches any.
    pub mitre: Option<Vec<String>>,
    /// Accepted source hosts for this step. `None` matches any.
    pub source_machines: Option<Vec<String>>,
    /// Accepted account names for this step. `None` matches any.
    pub account_names: Option<Vec<String>>,
    /// Accepted logon types for this step. `None` matches any.
    pub logon_types: Option<Vec<i32>>,
}

/// A named sequence of `StepMatcher`s plus the action to take on a match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IgnorePattern {
    /// Ordered sequence of step matchers making up this pattern.
    pub sequence: Vec<StepMatcher>,
    /// Human-readable reason recorded when this pattern matches.
    pub reason: String,
    /// If true, every event in a matched sequence is marked ignored (for
    /// reporting only — already-emitted events are not retracted). If
    /// false, only the terminal event of the sequence is ignored.
    pub ignore_all_in_sequence: bool,
}

impl StepMatcher {
    /// A matcher with every field unset, matching any classified event.
    pub fn any() -> Self {
        Self::default()
    }
}
