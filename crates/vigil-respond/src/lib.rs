#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **vigil-respond** – Response orchestrator (component H).
//!
//! Suggest/execute/rollback lifecycle over a registry of action-type
//! handlers, grounded on `toka-kernel`'s opcode registry and deterministic
//! state-transition model.

/// Supporting configuration, statistics and error types.
pub mod types;
/// The action-handler trait and registry.
pub mod handler;
/// The orchestrator itself.
pub mod engine;

pub use engine::ResponseOrchestrator;
pub use handler::{ActionHandler, HandlerRegistry};
pub use types::{OrchestratorConfig, OrchestratorStatistics, RespondError};
