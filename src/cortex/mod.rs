//! Cortex — the orchestrator subsystem (§4.5, §4.6).
//!
//! [`orchestrator::Cortex`] drives the decision loop; [`engine::DecisionEngine`]
//! is the pluggable reasoning port it depends on; [`actions::Action`] is the
//! closed taxonomy of side effects a decision can request.

pub mod actions;
pub mod engine;
pub mod orchestrator;

pub use actions::{Action, Decision};
pub use engine::{DecisionEngine, EchoEngine, EngineError, TaskDispatchEngine, Trigger};
pub use orchestrator::Cortex;
