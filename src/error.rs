//! Crate-wide error taxonomy (§7).
//!
//! Every component has its own narrow error enum; [`BrokerError`] unifies
//! them at the facade boundary into the six kinds the error-handling design
//! actually distinguishes. Callers that only need the kind match on
//! `BrokerError`; callers that want component detail match on the source.

use thiserror::Error;

use crate::domain::{AgentId, ContextId, IllegalTransition, TaskId};

/// Errors raised validating or routing a publish.
#[derive(Debug, Error)]
pub enum RouterError {
    /// A publish carried content that failed validation (e.g. empty `content`).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A publish referenced a task id that does not exist.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
}

/// Errors raised by the task store.
#[derive(Debug, Error)]
pub enum TaskStoreError {
    /// No task exists with the given id.
    #[error("task not found: {0}")]
    NotFound(TaskId),
    /// The requested transition is illegal for the task's current state.
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
    /// A caller tried to insert a task id that is already present.
    #[error("task already exists: {0}")]
    DuplicateTaskId(TaskId),
}

/// Errors raised operating on per-session conversation state.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// The operation closure passed to `with_lock` failed; no mutation
    /// was committed.
    #[error("operation failed for session {context_id}: {reason}")]
    OperationFailed {
        /// The session the operation targeted.
        context_id: ContextId,
        /// Why the closure failed.
        reason: String,
    },
}

/// Errors raised registering or querying agent capability cards.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No card is registered for the given agent id.
    #[error("agent not registered: {0}")]
    NotFound(AgentId),
}

/// Errors surfaced from a [`crate::cortex::engine::DecisionEngine`] call or
/// from interpreting its output.
#[derive(Debug, Error)]
pub enum CortexError {
    /// The decision engine itself returned an error.
    #[error("decision engine failed: {0}")]
    EngineFailed(String),
    /// The decision engine returned an action kind this core does not
    /// recognize. The taxonomy is closed; unknown kinds are a hard failure.
    #[error("unknown action kind: {0}")]
    UnknownAction(String),
}

/// Errors raised building or loading a [`crate::config::BrokerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration value failed validation.
    #[error("invalid configuration: {field} - {reason}")]
    Invalid {
        /// The offending field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
    /// Reading or writing a configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The six error kinds the broker facade distinguishes (§7). Every
/// component error maps onto exactly one of these.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Validation failed; no side effects were committed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The referenced task or session does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The requested operation is illegal given current state (terminal
    /// task, duplicate id).
    #[error("illegal state: {0}")]
    IllegalState(String),
    /// The decision engine returned an action kind outside the closed
    /// taxonomy.
    #[error("unknown action: {0}")]
    UnknownAction(String),
    /// The decision engine itself failed.
    #[error("decision engine error: {0}")]
    EngineError(String),
    /// An invariant was violated or a panic was caught at a fan-out
    /// boundary.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RouterError> for BrokerError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::InvalidInput(msg) => Self::InvalidInput(msg),
            RouterError::TaskNotFound(id) => Self::NotFound(format!("task {id}")),
        }
    }
}

impl From<TaskStoreError> for BrokerError {
    fn from(err: TaskStoreError) -> Self {
        match err {
            TaskStoreError::NotFound(id) => Self::NotFound(format!("task {id}")),
            TaskStoreError::IllegalTransition(inner) => Self::IllegalState(inner.to_string()),
            TaskStoreError::DuplicateTaskId(id) => Self::IllegalState(format!("duplicate task id {id}")),
        }
    }
}

impl From<ConversationError> for BrokerError {
    fn from(err: ConversationError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<RegistryError> for BrokerError {
    fn from(err: RegistryError) -> Self {
        Self::NotFound(err.to_string())
    }
}

impl From<CortexError> for BrokerError {
    fn from(err: CortexError) -> Self {
        match err {
            CortexError::EngineFailed(msg) => Self::EngineError(msg),
            CortexError::UnknownAction(kind) => Self::UnknownAction(kind),
        }
    }
}

impl From<ConfigError> for BrokerError {
    fn from(err: ConfigError) -> Self {
        Self::Internal(err.to_string())
    }
}
