//! The closed action taxonomy a [`crate::cortex::engine::DecisionEngine`] may return (§4.5.1).

use serde::{Deserialize, Serialize};

use crate::domain::AgentId;

/// One action Cortex executes after a decision. The taxonomy is closed: an
/// engine returning an action kind outside this enum cannot be represented
/// and any string-keyed equivalent from a remote engine must be rejected
/// with `UnknownAction` before reaching this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Action {
    /// Respond directly in the conversation.
    ChatResponse {
        /// Response text.
        text: String,
    },
    /// Delegate work to a specialist agent.
    TaskRequest {
        /// Engine-chosen label for the kind of work requested.
        task_type: String,
        /// Agent the task should be routed to.
        target_agent: AgentId,
        /// Content describing the work, carried as the task's first message part.
        payload: String,
    },
}

/// The result of one `decide` call: why, and what to do about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// The engine's explanation for its chosen actions, surfaced for
    /// debugging and audit; never parsed by Cortex.
    pub reasoning: String,
    /// Actions to execute in order. Must be non-empty on success.
    pub actions: Vec<Action>,
}
