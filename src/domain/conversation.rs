//! ConversationState — per-session memory owned by the state manager.

use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::agent_card::AgentCard;
use super::ids::{AgentId, ContextId, TaskId};
use super::message::Message;

/// Cortex's record of a task it delegated, kept alongside the Task itself
/// so it can recognize the task's eventual completion event and notify the
/// user (§4.5 step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    /// The delegated task's id.
    pub task_id: TaskId,
    /// The decision engine's label for the kind of work requested.
    pub task_type: String,
    /// When the delegation was made.
    pub requested_at: SystemTime,
    /// The message that triggered this delegation.
    pub original_input: Message,
    /// Set once the user has been informed of a terminal status for this task.
    pub user_notified: bool,
}

impl TaskContext {
    /// Builds a freshly delegated, not-yet-notified task context.
    #[must_use]
    pub fn new(task_id: TaskId, task_type: impl Into<String>, original_input: Message, now: SystemTime) -> Self {
        Self {
            task_id,
            task_type: task_type.into(),
            requested_at: now,
            original_input,
            user_notified: false,
        }
    }
}

/// All state the orchestrator keeps for one session, guarded by the state
/// manager's per-session lock (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConversationState {
    /// Full message history for this session, oldest first.
    pub messages: Vec<Message>,
    /// Tasks delegated from this session, keyed by task id. An entry's
    /// `user_notified` flips to `true` once its result has been folded into
    /// a response (see `Cortex::process_message`); entries are not evicted
    /// on notification, so this also serves as a record of every task this
    /// session has delegated.
    pub pending_tasks: HashMap<TaskId, TaskContext>,
    /// Agents this session has been introduced to, keyed by agent id.
    ///
    /// Maintained for data-model fidelity with per-session agent visibility;
    /// the Decision Engine reads the broker-wide `AgentRegistry` rather than
    /// this map (see `DESIGN.md`).
    pub registered_agents: HashMap<AgentId, AgentCard>,
}

impl ConversationState {
    /// An empty session, as seen on first contact for a given `ContextId`.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Appends a message to this session's history.
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Marks `task_id`'s pending context as notified, if present.
    pub fn mark_notified(&mut self, task_id: &TaskId) {
        if let Some(context) = self.pending_tasks.get_mut(task_id) {
            context.user_notified = true;
        }
    }
}
