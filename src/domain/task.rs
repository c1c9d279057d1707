//! Task and Artifact — the unit of delegated work and its accumulating output.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::{ArtifactId, ContextId, TaskId};
use super::message::{Message, Part};

/// The lifecycle state of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// Created, not yet started.
    Submitted,
    /// Actively being worked on.
    Working,
    /// Finished successfully. Terminal.
    Completed,
    /// Finished unsuccessfully. Terminal.
    Failed,
    /// Cancelled by a caller. Terminal.
    Cancelled,
}

impl TaskState {
    /// Terminal states have no outgoing transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Submitted => "SUBMITTED",
            Self::Working => "WORKING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        };
        write!(f, "{s}")
    }
}

/// A rejected attempt to move a Task out of a terminal state.
#[derive(Debug, Error)]
#[error("illegal transition for task {task_id}: {from} is terminal, cannot move to {to}")]
pub struct IllegalTransition {
    /// The task whose transition was rejected.
    pub task_id: TaskId,
    /// The state the task was already in.
    pub from: TaskState,
    /// The state the caller attempted to move to.
    pub to: TaskState,
}

/// Current status of a Task: its state plus the message that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Current lifecycle state.
    pub state: TaskState,
    /// When this status was set.
    pub timestamp: SystemTime,
    /// The message whose processing produced this status, if any.
    pub last_update: Option<Message>,
}

impl TaskStatus {
    /// Builds a status for a freshly submitted task.
    #[must_use]
    pub fn submitted(now: SystemTime, update: Message) -> Self {
        Self {
            state: TaskState::Submitted,
            timestamp: now,
            last_update: Some(update),
        }
    }
}

/// A named, multi-part result produced for a Task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Stable identifier used to find-or-insert on subsequent updates.
    pub artifact_id: ArtifactId,
    /// Human-readable name.
    pub name: String,
    /// Ordered content parts.
    pub parts: Vec<Part>,
}

impl Artifact {
    /// Appends `parts` to this artifact's existing content.
    pub fn append(&mut self, parts: Vec<Part>) {
        self.parts.extend(parts);
    }

    /// Replaces this artifact's content in place.
    pub fn replace(&mut self, name: String, parts: Vec<Part>) {
        self.name = name;
        self.parts = parts;
    }
}

/// A unit of delegated work with a lifecycle and accumulating history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Stable identifier, either producer-supplied or minted by the router.
    pub task_id: TaskId,
    /// Session this task was delegated within.
    pub context_id: ContextId,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Messages exchanged over the task's lifetime, oldest first.
    pub history: Vec<Message>,
    /// Artifacts produced so far, in first-produced order.
    pub artifacts: Vec<Artifact>,
    /// Free-form metadata.
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
}

impl Task {
    /// Creates a new task in `SUBMITTED` state seeded with its first message.
    #[must_use]
    pub fn new(task_id: TaskId, context_id: ContextId, first_message: Message, now: SystemTime) -> Self {
        let status = TaskStatus::submitted(now, first_message.clone());
        Self {
            task_id,
            context_id,
            status,
            history: vec![first_message],
            artifacts: Vec::new(),
            metadata: std::collections::HashMap::new(),
        }
    }

    /// Appends a message to history and updates `status.last_update`,
    /// without changing `status.state`.
    pub fn append_message(&mut self, message: Message, now: SystemTime) {
        self.status.timestamp = now;
        self.status.last_update = Some(message.clone());
        self.history.push(message);
    }

    /// Attempts to move this task to `new_state`. Rejects any transition out
    /// of a terminal state.
    pub fn transition(
        &mut self,
        new_state: TaskState,
        last_update: Option<Message>,
        now: SystemTime,
    ) -> Result<(), IllegalTransition> {
        if self.status.state.is_terminal() {
            return Err(IllegalTransition {
                task_id: self.task_id.clone(),
                from: self.status.state,
                to: new_state,
            });
        }
        self.status.state = new_state;
        self.status.timestamp = now;
        if last_update.is_some() {
            self.status.last_update = last_update;
        }
        Ok(())
    }

    /// Finds the artifact with `artifact_id`, if any.
    pub fn find_artifact_mut(&mut self, artifact_id: &ArtifactId) -> Option<&mut Artifact> {
        self.artifacts
            .iter_mut()
            .find(|artifact| &artifact.artifact_id == artifact_id)
    }

    /// Returns a copy of this task with `history` truncated to the last
    /// `limit` entries. A `limit` of zero or greater than the current
    /// history length is a no-op.
    #[must_use]
    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        if let Some(limit) = limit {
            if limit > 0 && limit < self.history.len() {
                let start = self.history.len() - limit;
                self.history.drain(..start);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{ContextId, MessageId};
    use crate::domain::message::Role;

    fn msg(id: &str) -> Message {
        Message::new(
            MessageId::try_new(id).unwrap(),
            ContextId::try_new("s1").unwrap(),
            None,
            Role::User,
            vec![Part::text("hi")],
        )
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let mut task = Task::new(
            TaskId::try_new("t1").unwrap(),
            ContextId::try_new("s1").unwrap(),
            msg("m1"),
            SystemTime::now(),
        );
        task.transition(TaskState::Completed, None, SystemTime::now())
            .unwrap();
        let err = task
            .transition(TaskState::Working, None, SystemTime::now())
            .unwrap_err();
        assert_eq!(err.from, TaskState::Completed);
    }

    #[test]
    fn history_limit_keeps_most_recent_entries() {
        let mut task = Task::new(
            TaskId::try_new("t1").unwrap(),
            ContextId::try_new("s1").unwrap(),
            msg("m1"),
            SystemTime::now(),
        );
        task.append_message(msg("m2"), SystemTime::now());
        task.append_message(msg("m3"), SystemTime::now());

        let truncated = task.with_history_limit(Some(2));
        let ids: Vec<_> = truncated
            .history
            .iter()
            .map(|m| m.message_id.to_string())
            .collect();
        assert_eq!(ids, vec!["m2", "m3"]);
    }
}
