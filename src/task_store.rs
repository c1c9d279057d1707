//! Task Store — Task lifecycle and artifact state, keyed by `TaskId` (§4.4).

use std::time::SystemTime;

use dashmap::DashMap;
use tracing::instrument;

use crate::domain::{ArtifactId, ContextId, Message, MessageId, Part, Role, Task, TaskId, TaskState};
use crate::error::TaskStoreError;
use crate::time_provider::SharedTimeProvider;

/// Which Tasks to return from [`TaskStore::list`].
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Only tasks with any AGENT-role message in their history qualify, per
    /// §4.4's "agent_id involvement (any message with role AGENT in history
    /// qualifies)". `Message` carries no producer-agent field to correlate
    /// against a specific id, so presence of the filter (`Some(_)`) applies
    /// this history check; the particular id value is not otherwise
    /// consulted (see `DESIGN.md`'s Open Question resolution).
    pub agent_id: Option<crate::domain::AgentId>,
    /// Only tasks in this session, if set.
    pub context_id: Option<ContextId>,
    /// Only tasks whose current state is in this set, if non-empty.
    pub states: Vec<TaskState>,
}

impl TaskFilter {
    fn matches(&self, task: &Task) -> bool {
        if let Some(context_id) = &self.context_id {
            if &task.context_id != context_id {
                return false;
            }
        }
        if !self.states.is_empty() && !self.states.contains(&task.status.state) {
            return false;
        }
        if self.agent_id.is_some() {
            let involved = task.history.iter().any(|message| message.role == Role::Agent);
            if !involved {
                return false;
            }
        }
        true
    }
}

/// Holds every in-flight and completed Task in memory for the life of the
/// process. There is no eviction; retention is bounded only by process
/// lifetime (§3).
pub struct TaskStore {
    tasks: DashMap<TaskId, Task>,
    time_provider: SharedTimeProvider,
}

impl TaskStore {
    /// Builds an empty task store.
    #[must_use]
    pub fn new(time_provider: SharedTimeProvider) -> Self {
        Self {
            tasks: DashMap::new(),
            time_provider,
        }
    }

    /// Creates a new Task seeded with `first_message`, failing if
    /// `task_id` is already present.
    ///
    /// # Errors
    /// Returns [`TaskStoreError::DuplicateTaskId`] if a task with this id
    /// already exists.
    pub fn create(&self, task_id: TaskId, context_id: ContextId, first_message: Message) -> Result<Task, TaskStoreError> {
        if self.tasks.contains_key(&task_id) {
            return Err(TaskStoreError::DuplicateTaskId(task_id));
        }
        let task = Task::new(task_id.clone(), context_id, first_message, self.time_provider.now());
        self.tasks.insert(task_id, task.clone());
        Ok(task)
    }

    /// Appends `message` to an existing task's history.
    ///
    /// # Errors
    /// Returns [`TaskStoreError::NotFound`] if `task_id` does not exist.
    pub fn append_message(&self, task_id: &TaskId, message: Message) -> Result<Task, TaskStoreError> {
        let mut entry = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskStoreError::NotFound(task_id.clone()))?;
        entry.append_message(message, self.time_provider.now());
        Ok(entry.clone())
    }

    /// Moves a task to `new_state`, rejecting transitions out of a
    /// terminal state.
    ///
    /// # Errors
    /// Returns [`TaskStoreError::NotFound`] if `task_id` does not exist, or
    /// [`TaskStoreError::IllegalTransition`] if the task is already terminal.
    pub fn transition(
        &self,
        task_id: &TaskId,
        new_state: TaskState,
        last_update: Option<Message>,
    ) -> Result<Task, TaskStoreError> {
        let mut entry = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskStoreError::NotFound(task_id.clone()))?;
        entry.transition(new_state, last_update, self.time_provider.now())?;
        Ok(entry.clone())
    }

    /// Finds-or-inserts an artifact by id, replacing or appending its parts
    /// per `append`.
    ///
    /// # Errors
    /// Returns [`TaskStoreError::NotFound`] if `task_id` does not exist.
    pub fn upsert_artifact(
        &self,
        task_id: &TaskId,
        artifact_id: ArtifactId,
        name: String,
        parts: Vec<Part>,
        append: bool,
    ) -> Result<Task, TaskStoreError> {
        let mut entry = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskStoreError::NotFound(task_id.clone()))?;
        match entry.find_artifact_mut(&artifact_id) {
            Some(existing) if append => existing.append(parts),
            Some(existing) => existing.replace(name, parts),
            None => entry.artifacts.push(crate::domain::Artifact {
                artifact_id,
                name,
                parts,
            }),
        }
        Ok(entry.clone())
    }

    /// Returns a task, truncating `history` to the last `history_limit`
    /// entries if supplied and positive.
    ///
    /// # Errors
    /// Returns [`TaskStoreError::NotFound`] if `task_id` does not exist.
    #[instrument(skip(self))]
    pub fn get(&self, task_id: &TaskId, history_limit: Option<usize>) -> Result<Task, TaskStoreError> {
        let task = self
            .tasks
            .get(task_id)
            .ok_or_else(|| TaskStoreError::NotFound(task_id.clone()))?
            .clone();
        Ok(task.with_history_limit(history_limit))
    }

    /// Cancels a task: rejects unless currently SUBMITTED or WORKING, sets
    /// state to CANCELLED with a synthesized AGENT-role message carrying
    /// `reason`.
    ///
    /// # Errors
    /// Returns [`TaskStoreError::NotFound`] if `task_id` does not exist, or
    /// [`TaskStoreError::IllegalTransition`] if the task is already terminal.
    pub fn cancel(&self, task_id: &TaskId, reason: &str) -> Result<Task, TaskStoreError> {
        let mut entry = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskStoreError::NotFound(task_id.clone()))?;
        let now: SystemTime = self.time_provider.now();
        let cancellation = Message::new(
            MessageId::generate(),
            entry.context_id.clone(),
            Some(task_id.clone()),
            Role::Agent,
            vec![Part::text(reason)],
        );
        entry.transition(TaskState::Cancelled, Some(cancellation), now)?;
        Ok(entry.clone())
    }

    /// Returns a snapshot of tasks matching `filter`.
    #[must_use]
    pub fn list(&self, filter: &TaskFilter) -> Vec<Task> {
        self.tasks
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|task| filter.matches(task))
            .collect()
    }
}
