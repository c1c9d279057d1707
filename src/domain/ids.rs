//! Validated identifier newtypes shared across the broker core.
//!
//! Every identifier that crosses a component boundary is wrapped in its own
//! type so that a `TaskId` can never be handed to a function expecting an
//! `AgentId`, and so that "empty string" is unrepresentable.

use nutype::nutype;
use uuid::Uuid;

/// Identifier for a [`crate::domain::message::Message`].
///
/// Producer-supplied and not required to be globally unique; uniqueness is
/// only expected within one session (see [`MessageId`] invariants in the
/// data model).
#[nutype(
    sanitize(trim),
    validate(len_char_min = 1),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRef)
)]
pub struct MessageId(String);

impl MessageId {
    /// Mints a fresh message id. Used for router-synthesized messages such
    /// as a task cancellation notice.
    #[must_use]
    pub fn generate() -> Self {
        Self::try_new(Uuid::new_v4().to_string()).expect("uuid string is never empty")
    }
}

/// Correlation id grouping Messages and Tasks into one conversation.
#[nutype(
    sanitize(trim),
    validate(len_char_min = 1),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRef)
)]
pub struct ContextId(String);

/// Identifier for a [`crate::domain::task::Task`].
#[nutype(
    sanitize(trim),
    validate(len_char_min = 1),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRef)
)]
pub struct TaskId(String);

impl TaskId {
    /// Mints a fresh task id. Used by the router when a Message publish
    /// carries no existing `task_id` and by Cortex's `task.request` action.
    #[must_use]
    pub fn generate() -> Self {
        Self::try_new(Uuid::new_v4().to_string()).expect("uuid string is never empty")
    }
}

/// Identifier for a named [`crate::domain::task::Artifact`] within a Task.
#[nutype(
    sanitize(trim),
    validate(len_char_min = 1),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRef)
)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Mints a fresh artifact id for artifacts created without one.
    #[must_use]
    pub fn generate() -> Self {
        Self::try_new(Uuid::new_v4().to_string()).expect("uuid string is never empty")
    }
}

/// Identifier for an agent: a stable, human-assigned name (`"cortex"`,
/// `"agent_echo"`), not a generated UUID.
#[nutype(
    sanitize(trim),
    validate(len_char_min = 1),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRef)
)]
pub struct AgentId(String);

/// Identifier for a router-level [`crate::domain::event::AgentEvent`] envelope.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    From,
    Into
))]
pub struct EventId(Uuid);

impl EventId {
    /// Generates a new random event id.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4())
    }
}
