//! AgentEvent — the router-level envelope fanned out to subscribers.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::agent_card::AgentCard;
use super::ids::{AgentId, ArtifactId, EventId, TaskId};
use super::message::Message;
use super::task::{Artifact, Task, TaskStatus};

/// Delivery priority carried on a [`Routing`] header. Not interpreted by
/// the router itself (no priority queues in this core); carried through for
/// subscribers and transports that want to honor it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    /// Background or informational.
    Low,
    /// Default priority for ordinary chat and task traffic.
    Medium,
    /// Should be delivered ahead of Medium/Low traffic where possible.
    High,
    /// Operator-visible urgency (e.g. task failures).
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

/// Routing metadata attached to every publish and every emitted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routing {
    /// Agent that produced this event.
    pub from_agent_id: AgentId,
    /// Targeted recipient, if any. Absent means broadcast (§4.3).
    pub to_agent_id: Option<AgentId>,
    /// A dotted event-type tag, e.g. `"a2a.message.chat_response"`.
    pub event_type: String,
    /// Delivery priority.
    pub priority: Priority,
}

impl Routing {
    /// Convenience constructor for a targeted, medium-priority routing header.
    #[must_use]
    pub fn targeted(from: AgentId, to: AgentId, event_type: impl Into<String>) -> Self {
        Self {
            from_agent_id: from,
            to_agent_id: Some(to),
            event_type: event_type.into(),
            priority: Priority::Medium,
        }
    }

    /// Convenience constructor for a broadcast, medium-priority routing header.
    #[must_use]
    pub fn broadcast(from: AgentId, event_type: impl Into<String>) -> Self {
        Self {
            from_agent_id: from,
            to_agent_id: None,
            event_type: event_type.into(),
            priority: Priority::Medium,
        }
    }
}

/// Opaque trace/span correlation, propagated unchanged (§6.5). The core
/// never parses these values; they exist purely to be threaded through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceContext {
    /// Caller-supplied trace identifier.
    pub trace_id: String,
    /// Caller-supplied span identifier.
    pub span_id: String,
}

/// A status transition for a Task, carried as an [`AgentEvent`] payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Task this status applies to.
    pub task_id: TaskId,
    /// The new status.
    pub status: TaskStatus,
}

/// An artifact replace-or-append instruction, carried as an [`AgentEvent`]
/// payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactUpdate {
    /// Task this artifact belongs to.
    pub task_id: TaskId,
    /// Artifact id to find-or-insert.
    pub artifact_id: ArtifactId,
    /// Artifact content after this update (name + parts to append/replace).
    pub artifact: Artifact,
    /// When true, `artifact.parts` is appended to the existing artifact;
    /// when false, the existing artifact is replaced wholesale.
    pub append: bool,
    /// Hint that no further chunks for this artifact are expected.
    pub last_chunk: bool,
}

/// The tagged union of everything the router can fan out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A chat/task message.
    Message(Message),
    /// A full Task snapshot (used when a Message publish creates or mutates one).
    Task(Task),
    /// A status-only change.
    StatusUpdate(StatusUpdate),
    /// An artifact replace-or-append.
    ArtifactUpdate(ArtifactUpdate),
    /// An agent coming online with its capability card.
    Registration(AgentCard),
}

/// The envelope the router fans out to subscriber queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Unique id for this event instance.
    pub event_id: EventId,
    /// When the router emitted this event.
    pub timestamp: SystemTime,
    /// Routing metadata used for classification and fan-out.
    pub routing: Routing,
    /// Propagated, uninterpreted trace correlation.
    pub trace_context: Option<TraceContext>,
    /// The actual content.
    pub payload: EventPayload,
}

impl AgentEvent {
    /// Builds a new envelope, stamping a fresh id and the current time.
    #[must_use]
    pub fn new(routing: Routing, trace_context: Option<TraceContext>, payload: EventPayload) -> Self {
        Self {
            event_id: EventId::generate(),
            timestamp: SystemTime::now(),
            routing,
            trace_context,
            payload,
        }
    }
}

/// Which of the three independent subscriber tables an event belongs to.
///
/// `Generic` subscribers receive every event regardless of its `Specific`
/// class; the router deduplicates a queue that appears in both a specific
/// and the generic table for the same publish (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventClass {
    /// Message subscribers.
    Message,
    /// Task/StatusUpdate/ArtifactUpdate subscribers.
    Task,
    /// Generic subscribers that receive every AgentEvent.
    Generic,
}

impl EventPayload {
    /// The [`EventClass`] this payload is delivered under, for registry
    /// lookups. `Registration` is delivered only to generic subscribers.
    #[must_use]
    pub fn class(&self) -> EventClass {
        match self {
            Self::Message(_) => EventClass::Message,
            Self::Task(_) | Self::StatusUpdate(_) | Self::ArtifactUpdate(_) => EventClass::Task,
            Self::Registration(_) => EventClass::Generic,
        }
    }
}
