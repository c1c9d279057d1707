//! Core domain types shared by every broker component.
//!
//! Nothing in this module talks to a channel, a lock, or the clock; it is
//! the vocabulary the rest of the crate is built from.

pub mod agent_card;
pub mod conversation;
pub mod event;
pub mod ids;
pub mod message;
pub mod task;

pub use agent_card::{AgentCard, Skill};
pub use conversation::{ConversationState, TaskContext};
pub use event::{AgentEvent, ArtifactUpdate, EventClass, EventPayload, Priority, Routing, StatusUpdate, TraceContext};
pub use ids::{AgentId, ArtifactId, ContextId, EventId, MessageId, TaskId};
pub use message::{Message, Part, Role};
pub use task::{Artifact, IllegalTransition, Task, TaskState, TaskStatus};
