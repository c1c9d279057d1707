//! Message and Part — the atomic units of inter-agent content.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ids::{ContextId, MessageId, TaskId};

/// Who produced a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// The human or upstream caller driving the conversation.
    User,
    /// Cortex or a specialist agent.
    Agent,
}

/// One immutable piece of a [`Message`]'s content.
///
/// Parts never change once attached to a Message; an artifact "append"
/// operation adds new `Part`s to an [`crate::domain::task::Artifact`]
/// rather than mutating an existing one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Part {
    /// Plain text content.
    Text(String),
    /// Structured, caller-defined data.
    StructuredData(serde_json::Value),
    /// A reference to an out-of-band artifact (file, blob, URL).
    FileReference {
        /// Location of the referenced file.
        uri: String,
        /// Optional MIME type hint.
        mime_type: Option<String>,
    },
}

impl Part {
    /// Convenience constructor for a text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Returns the text content if this part is a [`Part::Text`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// An atomic unit of inter-agent text or data.
///
/// Created by a producer, appended to a session's history by the
/// orchestrator, and never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Producer-supplied identifier. Unique within a session by convention,
    /// not enforced by this type (see `DESIGN.md` for the open-question
    /// resolution on duplicate ids).
    pub message_id: MessageId,
    /// Session/conversation correlation id.
    pub context_id: ContextId,
    /// Present when this message is linked to a delegated [`crate::domain::task::Task`].
    pub task_id: Option<TaskId>,
    /// Who produced this message.
    pub role: Role,
    /// Ordered content. The router rejects publishes with empty content
    /// before this type is ever constructed from untrusted input.
    pub content: Vec<Part>,
    /// Free-form metadata attached by the producer.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Message {
    /// Builds a Message from already-validated parts. Internal collaborators
    /// (Cortex, the router's synthesized cancellation message) use this
    /// directly; untrusted input goes through the router's publish
    /// validation first.
    #[must_use]
    pub fn new(
        message_id: MessageId,
        context_id: ContextId,
        task_id: Option<TaskId>,
        role: Role,
        content: Vec<Part>,
    ) -> Self {
        Self {
            message_id,
            context_id,
            task_id,
            role,
            content,
            metadata: HashMap::new(),
        }
    }

    /// Returns the concatenated text of every [`Part::Text`] in this
    /// message's content, in order.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(content: Vec<Part>) -> Message {
        Message::new(
            MessageId::try_new("m1").unwrap(),
            ContextId::try_new("s1").unwrap(),
            None,
            Role::User,
            content,
        )
    }

    #[test]
    fn text_content_joins_text_parts_only() {
        let msg = message(vec![
            Part::text("Hello"),
            Part::StructuredData(serde_json::json!({"x": 1})),
            Part::text(", world"),
        ]);
        assert_eq!(msg.text_content(), "Hello, world");
    }
}
