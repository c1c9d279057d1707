//! The Decision Engine port (§4.6): Cortex depends only on `Arc<dyn DecisionEngine>`.

use async_trait::async_trait;
use thiserror::Error;

use crate::cortex::actions::{Action, Decision};
use crate::domain::{AgentCard, AgentId, Message};

/// Why a [`DecisionEngine`] call failed. Opaque to Cortex beyond display;
/// on receipt Cortex applies its fallback recovery policy rather than
/// retrying.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

/// What kind of event triggered this decision cycle, per §4.5 step 3's
/// classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A new chat message from the user (or an agent message carrying no `task_id`).
    NewUserInput,
    /// An AGENT-role message carrying a `task_id` Cortex had delegated.
    TaskResultReceived,
}

/// Pluggable reasoning backend. Implementations are collaborators external
/// to this core's own correctness guarantees; the trait only promises what
/// Cortex needs to execute the result.
#[async_trait]
pub trait DecisionEngine: Send + Sync {
    /// Decides what to do in response to `trigger_message`, given the full
    /// session history and a snapshot of known agents.
    ///
    /// # Errors
    /// Returns [`EngineError`] if the engine cannot produce a decision.
    async fn decide(
        &self,
        history: &[Message],
        agents: &[AgentCard],
        trigger_message: &Message,
        trigger: Trigger,
    ) -> Result<Decision, EngineError>;
}

/// Deterministic engine for scenario S1: echoes the trigger message's text
/// back as a chat response.
#[derive(Debug, Default)]
pub struct EchoEngine;

impl EchoEngine {
    /// Builds a new echo engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DecisionEngine for EchoEngine {
    async fn decide(
        &self,
        _history: &[Message],
        _agents: &[AgentCard],
        trigger_message: &Message,
        _trigger: Trigger,
    ) -> Result<Decision, EngineError> {
        Ok(Decision {
            reasoning: "echo engine always responds with the input text".to_string(),
            actions: vec![Action::ChatResponse {
                text: format!("Echo: {}", trigger_message.text_content()),
            }],
        })
    }
}

/// Deterministic engine for scenarios S2/S3: acknowledges new input by
/// delegating a fixed task type to a fixed target agent, then synthesizes
/// a completion response when that task's result arrives.
#[derive(Debug)]
pub struct TaskDispatchEngine {
    task_type: String,
    target_agent: AgentId,
}

impl TaskDispatchEngine {
    /// Builds an engine that always delegates to `target_agent` under
    /// `task_type`.
    #[must_use]
    pub fn new(task_type: impl Into<String>, target_agent: AgentId) -> Self {
        Self {
            task_type: task_type.into(),
            target_agent,
        }
    }
}

#[async_trait]
impl DecisionEngine for TaskDispatchEngine {
    async fn decide(
        &self,
        _history: &[Message],
        _agents: &[AgentCard],
        trigger_message: &Message,
        trigger: Trigger,
    ) -> Result<Decision, EngineError> {
        match trigger {
            Trigger::NewUserInput => Ok(Decision {
                reasoning: format!("delegating new input to {}", self.target_agent),
                actions: vec![
                    Action::ChatResponse {
                        text: "I'll start the echo task for you.".to_string(),
                    },
                    Action::TaskRequest {
                        task_type: self.task_type.clone(),
                        target_agent: self.target_agent.clone(),
                        payload: trigger_message.text_content(),
                    },
                ],
            }),
            Trigger::TaskResultReceived => Ok(Decision {
                reasoning: "synthesizing a response from the task result".to_string(),
                actions: vec![Action::ChatResponse {
                    text: format!("Task completed: {}", trigger_message.text_content()),
                }],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContextId, MessageId, Part, Role};

    fn message(text: &str) -> Message {
        Message::new(
            MessageId::try_new("m1").unwrap(),
            ContextId::try_new("s1").unwrap(),
            None,
            Role::User,
            vec![Part::text(text)],
        )
    }

    #[tokio::test]
    async fn echo_engine_echoes_text() {
        let engine = EchoEngine::new();
        let decision = engine
            .decide(&[], &[], &message("Hello"), Trigger::NewUserInput)
            .await
            .unwrap();
        let Action::ChatResponse { text } = &decision.actions[0] else {
            panic!("expected a chat response");
        };
        assert_eq!(text, "Echo: Hello");
    }

    #[tokio::test]
    async fn task_dispatch_engine_delegates_on_new_input() {
        let engine = TaskDispatchEngine::new("echo", AgentId::try_new("agent_echo").unwrap());
        let decision = engine
            .decide(&[], &[], &message("please echo"), Trigger::NewUserInput)
            .await
            .unwrap();
        assert_eq!(decision.actions.len(), 2);
        assert!(matches!(decision.actions[0], Action::ChatResponse { .. }));
        assert!(matches!(decision.actions[1], Action::TaskRequest { .. }));
    }

    #[tokio::test]
    async fn task_dispatch_engine_synthesizes_on_task_result() {
        let engine = TaskDispatchEngine::new("echo", AgentId::try_new("agent_echo").unwrap());
        let decision = engine
            .decide(&[], &[], &message("please echo"), Trigger::TaskResultReceived)
            .await
            .unwrap();
        assert_eq!(decision.actions.len(), 1);
    }
}
