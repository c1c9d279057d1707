//! Cortex — the single conversational reasoning node (§4.5).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use crate::cortex::actions::Action;
use crate::cortex::engine::{DecisionEngine, Trigger};
use crate::domain::{AgentCard, AgentEvent, AgentId, EventPayload, Message, Part, Role, Routing, TaskId};
use crate::error::BrokerError;
use crate::registry::AgentRegistry;
use crate::router::Router;
use crate::state_manager::StateManager;

/// Orchestrates one agent's (Cortex's) view of every session: appends
/// inbound messages to history, consults the decision engine, and executes
/// the actions it returns.
pub struct Cortex {
    agent_id: AgentId,
    state_manager: Arc<StateManager>,
    router: Arc<Router>,
    agent_registry: Arc<AgentRegistry>,
    engine: Arc<dyn DecisionEngine>,
}

impl Cortex {
    /// Builds a Cortex instance identified by `agent_id`, wired to its
    /// collaborators.
    #[must_use]
    pub fn new(
        agent_id: AgentId,
        state_manager: Arc<StateManager>,
        router: Arc<Router>,
        agent_registry: Arc<AgentRegistry>,
        engine: Arc<dyn DecisionEngine>,
    ) -> Self {
        Self {
            agent_id,
            state_manager,
            router,
            agent_registry,
            engine,
        }
    }

    /// Registers an agent's capability card in the broker-wide registry
    /// (§4.5.2). Delivered via the dedicated `AgentEvent::Registration`
    /// class; this core does not additionally scan Message metadata for a
    /// registration marker.
    #[instrument(skip(self, card))]
    pub fn register_agent(&self, card: AgentCard) {
        self.agent_registry.register(card);
    }

    /// Processes one inbound Message addressed to Cortex (§4.5 steps 1-4).
    ///
    /// Acquires the session lock, appends the message, classifies it as a
    /// task result or new user input, consults the decision engine, and
    /// executes each returned action in order. An action failure aborts
    /// the remaining actions; session mutations already committed before
    /// the failure remain in state (no rollback).
    ///
    /// # Errors
    /// Returns [`BrokerError::UnknownAction`] if the engine returns an
    /// action kind outside the closed taxonomy, or
    /// [`BrokerError::EngineError`] only if the engine fails *and* the
    /// fallback response itself cannot be published (engine failures
    /// otherwise degrade to a synthesized chat response, per §4.6).
    #[instrument(skip(self, message, cancellation))]
    pub async fn process_message(&self, message: Message, cancellation: CancellationToken) -> Result<(), BrokerError> {
        let context_id = message.context_id.clone();
        let engine = Arc::clone(&self.engine);
        let agents = self.agent_registry.available_agents();

        let decision_outcome = self
            .state_manager
            .with_lock(&context_id, move |mut state| async move {
                state.push_message(message.clone());

                let trigger = if message.role == Role::Agent && message.task_id.is_some() {
                    if let Some(task_id) = &message.task_id {
                        state.mark_notified(task_id);
                    }
                    Trigger::TaskResultReceived
                } else {
                    Trigger::NewUserInput
                };

                let decision = engine.decide(&state.messages, &agents, &message, trigger).await;
                Ok::<_, std::convert::Infallible>((decision, state))
            })
            .await
            .unwrap_or_else(|infallible: std::convert::Infallible| match infallible {});

        let decision = match decision_outcome {
            Ok(decision) => decision,
            Err(engine_error) => {
                warn!(error = %engine_error, "decision engine failed, falling back to a recovery response");
                crate::cortex::actions::Decision {
                    reasoning: "fallback after engine failure".to_string(),
                    actions: vec![Action::ChatResponse {
                        text: "I had trouble processing that.".to_string(),
                    }],
                }
            }
        };

        for action in decision.actions {
            self.execute_action(&context_id, action, cancellation.clone()).await?;
        }
        Ok(())
    }

    async fn execute_action(
        &self,
        context_id: &crate::domain::ContextId,
        action: Action,
        cancellation: CancellationToken,
    ) -> Result<(), BrokerError> {
        match action {
            Action::ChatResponse { text } => {
                let response = Message::new(
                    crate::domain::MessageId::generate(),
                    context_id.clone(),
                    None,
                    Role::Agent,
                    vec![Part::text(text)],
                );
                self.state_manager
                    .with_lock(context_id, {
                        let response = response.clone();
                        move |mut state| async move {
                            state.push_message(response);
                            Ok::<_, std::convert::Infallible>(((), state))
                        }
                    })
                    .await
                    .unwrap_or_else(|infallible: std::convert::Infallible| match infallible {});

                let routing = Routing::broadcast(self.agent_id.clone(), "a2a.message.chat_response");
                self.router
                    .publish_message(response, routing, None, cancellation)
                    .await
                    .map(|_event_id| ())
            }
            Action::TaskRequest {
                task_type,
                target_agent,
                payload,
            } => {
                let task_id = TaskId::generate();
                let request = Message::new(
                    crate::domain::MessageId::generate(),
                    context_id.clone(),
                    Some(task_id.clone()),
                    Role::Agent,
                    vec![Part::text(payload)],
                );

                self.state_manager
                    .with_lock(context_id, {
                        let request = request.clone();
                        let task_id = task_id.clone();
                        let task_type = task_type.clone();
                        move |mut state| async move {
                            let now = std::time::SystemTime::now();
                            let context = crate::domain::TaskContext::new(task_id.clone(), task_type, request, now);
                            state.pending_tasks.insert(task_id, context);
                            Ok::<_, std::convert::Infallible>(((), state))
                        }
                    })
                    .await
                    .unwrap_or_else(|infallible: std::convert::Infallible| match infallible {});

                let routing = Routing::targeted(self.agent_id.clone(), target_agent, format!("a2a.task.{task_type}"));
                self.router
                    .publish_message(request, routing, None, cancellation)
                    .await
                    .map(|_event_id| ())
            }
        }
    }

    /// Publishes an `AgentEvent::Registration` for `card` through the
    /// router's generic subscriber class, in addition to recording it in
    /// the broker-wide registry.
    #[instrument(skip(self, card, cancellation))]
    pub async fn announce_registration(&self, card: AgentCard, cancellation: CancellationToken) {
        self.register_agent(card.clone());
        let routing = Routing::broadcast(card.agent_id.clone(), "a2a.agent.registration");
        let event = AgentEvent::new(routing, None, EventPayload::Registration(card));
        self.router.publish_event(event, cancellation).await;
    }
}
