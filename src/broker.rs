//! Broker service surface — the single entry point wiring the router, task
//! store, subscriber/agent registries, and Cortex behind the contract in
//! §6. A wire transport (gRPC, HTTP, an in-process call) is an adapter
//! layered on top of [`BrokerService`]; this crate ships none.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::config::BrokerConfig;
use crate::cortex::{Cortex, DecisionEngine};
use crate::domain::{
    AgentCard, AgentEvent, AgentId, ArtifactId, EventClass, EventId, EventPayload, Message, Part, Routing, Task,
    TaskId, TaskState, TraceContext,
};
use crate::error::BrokerError;
use crate::registry::{AgentRegistry, SubscriberRegistry, SubscriptionId};
use crate::router::Router;
use crate::state_manager::StateManager;
use crate::task_store::{TaskFilter, TaskStore};
use crate::time_provider::{SharedTimeProvider, production_time_provider};

/// Response shape shared by every §6.1 publish operation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PublishResponse {
    /// Whether the publish was accepted. Per-target fan-out drops never
    /// flip this to `false` (§7): only validation failures do.
    pub success: bool,
    /// An operator-readable message when `success` is `false`.
    pub error: Option<String>,
    /// The id of the event that was fanned out, when `success` is `true`.
    pub event_id: Option<EventId>,
}

impl PublishResponse {
    fn ok(event_id: EventId) -> Self {
        Self {
            success: true,
            error: None,
            event_id: Some(event_id),
        }
    }

    fn err(error: BrokerError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            event_id: None,
        }
    }
}

/// Response to [`BrokerService::register_agent`] (§6.4).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegisterAgentResponse {
    /// Always `true`: registration is idempotent by `agent_id`.
    pub success: bool,
    /// The agent id that was (re-)registered.
    pub agent_id: AgentId,
}

/// A live server-streaming subscription (§6.2). Dropping this value — on
/// stream completion, cancellation, or error — removes and closes the
/// underlying queue in the subscriber registry within one critical
/// section, satisfying the teardown contract without the caller having to
/// remember to unsubscribe explicitly.
pub struct Subscription {
    agent_id: AgentId,
    class: EventClass,
    registry: Arc<SubscriberRegistry>,
    subscription_id: SubscriptionId,
    receiver: mpsc::Receiver<AgentEvent>,
}

impl Subscription {
    /// Receives the next event, or `None` once the broker side has closed
    /// the queue (it never does on its own; this resolves to `None` only
    /// after the subscriber itself disconnects and the receiver is dropped
    /// by something else holding it, which does not happen through this type).
    pub async fn recv(&mut self) -> Option<AgentEvent> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove(self.class, &self.agent_id, self.subscription_id);
    }
}

/// The §6 contract: publish, subscribe, task management, and agent
/// discovery. Implementations are expected to be cheap to clone behind an
/// `Arc` and safe to call from many concurrent tasks.
#[async_trait]
pub trait BrokerService: Send + Sync {
    /// §6.1 `PublishMessage`.
    async fn publish_message(&self, message: Message, routing: Routing, trace_context: Option<TraceContext>) -> PublishResponse;

    /// §6.1 `PublishTaskUpdate`.
    async fn publish_task_update(
        &self,
        task_id: TaskId,
        new_state: TaskState,
        last_update: Option<Message>,
        routing: Routing,
        trace_context: Option<TraceContext>,
    ) -> PublishResponse;

    /// §6.1 `PublishTaskArtifact`.
    #[allow(clippy::too_many_arguments)]
    async fn publish_task_artifact(
        &self,
        task_id: TaskId,
        artifact_id: ArtifactId,
        name: String,
        parts: Vec<Part>,
        append: bool,
        last_chunk: bool,
        routing: Routing,
        trace_context: Option<TraceContext>,
    ) -> PublishResponse;

    /// §6.2 `SubscribeToMessages`.
    ///
    /// # Errors
    /// Returns [`BrokerError::InvalidInput`] if `agent_id` is empty — in
    /// practice unreachable, since [`AgentId`] cannot be constructed empty.
    async fn subscribe_to_messages(&self, agent_id: AgentId) -> Result<Subscription, BrokerError>;

    /// §6.2 `SubscribeToTasks`.
    ///
    /// # Errors
    /// See [`Self::subscribe_to_messages`].
    async fn subscribe_to_tasks(&self, agent_id: AgentId) -> Result<Subscription, BrokerError>;

    /// §6.2 `SubscribeToAgentEvents`.
    ///
    /// # Errors
    /// See [`Self::subscribe_to_messages`].
    async fn subscribe_to_agent_events(&self, agent_id: AgentId) -> Result<Subscription, BrokerError>;

    /// §6.3 `GetTask`.
    ///
    /// # Errors
    /// Returns [`BrokerError::NotFound`] if `task_id` is unknown.
    async fn get_task(&self, task_id: TaskId, history_limit: Option<usize>) -> Result<Task, BrokerError>;

    /// §6.3 `CancelTask`.
    ///
    /// # Errors
    /// Returns [`BrokerError::NotFound`] if `task_id` is unknown, or
    /// [`BrokerError::IllegalState`] if the task is already terminal.
    async fn cancel_task(&self, task_id: TaskId, reason: String) -> Result<Task, BrokerError>;

    /// §6.3 `ListTasks`.
    async fn list_tasks(&self, filter: TaskFilter) -> Vec<Task>;

    /// §6.4 `GetAgentCard`: the broker's own card.
    async fn get_agent_card(&self) -> AgentCard;

    /// §6.4 `RegisterAgent`: idempotent by `agent_id`, broadcasting a
    /// `Registration` event to generic subscribers (§4.5.2).
    async fn register_agent(&self, card: AgentCard) -> RegisterAgentResponse;
}

/// Wires every subsystem together behind [`BrokerService`] and owns
/// Cortex's background message-stream consumer (§2's data-flow: "Cortex is
/// itself a subscriber to the message stream for its own agent id").
pub struct Broker {
    config: BrokerConfig,
    state_manager: Arc<StateManager>,
    registry: Arc<SubscriberRegistry>,
    agent_registry: Arc<AgentRegistry>,
    task_store: Arc<TaskStore>,
    router: Arc<Router>,
    cortex: Arc<Cortex>,
    #[allow(dead_code)]
    time_provider: SharedTimeProvider,
    own_card: AgentCard,
}

impl Broker {
    /// Builds a broker from `config`, wiring router/task-store/registries/
    /// Cortex together and spawning Cortex's own subscriber loop.
    ///
    /// # Errors
    /// Returns [`BrokerError::InvalidInput`] if `config` fails validation.
    #[instrument(skip(config, engine))]
    pub fn try_new(config: BrokerConfig, engine: Arc<dyn DecisionEngine>) -> Result<Arc<Self>, BrokerError> {
        config.validate().map_err(|err| BrokerError::InvalidInput(err.to_string()))?;

        let time_provider = production_time_provider();
        let state_manager = Arc::new(StateManager::new(config.session_map_initial_capacity.into_inner()));
        let registry = Arc::new(SubscriberRegistry::new());
        let agent_registry = Arc::new(AgentRegistry::new());
        let task_store = Arc::new(TaskStore::new(Arc::clone(&time_provider)));
        let router = Arc::new(Router::new(
            Arc::clone(&task_store),
            Arc::clone(&registry),
            Duration::from_millis(config.enqueue_timeout_ms.into_inner()),
            Arc::clone(&time_provider),
        ));

        let cortex_agent_id = AgentId::try_new("cortex").map_err(|err| BrokerError::Internal(err.to_string()))?;
        let cortex = Arc::new(Cortex::new(
            cortex_agent_id.clone(),
            Arc::clone(&state_manager),
            Arc::clone(&router),
            Arc::clone(&agent_registry),
            engine,
        ));

        let (cortex_tx, cortex_rx) = mpsc::channel(config.subscriber_queue_capacity.into_inner());
        registry.add(EventClass::Message, cortex_agent_id.clone(), cortex_tx);
        tokio::spawn(Self::drive_cortex(Arc::clone(&cortex), cortex_agent_id.clone(), cortex_rx));

        let own_card = AgentCard::new(cortex_agent_id, "AgentHub Broker", env!("CARGO_PKG_VERSION"));

        Ok(Arc::new(Self {
            config,
            state_manager,
            registry,
            agent_registry,
            task_store,
            router,
            cortex,
            time_provider,
            own_card,
        }))
    }

    /// Drains Cortex's own message subscription for the life of the
    /// broker, handing each message to [`Cortex::process_message`]. Errors
    /// are logged, not propagated: there is no caller left to surface them
    /// to once the publish that produced the message has already returned
    /// `success=true`.
    ///
    /// A broadcast chat response Cortex itself emitted loops back onto this
    /// same subscription (broadcast delivery ignores subscriber keys); such
    /// self-originated events are skipped here rather than re-processed,
    /// since `execute_action` already appended the response to session
    /// history directly. Without this filter Cortex would react to its own
    /// output forever.
    async fn drive_cortex(cortex: Arc<Cortex>, own_agent_id: AgentId, mut receiver: mpsc::Receiver<AgentEvent>) {
        while let Some(event) = receiver.recv().await {
            if event.routing.from_agent_id == own_agent_id {
                continue;
            }
            if let EventPayload::Message(message) = event.payload {
                if let Err(error) = cortex.process_message(message, CancellationToken::new()).await {
                    tracing::error!(error = %error, "cortex failed to process an inbound message");
                }
            }
        }
    }

    fn subscribe(&self, class: EventClass, agent_id: AgentId) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.config.subscriber_queue_capacity.into_inner());
        let subscription_id = self.registry.add(class, agent_id.clone(), sender);
        Subscription {
            agent_id,
            class,
            registry: Arc::clone(&self.registry),
            subscription_id,
            receiver,
        }
    }
}

#[async_trait]
impl BrokerService for Broker {
    #[instrument(skip(self, message, trace_context))]
    async fn publish_message(&self, message: Message, routing: Routing, trace_context: Option<TraceContext>) -> PublishResponse {
        match self
            .router
            .publish_message(message, routing, trace_context, CancellationToken::new())
            .await
        {
            Ok(event_id) => PublishResponse::ok(event_id),
            Err(error) => PublishResponse::err(error),
        }
    }

    #[instrument(skip(self, last_update, trace_context))]
    async fn publish_task_update(
        &self,
        task_id: TaskId,
        new_state: TaskState,
        last_update: Option<Message>,
        routing: Routing,
        trace_context: Option<TraceContext>,
    ) -> PublishResponse {
        match self
            .router
            .publish_task_update(task_id, new_state, last_update, routing, trace_context, CancellationToken::new())
            .await
        {
            Ok((_task, event_id)) => PublishResponse::ok(event_id),
            Err(error) => PublishResponse::err(error),
        }
    }

    #[instrument(skip(self, parts, trace_context))]
    async fn publish_task_artifact(
        &self,
        task_id: TaskId,
        artifact_id: ArtifactId,
        name: String,
        parts: Vec<Part>,
        append: bool,
        last_chunk: bool,
        routing: Routing,
        trace_context: Option<TraceContext>,
    ) -> PublishResponse {
        match self
            .router
            .publish_task_artifact(
                task_id,
                artifact_id,
                name,
                parts,
                append,
                last_chunk,
                routing,
                trace_context,
                CancellationToken::new(),
            )
            .await
        {
            Ok((_task, event_id)) => PublishResponse::ok(event_id),
            Err(error) => PublishResponse::err(error),
        }
    }

    async fn subscribe_to_messages(&self, agent_id: AgentId) -> Result<Subscription, BrokerError> {
        Ok(self.subscribe(EventClass::Message, agent_id))
    }

    async fn subscribe_to_tasks(&self, agent_id: AgentId) -> Result<Subscription, BrokerError> {
        Ok(self.subscribe(EventClass::Task, agent_id))
    }

    async fn subscribe_to_agent_events(&self, agent_id: AgentId) -> Result<Subscription, BrokerError> {
        Ok(self.subscribe(EventClass::Generic, agent_id))
    }

    async fn get_task(&self, task_id: TaskId, history_limit: Option<usize>) -> Result<Task, BrokerError> {
        Ok(self.task_store.get(&task_id, history_limit)?)
    }

    async fn cancel_task(&self, task_id: TaskId, reason: String) -> Result<Task, BrokerError> {
        let task = self.task_store.cancel(&task_id, &reason)?;
        let routing = Routing::broadcast(self.own_card.agent_id.clone(), "a2a.task.status_update");
        let status_event = AgentEvent::new(
            routing,
            None,
            EventPayload::StatusUpdate(crate::domain::StatusUpdate {
                task_id,
                status: task.status.clone(),
            }),
        );
        self.router.publish_event(status_event, CancellationToken::new()).await;
        Ok(task)
    }

    async fn list_tasks(&self, filter: TaskFilter) -> Vec<Task> {
        self.task_store.list(&filter)
    }

    async fn get_agent_card(&self) -> AgentCard {
        self.own_card.clone()
    }

    #[instrument(skip(self, card))]
    async fn register_agent(&self, card: AgentCard) -> RegisterAgentResponse {
        let agent_id = card.agent_id.clone();
        self.cortex.announce_registration(card, CancellationToken::new()).await;
        RegisterAgentResponse {
            success: true,
            agent_id,
        }
    }
}
