//! Router — turns validated publishes into task-store updates and fan-out
//! deliveries to subscriber queues (§4.3).

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::domain::{
    AgentEvent, ArtifactId, EventId, EventPayload, Message, Part, Routing, Task, TaskId, TaskState, TraceContext,
};
use crate::error::{BrokerError, RouterError};
use crate::observability::{DropReason, RouterStats};
use crate::registry::SubscriberRegistry;
use crate::task_store::TaskStore;
use crate::time_provider::SharedTimeProvider;

enum DeliveryOutcome {
    Delivered,
    Dropped(DropReason),
}

/// Validates publishes, mutates the task store, and fans events out to
/// subscriber queues. Holds no session state of its own.
pub struct Router {
    task_store: Arc<TaskStore>,
    registry: Arc<SubscriberRegistry>,
    stats: Arc<RouterStats>,
    enqueue_timeout: Duration,
    time_provider: SharedTimeProvider,
}

impl Router {
    /// Builds a router over an existing task store and subscriber registry.
    #[must_use]
    pub fn new(
        task_store: Arc<TaskStore>,
        registry: Arc<SubscriberRegistry>,
        enqueue_timeout: Duration,
        time_provider: SharedTimeProvider,
    ) -> Self {
        Self {
            task_store,
            registry,
            stats: Arc::new(RouterStats::new()),
            enqueue_timeout,
            time_provider,
        }
    }

    /// Read access to the fan-out counters, for health and metrics surfaces.
    #[must_use]
    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }

    /// Validates and publishes a Message, updating the task store when the
    /// message carries a `task_id`, then fans the resulting event out.
    ///
    /// Returns the id of the event that was fanned out, for callers (the
    /// §6.1 broker facade) that surface `event_id` on their response.
    ///
    /// # Errors
    /// Returns [`BrokerError::InvalidInput`] if `content` is empty.
    #[instrument(skip(self, message, trace_context, cancellation))]
    pub async fn publish_message(
        &self,
        message: Message,
        routing: Routing,
        trace_context: Option<TraceContext>,
        cancellation: CancellationToken,
    ) -> Result<EventId, BrokerError> {
        if message.content.is_empty() {
            return Err(RouterError::InvalidInput("message content must have at least one part".to_string()).into());
        }

        if let Some(task_id) = message.task_id.clone() {
            if self.task_store.get(&task_id, None).is_ok() {
                self.task_store.append_message(&task_id, message.clone())?;
            } else {
                self.task_store.create(task_id, message.context_id.clone(), message.clone())?;
            }
        }

        let event = AgentEvent::new(routing, trace_context, EventPayload::Message(message));
        Ok(self.fan_out(event, cancellation).await)
    }

    /// Validates and publishes a task status transition.
    ///
    /// # Errors
    /// Returns [`BrokerError::NotFound`] if `task_id` is unknown, or
    /// [`BrokerError::IllegalState`] if the task is already terminal.
    #[instrument(skip(self, last_update, trace_context, cancellation))]
    pub async fn publish_task_update(
        &self,
        task_id: TaskId,
        new_state: TaskState,
        last_update: Option<Message>,
        routing: Routing,
        trace_context: Option<TraceContext>,
        cancellation: CancellationToken,
    ) -> Result<(Task, EventId), BrokerError> {
        let task = self.task_store.transition(&task_id, new_state, last_update.clone())?;

        let payload = EventPayload::StatusUpdate(crate::domain::StatusUpdate {
            task_id,
            status: task.status.clone(),
        });
        let event = AgentEvent::new(routing, trace_context, payload);
        let event_id = self.fan_out(event, cancellation).await;
        Ok((task, event_id))
    }

    /// Validates and publishes an artifact replace-or-append.
    ///
    /// # Errors
    /// Returns [`BrokerError::NotFound`] if `task_id` is unknown.
    #[instrument(skip(self, parts, trace_context, cancellation))]
    #[allow(clippy::too_many_arguments)]
    pub async fn publish_task_artifact(
        &self,
        task_id: TaskId,
        artifact_id: ArtifactId,
        name: String,
        parts: Vec<Part>,
        append: bool,
        last_chunk: bool,
        routing: Routing,
        trace_context: Option<TraceContext>,
        cancellation: CancellationToken,
    ) -> Result<(Task, EventId), BrokerError> {
        let task = self
            .task_store
            .upsert_artifact(&task_id, artifact_id.clone(), name.clone(), parts.clone(), append)?;
        let artifact = task
            .artifacts
            .iter()
            .find(|artifact| artifact.artifact_id == artifact_id)
            .cloned()
            .expect("upsert_artifact guarantees the artifact is present");

        let payload = EventPayload::ArtifactUpdate(crate::domain::ArtifactUpdate {
            task_id,
            artifact_id,
            artifact,
            append,
            last_chunk,
        });
        let event = AgentEvent::new(routing, trace_context, payload);
        let event_id = self.fan_out(event, cancellation).await;
        Ok((task, event_id))
    }

    /// Publishes a pre-built event directly, bypassing task-store
    /// interaction. Used for `AgentEvent::Registration` notifications,
    /// which carry no task semantics (§4.5.2).
    #[instrument(skip(self, event, cancellation))]
    pub async fn publish_event(&self, event: AgentEvent, cancellation: CancellationToken) -> EventId {
        self.fan_out(event, cancellation).await
    }

    /// Computes fan-out targets and races each target's enqueue against the
    /// configured deadline and the caller's cancellation signal, one
    /// `tokio::spawn`ed task per target so a slow consumer cannot delay
    /// delivery to others. A second supervising task per target captures
    /// panics via the inner task's `JoinHandle` (§4.3, §9). Returns the
    /// fanned-out event's id regardless of how many targets ultimately
    /// received it.
    async fn fan_out(&self, event: AgentEvent, cancellation: CancellationToken) -> EventId {
        let event_id = event.event_id;
        let class = event.payload.class();
        let targets = self.registry.snapshot_targets(class, event.routing.to_agent_id.as_ref());

        if targets.is_empty() {
            self.stats.record_no_subscriber();
            return event_id;
        }

        let mut supervisors = Vec::with_capacity(targets.len());
        for target in targets {
            let event = event.clone();
            let cancellation = cancellation.clone();
            let timeout = self.enqueue_timeout;
            let time_provider = Arc::clone(&self.time_provider);

            let delivery = tokio::spawn(async move {
                tokio::select! {
                    biased;
                    () = cancellation.cancelled() => DeliveryOutcome::Dropped(DropReason::ContextCancelled),
                    send_result = target.send(event) => match send_result {
                        Ok(()) => DeliveryOutcome::Delivered,
                        Err(_) => DeliveryOutcome::Dropped(DropReason::Closed),
                    },
                    () = time_provider.sleep(timeout) => DeliveryOutcome::Dropped(DropReason::Timeout),
                }
            });

            let stats = Arc::clone(&self.stats);
            supervisors.push(tokio::spawn(async move {
                match delivery.await {
                    Ok(DeliveryOutcome::Delivered) => stats.record_delivered(),
                    Ok(DeliveryOutcome::Dropped(reason)) => stats.record_dropped(reason),
                    Err(join_error) => {
                        if join_error.is_panic() {
                            stats.record_dropped(DropReason::Panic);
                        }
                    }
                }
            }));
        }

        for supervisor in supervisors {
            let _ = supervisor.await;
        }
        event_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentId, ContextId, EventClass, MessageId, Role};
    use crate::time_provider::test_time_provider;

    fn router() -> (Router, Arc<SubscriberRegistry>) {
        let registry = Arc::new(SubscriberRegistry::new());
        let task_store = Arc::new(TaskStore::new(test_time_provider()));
        let router = Router::new(
            Arc::clone(&task_store),
            Arc::clone(&registry),
            Duration::from_millis(50),
            test_time_provider(),
        );
        (router, registry)
    }

    fn message(task_id: Option<TaskId>) -> Message {
        Message::new(
            MessageId::try_new("m1").unwrap(),
            ContextId::try_new("s1").unwrap(),
            task_id,
            Role::User,
            vec![Part::text("hello")],
        )
    }

    #[tokio::test]
    async fn empty_content_is_rejected_before_any_side_effect() {
        let (router, _registry) = router();
        let mut msg = message(None);
        msg.content.clear();
        let err = router
            .publish_message(
                msg,
                Routing::broadcast(AgentId::try_new("cortex").unwrap(), "a2a.message"),
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn publish_with_fresh_task_id_creates_a_task() {
        let (router, _registry) = router();
        let task_id = TaskId::try_new("t1").unwrap();
        router
            .publish_message(
                message(Some(task_id.clone())),
                Routing::broadcast(AgentId::try_new("cortex").unwrap(), "a2a.task.request"),
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        let task = router.task_store.get(&task_id, None).unwrap();
        assert_eq!(task.status.state, TaskState::Submitted);
        assert_eq!(task.history.len(), 1);
    }

    #[tokio::test]
    async fn no_subscriber_increments_counter_without_error() {
        let (router, _registry) = router();
        router
            .publish_message(
                message(None),
                Routing::broadcast(AgentId::try_new("cortex").unwrap(), "a2a.message"),
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(router.stats().no_subscriber_count(), 1);
    }

    #[tokio::test]
    async fn slow_consumer_drops_on_timeout_without_blocking_delivery_to_others() {
        let (router, registry) = router();
        let agent_id = AgentId::try_new("cortex").unwrap();

        // Capacity-1 queue that is never drained: the single slot fills
        // immediately and the send blocks until the enqueue timeout fires.
        let (slow_tx, _slow_rx) = tokio::sync::mpsc::channel(1);
        slow_tx.try_send(make_event(&agent_id)).unwrap();
        registry.add(EventClass::Message, agent_id.clone(), slow_tx);

        let (fast_tx, mut fast_rx) = tokio::sync::mpsc::channel(4);
        registry.add(EventClass::Message, AgentId::try_new("other").unwrap(), fast_tx);

        router
            .publish_message(
                message(None),
                Routing::broadcast(agent_id, "a2a.message"),
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(fast_rx.try_recv().is_ok());
        assert_eq!(router.stats().dropped(DropReason::Timeout), 1);
        assert_eq!(router.stats().delivered(), 1);
    }

    #[tokio::test]
    async fn cancellation_drops_the_target_without_delaying_other_targets() {
        let (router, registry) = router();
        let agent_id = AgentId::try_new("cortex").unwrap();

        let (blocked_tx, _blocked_rx) = tokio::sync::mpsc::channel(1);
        blocked_tx.try_send(make_event(&agent_id)).unwrap();
        registry.add(EventClass::Message, agent_id.clone(), blocked_tx);

        let token = CancellationToken::new();
        token.cancel();

        router
            .publish_message(
                message(None),
                Routing::broadcast(agent_id, "a2a.message"),
                None,
                token,
            )
            .await
            .unwrap();

        assert_eq!(router.stats().dropped(DropReason::ContextCancelled), 1);
    }

    fn make_event(agent_id: &AgentId) -> AgentEvent {
        AgentEvent::new(
            Routing::broadcast(agent_id.clone(), "a2a.message"),
            None,
            EventPayload::Message(message(None)),
        )
    }
}
