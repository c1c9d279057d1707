//! End-to-end scenarios against the `Broker` facade.
//!
//! Each test below is the literal scenario from the broker's design notes,
//! reproduced with the exact ids and text it specifies.

use std::sync::Arc;
use std::time::Duration;

use agenthub::broker::{Broker, BrokerService, Subscription};
use agenthub::config::BrokerConfig;
use agenthub::cortex::{Decision, DecisionEngine, EchoEngine, EngineError, TaskDispatchEngine, Trigger};
use agenthub::domain::{
    AgentCard, AgentEvent, AgentId, ContextId, EventPayload, Message, MessageId, Part, Role, Routing, TaskId,
    TaskState,
};
use agenthub::task_store::TaskFilter;
use futures::FutureExt;
use test_log::test;

fn message(message_id: &str, context_id: &str, role: Role, task_id: Option<TaskId>, text: &str) -> Message {
    Message::new(
        MessageId::try_new(message_id).unwrap(),
        ContextId::try_new(context_id).unwrap(),
        task_id,
        role,
        vec![Part::text(text)],
    )
}

fn cortex_id() -> AgentId {
    AgentId::try_new("cortex").unwrap()
}

/// Input routing matching the literal scenarios' "addressed to cortex".
fn addressed_to_cortex(from: &str) -> Routing {
    Routing::targeted(AgentId::try_new(from).unwrap(), cortex_id(), "a2a.message")
}

/// Waits (with a generous bound) for the next event on `feed` matching
/// `predicate`, skipping any others — needed because a broadcast chat
/// response and a targeted task request can both land on a subscriber
/// registered under the task's target agent id.
async fn recv_until<F>(feed: &mut Subscription, mut predicate: F) -> AgentEvent
where
    F: FnMut(&AgentEvent) -> bool,
{
    for _ in 0..8 {
        let event = tokio::time::timeout(Duration::from_secs(1), feed.recv())
            .await
            .expect("event delivered before timeout")
            .expect("channel still open");
        if predicate(&event) {
            return event;
        }
    }
    panic!("no matching event arrived within the retry budget");
}

fn is_task_request(event: &AgentEvent) -> bool {
    matches!(&event.payload, EventPayload::Message(message) if message.task_id.is_some())
}

/// A decision engine that never acts, for tests that exercise pure
/// subscriber fan-out without Cortex's own reaction adding extra events.
#[derive(Debug, Default)]
struct NoopEngine;

#[async_trait::async_trait]
impl DecisionEngine for NoopEngine {
    async fn decide(
        &self,
        _history: &[Message],
        _agents: &[AgentCard],
        _trigger_message: &Message,
        _trigger: Trigger,
    ) -> Result<Decision, EngineError> {
        Ok(Decision {
            reasoning: "no-op engine for fan-out-only tests".to_string(),
            actions: vec![],
        })
    }
}

#[test(tokio::test)]
async fn s1_simple_chat_echo() {
    let broker = Broker::try_new(BrokerConfig::testing(), Arc::new(EchoEngine::new())).unwrap();
    let mut feed = broker
        .subscribe_to_messages(AgentId::try_new("agent_user").unwrap())
        .await
        .unwrap();

    let input = message("m1", "s1", Role::User, None, "Hello");
    let response = broker.publish_message(input, addressed_to_cortex("agent_user"), None).await;
    assert!(response.success);

    let event = tokio::time::timeout(Duration::from_secs(1), feed.recv())
        .await
        .expect("event delivered before timeout")
        .expect("channel still open");
    let EventPayload::Message(reply) = event.payload else {
        panic!("expected a Message payload");
    };
    assert_eq!(event.routing.event_type, "a2a.message.chat_response");
    assert_eq!(event.routing.from_agent_id, cortex_id());
    assert_eq!(reply.text_content(), "Echo: Hello");
}

#[test(tokio::test)]
async fn s2_task_delegation() {
    let target = AgentId::try_new("agent_echo").unwrap();
    let engine = TaskDispatchEngine::new("echo", target.clone());
    let broker = Broker::try_new(BrokerConfig::testing(), Arc::new(engine)).unwrap();

    let mut user_feed = broker
        .subscribe_to_messages(AgentId::try_new("agent_user").unwrap())
        .await
        .unwrap();
    let mut target_feed = broker.subscribe_to_messages(target).await.unwrap();

    let input = message("m1", "s1", Role::User, None, "please echo");
    let response = broker.publish_message(input, addressed_to_cortex("agent_user"), None).await;
    assert!(response.success);

    let chat_event = tokio::time::timeout(Duration::from_secs(1), user_feed.recv())
        .await
        .unwrap()
        .unwrap();
    let EventPayload::Message(chat) = chat_event.payload else {
        panic!("expected a chat response");
    };
    assert_eq!(chat.text_content(), "I'll start the echo task for you.");

    let task_event = recv_until(&mut target_feed, is_task_request).await;
    let EventPayload::Message(task_request) = task_event.payload else {
        panic!("expected a task request message");
    };
    let task_id = task_request.task_id.clone().expect("task request carries a task_id");
    assert_eq!(task_request.context_id, ContextId::try_new("s1").unwrap());

    let task = broker.get_task(task_id, None).await.unwrap();
    assert_eq!(task.status.state, TaskState::Submitted);
    assert_eq!(task.history.len(), 1);
}

#[test(tokio::test)]
async fn s3_task_result_synthesis() {
    let target = AgentId::try_new("agent_echo").unwrap();
    let engine = TaskDispatchEngine::new("echo", target.clone());
    let broker = Broker::try_new(BrokerConfig::testing(), Arc::new(engine)).unwrap();

    let mut user_feed = broker
        .subscribe_to_messages(AgentId::try_new("agent_user").unwrap())
        .await
        .unwrap();
    let mut target_feed = broker.subscribe_to_messages(target).await.unwrap();

    broker
        .publish_message(
            message("m1", "s1", Role::User, None, "please echo"),
            addressed_to_cortex("agent_user"),
            None,
        )
        .await;
    let _chat = tokio::time::timeout(Duration::from_secs(1), user_feed.recv()).await.unwrap();
    let task_event = recv_until(&mut target_feed, is_task_request).await;
    let EventPayload::Message(task_request) = task_event.payload else {
        panic!("expected a task request");
    };
    let task_id = task_request.task_id.clone().unwrap();

    let result = message("m2", "s1", Role::Agent, Some(task_id.clone()), "please echo");
    let routing = Routing::targeted(AgentId::try_new("agent_echo").unwrap(), cortex_id(), "a2a.task.echo");
    let response = broker.publish_message(result, routing, None).await;
    assert!(response.success);

    let synthesis = tokio::time::timeout(Duration::from_secs(1), user_feed.recv())
        .await
        .unwrap()
        .unwrap();
    let EventPayload::Message(completion) = synthesis.payload else {
        panic!("expected a completion chat response");
    };
    assert!(completion.text_content().contains("please echo"));

    let task = broker.get_task(task_id, None).await.unwrap();
    assert_eq!(task.history.len(), 2);
}

#[test(tokio::test)]
async fn s4_broadcast_fan_out() {
    let broker = Broker::try_new(BrokerConfig::testing(), Arc::new(NoopEngine)).unwrap();

    let mut feed_a = broker.subscribe_to_messages(AgentId::try_new("agent_a").unwrap()).await.unwrap();
    let mut feed_b = broker.subscribe_to_messages(AgentId::try_new("agent_b").unwrap()).await.unwrap();

    let input = message("m1", "s1", Role::User, None, "Hello everyone");
    let routing = Routing::broadcast(AgentId::try_new("agent_user").unwrap(), "a2a.message");
    let response = broker.publish_message(input, routing, None).await;
    assert!(response.success);

    assert!(tokio::time::timeout(Duration::from_secs(1), feed_a.recv()).await.unwrap().is_some());
    assert!(tokio::time::timeout(Duration::from_secs(1), feed_b.recv()).await.unwrap().is_some());

    assert!(feed_a.recv().now_or_never().flatten().is_none());
}

#[test(tokio::test)]
async fn s5_slow_consumer_drop() {
    let config = BrokerConfig::builder()
        .enqueue_timeout_ms(agenthub::config::EnqueueTimeoutMs::try_new(50).unwrap())
        .subscriber_queue_capacity(agenthub::config::SubscriberQueueCapacity::try_new(1).unwrap())
        .build()
        .unwrap();
    let broker = Broker::try_new(config, Arc::new(NoopEngine)).unwrap();

    let target = AgentId::try_new("agent_x").unwrap();
    let _subscription = broker.subscribe_to_messages(target.clone()).await.unwrap();
    let caller = AgentId::try_new("agent_user").unwrap();

    // Fill the capacity-1 queue so the next publish has nowhere to go.
    let filler = message("m0", "s1", Role::User, None, "filler");
    broker
        .publish_message(filler, Routing::targeted(caller.clone(), target.clone(), "a2a.message"), None)
        .await;

    let input = message("m1", "s1", Role::User, None, "never read");
    let response = broker
        .publish_message(input, Routing::targeted(caller, target, "a2a.message"), None)
        .await;

    assert!(response.success);
}

#[test(tokio::test)]
async fn s6_cancel_a_running_task() {
    let target = AgentId::try_new("agent_echo").unwrap();
    let engine = TaskDispatchEngine::new("echo", target.clone());
    let broker = Broker::try_new(BrokerConfig::testing(), Arc::new(engine)).unwrap();

    let mut target_feed = broker.subscribe_to_messages(target).await.unwrap();
    let mut task_feed = broker
        .subscribe_to_tasks(AgentId::try_new("agent_user").unwrap())
        .await
        .unwrap();

    broker
        .publish_message(
            message("m1", "s1", Role::User, None, "please echo"),
            addressed_to_cortex("agent_user"),
            None,
        )
        .await;
    let task_event = recv_until(&mut target_feed, is_task_request).await;
    let EventPayload::Message(task_request) = task_event.payload else {
        panic!("expected a task request");
    };
    let task_id = task_request.task_id.clone().unwrap();

    let cancelled = broker.cancel_task(task_id.clone(), "user aborted".to_string()).await.unwrap();
    assert_eq!(cancelled.status.state, TaskState::Cancelled);
    let reason_message = cancelled.status.last_update.as_ref().expect("cancellation stamps a message");
    assert_eq!(reason_message.text_content(), "user aborted");

    let status_event = tokio::time::timeout(Duration::from_secs(1), task_feed.recv())
        .await
        .unwrap()
        .unwrap();
    let EventPayload::StatusUpdate(update) = status_event.payload else {
        panic!("expected a status update");
    };
    assert_eq!(update.status.state, TaskState::Cancelled);

    let err = broker.cancel_task(task_id, "again".to_string()).await.unwrap_err();
    assert!(matches!(err, agenthub::error::BrokerError::IllegalState(_)));
}

#[test(tokio::test)]
async fn list_tasks_filters_by_state() {
    let target = AgentId::try_new("agent_echo").unwrap();
    let engine = TaskDispatchEngine::new("echo", target.clone());
    let broker = Broker::try_new(BrokerConfig::testing(), Arc::new(engine)).unwrap();
    let mut target_feed = broker.subscribe_to_messages(target).await.unwrap();

    broker
        .publish_message(
            message("m1", "s1", Role::User, None, "please echo"),
            addressed_to_cortex("agent_user"),
            None,
        )
        .await;
    let task_event = recv_until(&mut target_feed, is_task_request).await;
    let EventPayload::Message(task_request) = task_event.payload else {
        panic!("expected a task request");
    };
    let task_id = task_request.task_id.clone().unwrap();

    let submitted = broker
        .list_tasks(TaskFilter {
            states: vec![TaskState::Submitted],
            ..Default::default()
        })
        .await;
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].task_id, task_id);

    let completed = broker
        .list_tasks(TaskFilter {
            states: vec![TaskState::Completed],
            ..Default::default()
        })
        .await;
    assert!(completed.is_empty());
}
