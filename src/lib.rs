//! # AgentHub
//!
//! AgentHub is an event-driven broker and orchestration core for
//! conversational multi-agent systems. It gives a single reasoning node
//! ([`cortex::Cortex`]) a durable, concurrent-safe view of every
//! conversation, and gives any number of agents a publish/subscribe surface
//! for exchanging messages, task status, and artifacts without talking to
//! each other directly.
//!
//! ## Architecture
//!
//! The crate is a "functional core, imperative shell": [`domain`] holds
//! plain data with no I/O, and every other module is a narrow slice of
//! state plus the operations that mutate it.
//!
//! - [`state_manager`] — per-session conversation state, one lock per
//!   session so unrelated conversations never contend.
//! - [`registry`] — subscriber queues (who gets fanned-out events) and the
//!   broker-wide table of known agent capability cards.
//! - [`task_store`] — Task lifecycle and artifact accumulation, keyed by
//!   task id.
//! - [`router`] — validates publishes, updates the task store, and fans
//!   events out to subscriber queues with a per-target timeout/cancellation
//!   race.
//! - [`cortex`] — the orchestrator: appends inbound messages to session
//!   history, consults a pluggable [`cortex::DecisionEngine`], and executes
//!   the actions it returns.
//! - [`broker`] — wires the above behind one [`broker::BrokerService`]
//!   trait, the crate's actual entry point. A wire transport (gRPC, HTTP,
//!   an in-process call) is an adapter layered on top of this trait; this
//!   crate ships none.
//! - [`config`] — [`config::BrokerConfig`] and its named presets.
//! - [`observability`] — fan-out outcome counters, logged on drop.
//! - [`time_provider`] — the time abstraction every delay and timestamp in
//!   the crate is taken through, so tests never wait on a real clock.
//! - [`error`] — the crate-wide [`error::BrokerError`] taxonomy.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use agenthub::broker::{Broker, BrokerService};
//! use agenthub::config::BrokerConfig;
//! use agenthub::cortex::EchoEngine;
//! use agenthub::domain::{AgentId, Message, MessageId, ContextId, Role, Routing, Part};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = Broker::try_new(BrokerConfig::development(), Arc::new(EchoEngine::new()))?;
//!
//! let message = Message::new(
//!     MessageId::generate(),
//!     ContextId::try_new("session-1")?,
//!     None,
//!     Role::User,
//!     vec![Part::text("hello")],
//! );
//! let routing = Routing::broadcast(AgentId::try_new("agent_user")?, "a2a.message");
//! let response = broker.publish_message(message, routing, None).await;
//! assert!(response.success);
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod config;
pub mod cortex;
pub mod domain;
pub mod error;
pub mod observability;
pub mod registry;
pub mod router;
pub mod state_manager;
pub mod task_store;
pub mod time_provider;

pub use broker::{Broker, BrokerService, PublishResponse, RegisterAgentResponse, Subscription};
pub use config::BrokerConfig;
pub use error::BrokerError;
