//! AgentHub broker process entry point.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use agenthub::broker::{Broker, BrokerService};
use agenthub::config::BrokerConfig;
use agenthub::cortex::{DecisionEngine, EchoEngine, TaskDispatchEngine};
use agenthub::domain::AgentId;

/// AgentHub - event-driven broker and orchestration core for multi-agent systems.
#[derive(Parser)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Which configuration preset to start from.
    #[arg(long, value_enum, default_value_t = Preset::Development)]
    preset: Preset,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Preset {
    Development,
    Production,
    Testing,
}

impl Preset {
    fn into_config(self) -> BrokerConfig {
        match self {
            Self::Development => BrokerConfig::development(),
            Self::Production => BrokerConfig::production(),
            Self::Testing => BrokerConfig::testing(),
        }
    }
}

fn build_engine(config: &BrokerConfig) -> Arc<dyn DecisionEngine> {
    match config.engine.as_str() {
        "task_dispatch" => Arc::new(TaskDispatchEngine::new(
            "echo",
            AgentId::try_new("agent_echo").expect("static id is never empty"),
        )),
        _ => Arc::new(EchoEngine::new()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("agenthub=info".parse()?))
        .init();

    let args = Args::parse();
    let config = args.preset.into_config();
    info!(engine = %config.engine, "starting AgentHub broker");

    let engine = build_engine(&config);
    let broker = Broker::try_new(config, engine)?;

    let card = broker.get_agent_card().await;
    let agent_id = card.agent_id.clone();
    broker.register_agent(card).await;
    info!(%agent_id, "broker ready");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}
