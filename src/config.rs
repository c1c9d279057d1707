//! Broker configuration: every tunable in one builder with named presets
//! for development, production, and test deployments (§6.6, §10.3).

use nutype::nutype;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Per-target fan-out deadline, in milliseconds.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 300_000),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, Default),
    default = 5_000
)]
pub struct EnqueueTimeoutMs(u64);

/// Bounded queue depth per subscription.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 1_000_000),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, Default),
    default = 10
)]
pub struct SubscriberQueueCapacity(usize);

/// Pre-sizing hint for the session map.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 1_000_000),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, Default),
    default = 64
)]
pub struct SessionMapInitialCapacity(usize);

/// Complete broker configuration: every row of §6.6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Deadline for delivering one event to one subscriber queue.
    pub enqueue_timeout_ms: EnqueueTimeoutMs,
    /// Depth of each subscriber's bounded mpsc queue.
    pub subscriber_queue_capacity: SubscriberQueueCapacity,
    /// Pre-sizing hint passed to the session map's constructor.
    pub session_map_initial_capacity: SessionMapInitialCapacity,
    /// Selector naming which `DecisionEngine` implementation Cortex uses.
    pub engine: String,
    /// Engine-specific opaque options, passed through unparsed.
    pub engine_options: serde_json::Value,
}

impl BrokerConfig {
    /// Development preset: short timeouts, small queues, verbose tracing
    /// (enabled separately via `RUST_LOG`), echo decision engine.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enqueue_timeout_ms: EnqueueTimeoutMs::try_new(5_000).unwrap(),
            subscriber_queue_capacity: SubscriberQueueCapacity::try_new(10).unwrap(),
            session_map_initial_capacity: SessionMapInitialCapacity::try_new(64).unwrap(),
            engine: "echo".to_string(),
            engine_options: serde_json::Value::Null,
        }
    }

    /// Production preset: larger queues, longer enqueue deadline, task
    /// dispatch engine.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enqueue_timeout_ms: EnqueueTimeoutMs::try_new(10_000).unwrap(),
            subscriber_queue_capacity: SubscriberQueueCapacity::try_new(256).unwrap(),
            session_map_initial_capacity: SessionMapInitialCapacity::try_new(4_096).unwrap(),
            engine: "task_dispatch".to_string(),
            engine_options: serde_json::Value::Null,
        }
    }

    /// Testing preset: tight timeouts and tiny queues so fan-out races
    /// resolve quickly and deterministically under a `MockTimeProvider`.
    #[must_use]
    pub fn testing() -> Self {
        Self {
            enqueue_timeout_ms: EnqueueTimeoutMs::try_new(100).unwrap(),
            subscriber_queue_capacity: SubscriberQueueCapacity::try_new(4).unwrap(),
            session_map_initial_capacity: SessionMapInitialCapacity::try_new(8).unwrap(),
            engine: "echo".to_string(),
            engine_options: serde_json::Value::Null,
        }
    }

    /// Starts a builder seeded with development defaults.
    #[must_use]
    pub fn builder() -> BrokerConfigBuilder {
        BrokerConfigBuilder::new()
    }

    /// Checks cross-field invariants the newtypes alone cannot express.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if `engine` is empty or
    /// `subscriber_queue_capacity` is smaller than would allow at least
    /// one in-flight enqueue per subscriber.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "engine".to_string(),
                reason: "must name a decision engine implementation".to_string(),
            });
        }
        Ok(())
    }

    /// Loads configuration from a JSON file, validating before returning.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read, does not parse,
    /// or fails validation.
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes configuration to a JSON file.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if serialization or the write fails.
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::development()
    }
}

/// Fluent builder for [`BrokerConfig`], seeded with development defaults.
pub struct BrokerConfigBuilder {
    config: BrokerConfig,
}

impl BrokerConfigBuilder {
    /// Starts from development defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: BrokerConfig::development(),
        }
    }

    /// Sets the per-target enqueue deadline.
    #[must_use]
    pub fn enqueue_timeout_ms(mut self, timeout: EnqueueTimeoutMs) -> Self {
        self.config.enqueue_timeout_ms = timeout;
        self
    }

    /// Sets the per-subscription queue capacity.
    #[must_use]
    pub fn subscriber_queue_capacity(mut self, capacity: SubscriberQueueCapacity) -> Self {
        self.config.subscriber_queue_capacity = capacity;
        self
    }

    /// Sets the session map pre-sizing hint.
    #[must_use]
    pub fn session_map_initial_capacity(mut self, capacity: SessionMapInitialCapacity) -> Self {
        self.config.session_map_initial_capacity = capacity;
        self
    }

    /// Selects the decision engine implementation.
    #[must_use]
    pub fn engine(mut self, name: impl Into<String>) -> Self {
        self.config.engine = name.into();
        self
    }

    /// Sets engine-specific opaque options.
    #[must_use]
    pub fn engine_options(mut self, options: serde_json::Value) -> Self {
        self.config.engine_options = options;
        self
    }

    /// Validates and builds the final configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the assembled configuration fails
    /// validation.
    pub fn build(self) -> Result<BrokerConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for BrokerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
