//! Subscriber Registry and Agent Registry (§4.2, §4.5.2).
//!
//! Two independent lock domains live in this module: the subscriber tables
//! (who gets fanned-out events) and the agent capability cards (what
//! Cortex reads when framing a decision). Neither is ever held while
//! awaiting the other.

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::domain::{AgentCard, AgentEvent, AgentId, EventClass};

/// Handle identifying one subscription for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    sender: mpsc::Sender<AgentEvent>,
}

/// Maintains the three independent subscriber tables described in §3 and
/// implements the fan-out target computation used by the router.
pub struct SubscriberRegistry {
    message: DashMap<AgentId, Vec<Subscription>>,
    task: DashMap<AgentId, Vec<Subscription>>,
    generic: DashMap<AgentId, Vec<Subscription>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl SubscriberRegistry {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            message: DashMap::new(),
            task: DashMap::new(),
            generic: DashMap::new(),
            next_id: std::sync::atomic::AtomicU64::new(0),
        }
    }

    fn table(&self, class: EventClass) -> &DashMap<AgentId, Vec<Subscription>> {
        match class {
            EventClass::Message => &self.message,
            EventClass::Task => &self.task,
            EventClass::Generic => &self.generic,
        }
    }

    /// Registers `sender` as a subscriber for `class` under `agent_id`.
    /// Returns an id the caller must pass to [`Self::remove`] on teardown.
    pub fn add(&self, class: EventClass, agent_id: AgentId, sender: mpsc::Sender<AgentEvent>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed));
        self.table(class)
            .entry(agent_id)
            .or_default()
            .push(Subscription { id, sender });
        id
    }

    /// Removes the subscription identified by `id` under `agent_id` for
    /// `class`. Idempotent: removing an unknown id is a no-op, never a panic.
    pub fn remove(&self, class: EventClass, agent_id: &AgentId, id: SubscriptionId) {
        let table = self.table(class);
        let Some(mut entry) = table.get_mut(agent_id) else {
            return;
        };
        entry.retain(|sub| sub.id != id);
        let is_empty = entry.is_empty();
        drop(entry);
        if is_empty {
            table.remove(agent_id);
        }
    }

    /// Computes the de-duplicated set of queues that should receive an
    /// event with the given class and optional target, per §4.3's
    /// targeted/broadcast rules. Generic subscribers always receive the
    /// event in addition to class-specific ones.
    #[must_use]
    pub fn snapshot_targets(&self, class: EventClass, to_agent_id: Option<&AgentId>) -> Vec<mpsc::Sender<AgentEvent>> {
        let mut seen = std::collections::HashSet::new();
        let mut targets = Vec::new();

        let mut collect_for = |table: &DashMap<AgentId, Vec<Subscription>>, agent_id: Option<&AgentId>| {
            let push_all = |subs: &[Subscription], seen: &mut std::collections::HashSet<u64>, targets: &mut Vec<_>| {
                for sub in subs {
                    if seen.insert(sub.id.0) {
                        targets.push(sub.sender.clone());
                    }
                }
            };
            match agent_id {
                Some(agent_id) => {
                    if let Some(entry) = table.get(agent_id) {
                        push_all(&entry, &mut seen, &mut targets);
                    }
                }
                None => {
                    for entry in table.iter() {
                        push_all(&entry, &mut seen, &mut targets);
                    }
                }
            }
        };

        collect_for(self.table(class), to_agent_id);
        collect_for(&self.generic, to_agent_id);
        targets
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Broker-wide record of currently known agent capability cards.
///
/// Authoritative source for decision-engine inputs; independent of, and
/// never acquired alongside, a session lock (§4.5.2).
pub struct AgentRegistry {
    cards: DashMap<AgentId, AgentCard>,
}

impl AgentRegistry {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { cards: DashMap::new() }
    }

    /// Records or replaces an agent's capability card.
    pub fn register(&self, card: AgentCard) {
        self.cards.insert(card.agent_id.clone(), card);
    }

    /// Looks up a single card by agent id.
    #[must_use]
    pub fn get(&self, agent_id: &AgentId) -> Option<AgentCard> {
        self.cards.get(agent_id).map(|entry| entry.clone())
    }

    /// A point-in-time snapshot of every known card, used when constructing
    /// decision-engine inputs.
    #[must_use]
    pub fn available_agents(&self) -> Vec<AgentCard> {
        self.cards.iter().map(|entry| entry.value().clone()).collect()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
