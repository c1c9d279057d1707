//! State Manager — per-session conversation state with per-session locking (§4.1).

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::domain::{ContextId, ConversationState};
use crate::error::BrokerError;

type SessionEntry = Arc<Mutex<ConversationState>>;

/// Owns one `ConversationState` per `ContextId`, each guarded by its own
/// mutex so distinct sessions never contend with one another.
///
/// The session map's own sharded locking serves as the "global reader/writer
/// lock over the session map" from §4.1: finding or inserting an entry
/// never blocks on a different shard, and the per-session mutex is held
/// only for the duration of a single `with_lock` call.
pub struct StateManager {
    sessions: DashMap<ContextId, SessionEntry>,
}

impl StateManager {
    /// Builds an empty state manager, pre-sizing the session map's backing
    /// table with `initial_capacity` as a hint.
    #[must_use]
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            sessions: DashMap::with_capacity(initial_capacity),
        }
    }

    fn entry_for(&self, context_id: &ContextId) -> SessionEntry {
        Arc::clone(
            &self
                .sessions
                .entry(context_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(ConversationState::empty()))),
        )
    }

    /// Returns an immutable snapshot of `context_id`'s state. An unknown
    /// session yields a fresh empty state that is not persisted.
    #[instrument(skip(self))]
    pub async fn get(&self, context_id: &ContextId) -> ConversationState {
        let entry = self.entry_for(context_id);
        let guard = entry.lock().await;
        guard.clone()
    }

    /// Stores `state` as the session's current snapshot, overwriting
    /// whatever was there.
    ///
    /// # Errors
    /// Never fails today; `context_id` non-emptiness is already enforced
    /// by the `ContextId` newtype, so [`BrokerError::InvalidInput`] cannot
    /// currently be produced, but remains in the signature for callers
    /// that construct `ContextId` from unvalidated sources in the future.
    #[instrument(skip(self, state))]
    pub async fn set(&self, context_id: &ContextId, state: ConversationState) -> Result<(), BrokerError> {
        let entry = self.entry_for(context_id);
        let mut guard = entry.lock().await;
        *guard = state;
        Ok(())
    }

    /// Removes a session entirely. Idempotent.
    #[instrument(skip(self))]
    pub async fn delete(&self, context_id: &ContextId) {
        self.sessions.remove(context_id);
    }

    /// Acquires the per-session lock, hands a scratch clone of the current
    /// state to `operation`, and persists the returned state only if
    /// `operation` resolves to `Ok`. On `Err`, the mutation is discarded
    /// and the lock is released with the session untouched (§4.1: "no
    /// partial commit").
    ///
    /// `operation` is async so callers can acquire the lock, mutate, call
    /// out to a decision engine, and publish resulting events all within
    /// one critical section, matching §4.5 step 1-4's "acquire lock ...
    /// release lock" framing.
    ///
    /// # Errors
    /// Propagates whatever error `operation` returns.
    pub async fn with_lock<F, Fut, T, E>(&self, context_id: &ContextId, operation: F) -> Result<T, E>
    where
        F: FnOnce(ConversationState) -> Fut,
        Fut: Future<Output = Result<(T, ConversationState), E>>,
    {
        let entry = self.entry_for(context_id);
        let mut guard = entry.lock().await;
        let scratch = guard.clone();
        match operation(scratch).await {
            Ok((value, new_state)) => {
                *guard = new_state;
                Ok(value)
            }
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_session_yields_fresh_empty_state_without_persisting() {
        let manager = StateManager::new(8);
        let context_id = ContextId::try_new("s1").unwrap();

        let state = manager.get(&context_id).await;
        assert!(state.messages.is_empty());

        let state_again = manager.get(&context_id).await;
        assert!(state_again.messages.is_empty());
    }

    #[tokio::test]
    async fn with_lock_discards_mutations_on_err() {
        let manager = StateManager::new(8);
        let context_id = ContextId::try_new("s1").unwrap();

        let result: Result<(), &str> = manager
            .with_lock(&context_id, |mut state| async move {
                state.registered_agents.clear();
                Err("boom")
            })
            .await;
        assert!(result.is_err());

        let outcome: Result<(), std::convert::Infallible> = manager
            .with_lock(&context_id, |state| async move {
                assert!(state.registered_agents.is_empty());
                Ok(((), state))
            })
            .await;
        outcome.unwrap();
    }

    #[tokio::test]
    async fn with_lock_persists_mutations_on_ok() {
        let manager = StateManager::new(8);
        let context_id = ContextId::try_new("s1").unwrap();
        let ctx_for_closure = context_id.clone();

        let outcome: Result<(), std::convert::Infallible> = manager
            .with_lock(&context_id, move |mut state| async move {
                state.messages.push(crate::domain::Message::new(
                    crate::domain::MessageId::try_new("m1").unwrap(),
                    ctx_for_closure,
                    None,
                    crate::domain::Role::User,
                    vec![crate::domain::Part::text("hi")],
                ));
                Ok(((), state))
            })
            .await;
        outcome.unwrap();

        let state = manager.get(&context_id).await;
        assert_eq!(state.messages.len(), 1);
    }

    #[tokio::test]
    async fn distinct_sessions_do_not_contend() {
        let manager = Arc::new(StateManager::new(8));
        let a = ContextId::try_new("a").unwrap();
        let b = ContextId::try_new("b").unwrap();

        let m1 = Arc::clone(&manager);
        let a1 = a.clone();
        let t1 = tokio::spawn(async move {
            let a2 = a1.clone();
            let _res: Result<(), std::convert::Infallible> = m1
                .with_lock(&a1, move |mut state| async move {
                    state.messages.push(crate::domain::Message::new(
                        crate::domain::MessageId::try_new("a-msg").unwrap(),
                        a2,
                        None,
                        crate::domain::Role::User,
                        vec![crate::domain::Part::text("a")],
                    ));
                    Ok(((), state))
                })
                .await;
        });

        let m2 = Arc::clone(&manager);
        let b1 = b.clone();
        let t2 = tokio::spawn(async move {
            let b2 = b1.clone();
            let _res: Result<(), std::convert::Infallible> = m2
                .with_lock(&b1, move |mut state| async move {
                    state.messages.push(crate::domain::Message::new(
                        crate::domain::MessageId::try_new("b-msg").unwrap(),
                        b2,
                        None,
                        crate::domain::Role::User,
                        vec![crate::domain::Part::text("b")],
                    ));
                    Ok(((), state))
                })
                .await;
        });

        t1.await.unwrap();
        t2.await.unwrap();

        assert_eq!(manager.get(&a).await.messages.len(), 1);
        assert_eq!(manager.get(&b).await.messages.len(), 1);
    }
}
