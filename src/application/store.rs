//! # Action State Store
//!
//! Ordered, observable map from action id to [`ActionState`].
//! The single source of truth for the UI: every accepted mutation is published
//! on a broadcast channel while the write lock is still held, so observers see
//! events in mutation order.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

use crate::domain::types::{ActionPatch, ActionRecord, ActionState};

const EVENT_CAPACITY: usize = 1024;

/// Published after every mutation.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    pub id: String,
    pub state: ActionState,
}

#[derive(Default)]
struct Entries {
    order: Vec<String>,
    states: HashMap<String, ActionState>,
}

pub struct ActionStore {
    inner: RwLock<Entries>,
    events: broadcast::Sender<StoreEvent>,
}

impl ActionStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: RwLock::new(Entries::default()),
            events,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &ActionState) {
        // No receivers is fine: nobody is watching yet.
        let _ = self.events.send(StoreEvent {
            id: state.id.clone(),
            state: state.clone(),
        });
    }

    /// Registers a pending action. Returns `false` (and changes nothing) if the id exists.
    pub fn register(&self, id: &str, record: ActionRecord) -> bool {
        let mut entries = self.write();
        if entries.states.contains_key(id) {
            tracing::debug!("Action {} already registered, ignoring", id);
            return false;
        }

        let state = ActionState::new(id, record);
        entries.order.push(id.to_string());
        self.publish(&state);
        entries.states.insert(id.to_string(), state);
        true
    }

    /// Merges `patch` into the action's state.
    ///
    /// A status change the lifecycle forbids is dropped with a warning; the
    /// remaining fields are still applied.
    ///
    /// # Panics
    /// If `id` was never registered. Callers only update actions they dispatched.
    pub fn update(&self, id: &str, patch: ActionPatch) -> ActionState {
        let mut entries = self.write();
        let Some(state) = entries.states.get_mut(id) else {
            panic!("action {id} updated before registration");
        };

        Self::apply(state, patch);
        self.publish(state);
        state.clone()
    }

    fn apply(state: &mut ActionState, patch: ActionPatch) {
        if let Some(record) = patch.record {
            state.record = record;
        }
        if let Some(executed) = patch.executed {
            // Never reset once dispatched.
            state.executed |= executed;
        }
        if let Some(update) = patch.update {
            state.update = Some(update);
        }

        let Some(next) = patch.status else {
            return;
        };
        if !state.can_transition(next) {
            tracing::warn!(
                "Ignoring transition {} -> {} for action {}",
                state.status,
                next,
                state.id
            );
            return;
        }

        state.status = next;
        state.provisional = patch.provisional.unwrap_or(false) && next.is_terminal();
        state.error = match next {
            crate::domain::types::ActionStatus::Failed => patch.error.or_else(|| state.error.take()),
            _ => None,
        };
    }

    /// Atomically merges the parser's final record, stores the `update` flag and
    /// marks the action executed. Returns `false` if it was already executed.
    ///
    /// # Panics
    /// If `id` was never registered.
    pub fn commit_dispatch(&self, id: &str, record: ActionRecord, update: Option<bool>) -> bool {
        let mut entries = self.write();
        let Some(state) = entries.states.get_mut(id) else {
            panic!("action {id} dispatched before registration");
        };
        if state.executed {
            return false;
        }

        state.record = record;
        state.update = update;
        state.executed = true;
        self.publish(state);
        true
    }

    pub fn get(&self, id: &str) -> Option<ActionState> {
        self.read().states.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().states.contains_key(id)
    }

    /// Current states in registration order.
    pub fn snapshot(&self) -> Vec<ActionState> {
        let entries = self.read();
        entries
            .order
            .iter()
            .filter_map(|id| entries.states.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events published from now on.
    ///
    /// The channel keeps the last 1024 events. A receiver that falls further
    /// behind gets `RecvError::Lagged` and has missed events: it must call
    /// [`snapshot`](Self::snapshot) again to resynchronise.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Resolves with the first state of `id` that satisfies `predicate`.
    /// Returns `None` if the id is unknown.
    pub async fn wait_for<F>(&self, id: &str, predicate: F) -> Option<ActionState>
    where
        F: Fn(&ActionState) -> bool,
    {
        // Subscribe before checking so no mutation slips between the two.
        let mut rx = self.subscribe();
        let current = self.get(id)?;
        if predicate(&current) {
            return Some(current);
        }

        loop {
            match rx.recv().await {
                Ok(event) if event.id == id && predicate(&event.state) => return Some(event.state),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    let current = self.get(id)?;
                    if predicate(&current) {
                        return Some(current);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Default for ActionStore {
    fn default() -> Self {
        Self::new()
    }
}
