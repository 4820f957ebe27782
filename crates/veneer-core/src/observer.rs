//! Two-phase change notifications
//!
//! Every table in the workspace announces each mutation twice:
//!
//! 1. `pre_apply` with the ids about to change, before anything is mutated,
//!    so an index can drop its entries for them while the old state is still
//!    readable
//! 2. `post_apply` with the concrete changes that moved the visible state,
//!    stamped with a tick, after the mutation completed
//!
//! A structure that follows these notifications stays in sync with the table
//! without rescanning it.

use crate::time::Tick;
use crate::{Change, EntityId};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Receiver of table notifications
pub trait TableObserver: Send {
    /// The listed entities are about to change
    fn pre_apply(&mut self, ids: &[EntityId]);

    /// The listed changes were applied at `tick`
    fn post_apply(&mut self, tick: Tick, changes: &[Change]);

    /// The table was emptied
    fn clear(&mut self) {}
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Fan-out list of observers owned by a table
#[derive(Default)]
pub struct Observers {
    next_id: u64,
    entries: Vec<(SubscriptionId, Box<dyn TableObserver>)>,
}

impl Observers {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer
    pub fn subscribe(&mut self, observer: Box<dyn TableObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, observer));
        id
    }

    /// Remove an observer; returns false if it was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    /// Number of registered observers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nobody is listening
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Announce ids about to change
    pub fn pre_apply(&mut self, ids: &[EntityId]) {
        for (_, observer) in self.entries.iter_mut() {
            observer.pre_apply(ids);
        }
    }

    /// Announce applied changes
    pub fn post_apply(&mut self, tick: Tick, changes: &[Change]) {
        for (_, observer) in self.entries.iter_mut() {
            observer.post_apply(tick, changes);
        }
    }

    /// Announce that the table was emptied
    pub fn clear(&mut self) {
        for (_, observer) in self.entries.iter_mut() {
            observer.clear();
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.entries.len())
            .finish()
    }
}

/// One recorded notification
#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent {
    /// `pre_apply` was called with these ids
    PreApply(Vec<EntityId>),
    /// `post_apply` was called with these changes
    PostApply { tick: Tick, changes: Vec<Change> },
    /// `clear` was called
    Clear,
}

/// Observer that records every notification
///
/// Clones share the same log: subscribe one clone and read from another.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<TableEvent>>>,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<TableEvent> {
        self.lock().clone()
    }

    /// Arguments of every `pre_apply` call, in order
    pub fn pre_apply_calls(&self) -> Vec<Vec<EntityId>> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                TableEvent::PreApply(ids) => Some(ids.clone()),
                _ => None,
            })
            .collect()
    }

    /// Arguments of every `post_apply` call, in order
    pub fn post_apply_calls(&self) -> Vec<(Tick, Vec<Change>)> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                TableEvent::PostApply { tick, changes } => Some((*tick, changes.clone())),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded notifications
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget everything recorded so far
    pub fn reset(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TableEvent>> {
        // A panicking observer elsewhere must not hide the log.
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TableObserver for EventLog {
    fn pre_apply(&mut self, ids: &[EntityId]) {
        self.lock().push(TableEvent::PreApply(ids.to_vec()));
    }

    fn post_apply(&mut self, tick: Tick, changes: &[Change]) {
        self.lock().push(TableEvent::PostApply {
            tick,
            changes: changes.to_vec(),
        });
    }

    fn clear(&mut self) {
        self.lock().push(TableEvent::Clear);
    }
}
