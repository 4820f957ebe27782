//! In-memory versioned entity table

use crate::store::{AppliedBatch, AuthoritativeStore};
use indexmap::IndexMap;
use tracing::{debug, trace};
use veneer_core::{
    Change, ChangeBatch, Entity, EntityId, Observers, SubscriptionId, TableObserver, Tick,
};

/// One stored entity plus the tick of the last change applied to it
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    /// Tick of the last applied change
    pub version: Tick,
    /// Current snapshot
    pub entity: Entity,
}

/// Authoritative entity table mutated only through ticked batches
///
/// A change whose batch tick is older than the entity's version is skipped,
/// so replays and out-of-order deliveries never move an entity backwards.
#[derive(Debug, Default)]
pub struct VersionedTable {
    tick: Tick,
    records: IndexMap<EntityId, EntityRecord>,
    observers: Observers,
}

impl VersionedTable {
    /// Create an empty table at tick 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for this table's own notifications
    pub fn subscribe(&mut self, observer: Box<dyn TableObserver>) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    /// Remove an observer
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Get an entity together with its version
    pub fn record(&self, id: EntityId) -> Option<&EntityRecord> {
        self.records.get(&id)
    }

    /// Install a snapshot (or its absence) at a given version
    ///
    /// Returns false, without notifying anyone, if the table already holds a
    /// newer version of the entity.
    pub fn load(&mut self, id: EntityId, version: Tick, entity: Option<Entity>) -> bool {
        if let Some(existing) = self.records.get(&id) {
            if existing.version > version {
                trace!(%id, version, current = existing.version, "stale load skipped");
                return false;
            }
        }

        self.observers.pre_apply(&[id]);
        self.tick = self.tick.max(version);

        match entity {
            Some(entity) => {
                let change = Change::Create(entity.clone());
                self.records.insert(id, EntityRecord { version, entity });
                self.observers.post_apply(version, &[change]);
            }
            None => {
                if self.records.shift_remove(&id).is_some() {
                    self.observers.post_apply(version, &[Change::Delete(id)]);
                }
            }
        }
        true
    }

    fn apply_one(&mut self, tick: Tick, change: &Change) -> bool {
        let id = change.id();
        if let Some(existing) = self.records.get(&id) {
            if existing.version > tick {
                trace!(%id, tick, current = existing.version, "stale change skipped");
                return false;
            }
        }

        match change {
            Change::Create(entity) => {
                self.records.insert(
                    id,
                    EntityRecord {
                        version: tick,
                        entity: entity.clone(),
                    },
                );
                true
            }
            Change::Delete(_) => self.records.shift_remove(&id).is_some(),
            Change::Update(patch) => match self.records.get_mut(&id) {
                Some(record) => {
                    if record.entity.apply_patch(patch).is_err() {
                        return false;
                    }
                    record.version = tick;
                    true
                }
                None => {
                    trace!(%id, "update of absent entity skipped");
                    false
                }
            },
        }
    }
}

impl AuthoritativeStore for VersionedTable {
    fn tick(&self) -> Tick {
        self.tick
    }

    fn get(&self, id: EntityId) -> Option<&Entity> {
        self.records.get(&id).map(|record| &record.entity)
    }

    fn version(&self, id: EntityId) -> Option<Tick> {
        self.records.get(&id).map(|record| record.version)
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn entities(&self) -> Box<dyn Iterator<Item = &Entity> + '_> {
        Box::new(self.records.values().map(|record| &record.entity))
    }

    fn apply(&mut self, batch: &ChangeBatch) -> AppliedBatch {
        let ids = batch.ids();
        self.observers.pre_apply(&ids);
        self.tick = self.tick.max(batch.tick);

        let mut applied = Vec::with_capacity(batch.len());
        for change in batch.changes.iter() {
            if self.apply_one(batch.tick, change) {
                applied.push(change.clone());
            }
        }

        debug!(
            tick = batch.tick,
            received = batch.len(),
            applied = applied.len(),
            "authoritative batch applied"
        );

        if !applied.is_empty() {
            self.observers.post_apply(batch.tick, &applied);
        }

        AppliedBatch {
            tick: batch.tick,
            ids,
            changes: applied,
        }
    }

    fn clear(&mut self) {
        self.records.clear();
        self.tick = 0;
        self.observers.clear();
    }
}
