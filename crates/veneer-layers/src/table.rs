//! The layered table
//!
//! [`LayeredTable`] owns an authoritative store and a stack of eager layers on
//! top of it. Reads always fold the layers over the authoritative entity;
//! nothing materialized is cached. Every mutation, whether it comes from a
//! layer operation, from compaction or from an authoritative batch, is
//! announced to observers as one `pre_apply` with the affected ids followed by
//! one `post_apply` with the minimal delta per id.

use crate::cascade::{self, StackEdit, StackPlan};
use crate::config::LayerConfig;
use crate::error::{Error, Result};
use crate::layer::{EagerOptions, Expiry, LayerId, LayerRecord};
use crate::materialize::{diff, materialize};
use crate::stack::LayerStack;
use indexmap::IndexMap;
use std::fmt;
use tracing::{debug, instrument, warn};
use veneer_core::{
    merge_change, Change, ChangeBatch, Clock, Entity, EntityId, Observers, SubscriptionId,
    SystemClock, TableObserver, Tick,
};
use veneer_store::{AppliedBatch, AuthoritativeStore, VersionedTable};

/// Authoritative store plus eager overlay layers
pub struct LayeredTable<S: AuthoritativeStore = VersionedTable> {
    store: S,
    pub(crate) stack: LayerStack,
    observers: Observers,
    pub(crate) clock: Box<dyn Clock>,
    config: LayerConfig,
}

impl<S: AuthoritativeStore> LayeredTable<S> {
    /// Wrap a store with the default configuration and the system clock
    pub fn new(store: S) -> Self {
        Self::with_config(store, LayerConfig::default())
    }

    /// Wrap a store with an explicit configuration
    pub fn with_config(store: S, config: LayerConfig) -> Self {
        Self {
            store,
            stack: LayerStack::new(),
            observers: Observers::new(),
            clock: Box::new(SystemClock),
            config,
        }
    }

    /// Builder-style: replace the clock used for relative expiries and
    /// [`compact`](Self::compact)
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// The authoritative store underneath
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// Register an observer
    pub fn subscribe(&mut self, observer: Box<dyn TableObserver>) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    /// Remove an observer; returns false if it was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    // ---- reads ----

    /// Highest authoritative tick applied
    pub fn tick(&self) -> Tick {
        self.store.tick()
    }

    /// Materialized entity: the authoritative entity with every layer applied
    pub fn get(&self, id: EntityId) -> Option<Entity> {
        self.materialized(id, None)
    }

    /// Authoritative version of an entity together with its materialized view
    pub fn get_with_version(&self, id: EntityId) -> (Option<Tick>, Option<Entity>) {
        (self.store.version(id), self.get(id))
    }

    /// Check if an entity is materialized
    pub fn has(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Every materialized entity
    ///
    /// Authoritative entities come first in store order, followed by entities
    /// that exist only because a layer created them.
    pub fn entities(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self
            .store
            .entities()
            .filter_map(|entity| self.get(entity.id))
            .collect();
        for id in self.stack.entities() {
            if self.store.get(id).is_none() {
                if let Some(entity) = self.get(id) {
                    entities.push(entity);
                }
            }
        }
        entities
    }

    /// Number of materialized entities
    pub fn len(&self) -> usize {
        self.entities().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of authoritative entities
    pub fn record_size(&self) -> usize {
        self.store.len()
    }

    /// Number of active layers
    pub fn layer_count(&self) -> usize {
        self.stack.len()
    }

    /// Active layers on an entity, in creation order
    pub fn layers_on(&self, id: EntityId) -> Vec<LayerId> {
        self.stack.on_entity(id).to_vec()
    }

    /// Check if a handle no longer refers to an active layer
    pub fn is_expired(&self, layer: LayerId) -> bool {
        !self.stack.contains(layer)
    }

    /// Deadline of an active layer; `None` if it never times out or is gone
    pub fn expires_at(&self, layer: LayerId) -> Option<u64> {
        self.stack.get(layer).and_then(|record| record.expires_at)
    }

    /// Change an active layer currently contributes
    pub fn layer_change(&self, layer: LayerId) -> Option<&Change> {
        self.stack.get(layer).map(|record| &record.change)
    }

    /// Entity an active layer currently targets
    pub fn layer_target(&self, layer: LayerId) -> Option<EntityId> {
        self.stack.get(layer).map(|record| record.target)
    }

    /// Resolve an expiry against this table's clock
    pub fn deadline_for(&self, expiry: Expiry) -> Option<u64> {
        expiry.deadline(self.clock.as_ref())
    }

    /// Fold the layers on `id` over its authoritative entity, stopping short
    /// of `below` when given
    pub(crate) fn materialized(&self, id: EntityId, below: Option<LayerId>) -> Option<Entity> {
        let changes = self
            .stack
            .on_entity(id)
            .iter()
            .take_while(|layer| below.map_or(true, |below| **layer < below))
            .filter_map(|layer| self.stack.get(*layer))
            .map(|record| &record.change);
        materialize(self.store.get(id), changes)
    }

    // ---- layer writes ----

    /// Push a new layer on top of the change's target
    #[instrument(level = "debug", skip(self, change, options), fields(target = %change.id()))]
    pub fn eager_apply(&mut self, change: Change, options: EagerOptions) -> Result<LayerId> {
        self.check_target(&change, None)?;

        let expires = options.expires.unwrap_or_else(|| self.config.default_expiry());
        let record = LayerRecord {
            target: change.id(),
            expires_at: expires.deadline(self.clock.as_ref()),
            reconcile: options
                .reconcile
                .unwrap_or_else(|| self.config.default_reconcile.strategy()),
            change,
        };
        let target = record.target;
        let layer = self.stack.allocate_id();

        // A new layer is the highest handle, so nothing sits above it.
        self.announce(&[target], move |stack| stack.insert(layer, record));

        debug!(%layer, %target, layers = self.stack.len(), "eager layer applied");
        Ok(layer)
    }

    /// Replace a layer's change, possibly moving it to another entity
    ///
    /// Options left unset keep the layer's current expiry and strategy.
    #[instrument(level = "debug", skip(self, change, options), fields(target = %change.id()))]
    pub fn update_layer(
        &mut self,
        layer: LayerId,
        change: Change,
        options: EagerOptions,
    ) -> Result<()> {
        let old_target = self
            .stack
            .get(layer)
            .map(|record| record.target)
            .ok_or(Error::UseAfterExpiry(layer))?;
        let new_target = change.id();
        self.check_target(&change, Some(layer))?;

        let expires_at = options
            .expires
            .map(|expiry| expiry.deadline(self.clock.as_ref()));
        let reconcile = options.reconcile;

        if old_target == new_target {
            let plan = self.plan(
                new_target,
                &[StackEdit::Replace(layer, change.clone())],
                None,
            )?;
            self.announce(&[new_target], move |stack| {
                if let Some(record) = stack.get_mut(layer) {
                    record.change = change;
                    if let Some(deadline) = expires_at {
                        record.expires_at = deadline;
                    }
                    if let Some(reconcile) = reconcile {
                        record.reconcile = reconcile;
                    }
                }
                if let Some(Some(deadline)) = expires_at {
                    stack.note_deadline(deadline);
                }
                plan.commit(stack);
            });
            debug!(%layer, target = %new_target, "layer updated in place");
        } else {
            let old_plan = self.plan(old_target, &[StackEdit::Remove(layer)], None)?;
            let new_plan = self.plan(
                new_target,
                &[StackEdit::Insert(layer, change.clone())],
                None,
            )?;
            self.announce(&[old_target, new_target], move |stack| {
                if let Some(mut record) = stack.remove(layer) {
                    old_plan.commit(stack);
                    new_plan.commit(stack);
                    record.target = new_target;
                    record.change = change;
                    if let Some(deadline) = expires_at {
                        record.expires_at = deadline;
                    }
                    if let Some(reconcile) = reconcile {
                        record.reconcile = reconcile;
                    }
                    stack.insert(layer, record);
                }
            });
            debug!(%layer, from = %old_target, to = %new_target, "layer retargeted");
        }
        Ok(())
    }

    /// Remove a layer before its deadline
    #[instrument(level = "debug", skip(self))]
    pub fn expire_layer(&mut self, layer: LayerId) -> Result<()> {
        let target = self
            .stack
            .get(layer)
            .map(|record| record.target)
            .ok_or(Error::UseAfterExpiry(layer))?;
        let plan = self.plan(target, &[StackEdit::Remove(layer)], None)?;
        let cascaded = plan.expired.len();

        self.announce(&[target], move |stack| {
            stack.remove(layer);
            plan.commit(stack);
        });

        debug!(%layer, %target, cascaded, "layer expired");
        Ok(())
    }

    /// Update `layer` if it is still active, otherwise push a new layer
    pub fn eager_apply_on_layer(
        &mut self,
        layer: Option<LayerId>,
        change: Change,
        options: EagerOptions,
    ) -> Result<LayerId> {
        match layer {
            Some(layer) if self.stack.contains(layer) => {
                self.update_layer(layer, change, options)?;
                Ok(layer)
            }
            _ => self.eager_apply(change, options),
        }
    }

    // ---- authoritative writes ----

    /// Apply an authoritative batch and reconcile the layers it touches
    ///
    /// Entities without layers have their applied changes passed through
    /// as-is. For a layered entity, all of its applied changes are merged into
    /// one incoming change, every layer on it is reconciled against the new
    /// authoritative entity, and a single delta replaces the passthrough.
    ///
    /// If a strategy breaks its contract the batch stays applied, every layer
    /// is kept unchanged, the resulting transition is still announced, and
    /// the violation is returned.
    #[instrument(level = "debug", skip(self, batch), fields(tick = batch.tick, changes = batch.len()))]
    pub fn apply(&mut self, batch: &ChangeBatch) -> Result<AppliedBatch> {
        let ids = batch.ids();
        self.observers.pre_apply(&ids);

        let before: IndexMap<EntityId, Option<Entity>> = ids
            .iter()
            .filter(|id| !self.stack.on_entity(**id).is_empty())
            .map(|id| (*id, self.get(*id)))
            .collect();

        let applied = self.store.apply(batch);
        if applied.is_empty() {
            debug!(tick = batch.tick, "authoritative batch had no effect");
            return Ok(applied);
        }

        let mut passthrough: IndexMap<EntityId, Vec<Change>> = IndexMap::new();
        let mut incoming: IndexMap<EntityId, Change> = IndexMap::new();
        let mut outcome = Ok(());
        for change in applied.changes.iter() {
            let id = change.id();
            if before.contains_key(&id) {
                match merge_change(incoming.shift_remove(&id), change.clone()) {
                    Ok(merged) => {
                        incoming.insert(id, merged);
                    }
                    Err(e) => outcome = Err(Error::from(e)),
                }
            } else {
                passthrough.entry(id).or_default().push(change.clone());
            }
        }

        let plans = outcome.and_then(|_| {
            incoming
                .iter()
                .map(|(id, change)| self.plan(*id, &[], Some(change)))
                .collect::<Result<Vec<StackPlan>>>()
        });
        let (plans, violation) = match plans {
            Ok(plans) => (plans, None),
            Err(e) => {
                warn!(tick = batch.tick, error = %e, "reconcile abandoned, layers kept");
                (Vec::new(), Some(e))
            }
        };

        let mut expired = 0;
        for plan in plans {
            expired += plan.expired.len();
            plan.commit(&mut self.stack);
        }

        let mut deltas = Vec::with_capacity(applied.changes.len());
        for id in ids.iter() {
            if let Some(changes) = passthrough.shift_remove(id) {
                deltas.extend(changes);
            } else if incoming.contains_key(id) {
                let old = before.get(id).and_then(Option::as_ref);
                deltas.push(diff(*id, old, self.get(*id).as_ref()));
            }
        }
        self.observers.post_apply(batch.tick, &deltas);

        debug!(
            tick = batch.tick,
            applied = applied.changes.len(),
            reconciled = incoming.len(),
            expired,
            "authoritative batch reconciled"
        );

        match violation {
            Some(e) => Err(e),
            None => Ok(applied),
        }
    }

    /// Empty the store and drop every layer
    ///
    /// Every handle becomes expired. Observers receive `clear` rather than
    /// per-entity deltas.
    #[instrument(level = "debug", skip(self))]
    pub fn clear(&mut self) {
        let layers = self.stack.len();
        self.store.clear();
        self.stack.clear();
        self.observers.clear();
        debug!(layers, "layered table cleared");
    }

    // ---- internals ----

    /// An `Update` needs something to land on
    ///
    /// A new layer lands on the full materialized entity. An updated layer
    /// keeps its creation position, so only what sits below `below` counts.
    fn check_target(&self, change: &Change, below: Option<LayerId>) -> Result<()> {
        if let Change::Update(patch) = change {
            if self.materialized(patch.id, below).is_none() {
                return Err(Error::invalid_target(
                    patch.id,
                    "update targets an entity that does not exist",
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn plan(
        &self,
        entity: EntityId,
        edits: &[StackEdit],
        incoming: Option<&Change>,
    ) -> Result<StackPlan> {
        cascade::plan(&self.stack, entity, self.store.get(entity), edits, incoming)
    }

    /// Snapshot `ids`, announce them, mutate the stack, then announce the
    /// deltas stamped with the current authoritative tick
    pub(crate) fn announce<F>(&mut self, ids: &[EntityId], mutate: F)
    where
        F: FnOnce(&mut LayerStack),
    {
        let before: Vec<Option<Entity>> = ids.iter().map(|id| self.get(*id)).collect();
        self.observers.pre_apply(ids);

        mutate(&mut self.stack);

        let deltas: Vec<Change> = ids
            .iter()
            .zip(before.iter())
            .map(|(id, before)| diff(*id, before.as_ref(), self.get(*id).as_ref()))
            .collect();
        self.observers.post_apply(self.store.tick(), &deltas);
    }
}

impl Default for LayeredTable<VersionedTable> {
    fn default() -> Self {
        Self::new(VersionedTable::new())
    }
}

impl<S: AuthoritativeStore + fmt::Debug> fmt::Debug for LayeredTable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayeredTable")
            .field("store", &self.store)
            .field("layers", &self.stack.len())
            .field("observers", &self.observers.len())
            .field("config", &self.config)
            .finish()
    }
}
