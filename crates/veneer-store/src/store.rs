//! The authoritative store seam
//!
//! Anything that holds server-confirmed entities and applies ticked batches
//! can sit underneath a layered table by implementing [`AuthoritativeStore`].

use veneer_core::{Change, ChangeBatch, Entity, EntityId, Tick};

/// Outcome of applying one batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedBatch {
    /// Tick the batch was stamped with
    pub tick: Tick,
    /// Ids announced before mutation, in first-touch order
    pub ids: Vec<EntityId>,
    /// Changes that actually took effect, in application order
    pub changes: Vec<Change>,
}

impl AppliedBatch {
    /// Check if nothing took effect
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Read and apply access to a versioned, authoritative entity table
pub trait AuthoritativeStore: Send {
    /// Highest tick applied so far
    fn tick(&self) -> Tick;

    /// Current snapshot of an entity
    fn get(&self, id: EntityId) -> Option<&Entity>;

    /// Tick of the last change applied to an entity
    fn version(&self, id: EntityId) -> Option<Tick>;

    /// Number of entities held
    fn len(&self) -> usize;

    /// Check if the store holds no entity
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entity held, in a stable order
    fn entities(&self) -> Box<dyn Iterator<Item = &Entity> + '_>;

    /// Apply a batch, notifying the store's own subscribers
    fn apply(&mut self, batch: &ChangeBatch) -> AppliedBatch;

    /// Drop every entity and reset the tick
    fn clear(&mut self);
}
