//! Changes: the unit of mutation for entity tables
//!
//! A [`Change`] creates, patches or deletes exactly one entity. The
//! authoritative table consumes them in ticked [`ChangeBatch`]es, overlay
//! layers contribute one change each, and observers receive them as the
//! minimal delta between two states of the same entity.
//!
//! Changes compose:
//! - `Create` replaces whatever was there with a full snapshot
//! - `Update` merges its patch onto an existing entity and has no effect on an
//!   absent one
//! - `Delete` removes the entity regardless of what was below

use crate::time::Tick;
use crate::{Entity, EntityId, Error, Result, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A partial set of field writes against one entity
///
/// `Some(value)` sets the field, `None` clears it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// The entity this patch targets
    pub id: EntityId,
    /// Field writes in the order they were added
    pub fields: IndexMap<String, Option<Value>>,
}

impl Patch {
    /// Create an empty patch for an entity
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            fields: IndexMap::new(),
        }
    }

    /// Builder-style: set a field
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), Some(value.into()));
        self
    }

    /// Builder-style: clear a field
    pub fn clear(mut self, key: impl Into<String>) -> Self {
        self.fields.insert(key.into(), None);
        self
    }

    /// Get the write for a field: `Some(Some(v))` sets, `Some(None)` clears
    pub fn get(&self, key: &str) -> Option<Option<&Value>> {
        self.fields.get(key).map(Option::as_ref)
    }

    /// Check if the patch touches the given field
    pub fn touches(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Check if the patch writes nothing
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fold a later patch into this one; the later write wins per field
    pub fn merge(&mut self, later: &Patch) -> Result<()> {
        if later.id != self.id {
            return Err(Error::EntityMismatch {
                expected: self.id,
                got: later.id,
            });
        }
        for (key, value) in later.fields.iter() {
            self.fields.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

/// A mutation of a single entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change {
    /// Install a full entity snapshot
    Create(Entity),
    /// Merge field writes onto an existing entity
    Update(Patch),
    /// Remove the entity
    Delete(EntityId),
}

impl Change {
    /// A change that writes nothing
    ///
    /// Used as the incoming change when reconciliation is triggered by a
    /// layer disappearing or changing underneath, rather than by the
    /// authoritative table.
    pub fn noop(id: EntityId) -> Self {
        Change::Update(Patch::new(id))
    }

    /// Shorthand for an update built from a patch
    pub fn update(patch: Patch) -> Self {
        Change::Update(patch)
    }

    /// The entity this change targets
    pub fn id(&self) -> EntityId {
        match self {
            Change::Create(entity) => entity.id,
            Change::Update(patch) => patch.id,
            Change::Delete(id) => *id,
        }
    }

    /// Check if this is the no-op change
    pub fn is_noop(&self) -> bool {
        matches!(self, Change::Update(patch) if patch.is_empty())
    }

    /// Short name of the variant, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Change::Create(_) => "create",
            Change::Update(_) => "update",
            Change::Delete(_) => "delete",
        }
    }

    /// Check if the change writes the given field
    ///
    /// Creates and deletes touch every field.
    pub fn touches(&self, key: &str) -> bool {
        match self {
            Change::Update(patch) => patch.touches(key),
            Change::Create(_) | Change::Delete(_) => true,
        }
    }

    /// Apply this change on top of `base`
    ///
    /// Total: an update of an absent entity stays absent, and an update
    /// naming another entity leaves `base` untouched.
    pub fn apply(&self, base: Option<Entity>) -> Option<Entity> {
        match self {
            Change::Create(entity) => Some(entity.clone()),
            Change::Delete(_) => None,
            Change::Update(patch) => base.map(|mut entity| {
                // A patch naming another entity is a no-op.
                let _ = entity.apply_patch(patch);
                entity
            }),
        }
    }
}

/// Combine two consecutive changes to the same entity into one
///
/// Applying the result is equivalent to applying `prior` then `next` to any
/// entity that exists. A `Delete` followed by an `Update` collapses to the
/// update, matching how the authoritative table reports such pairs.
pub fn merge_change(prior: Option<Change>, next: Change) -> Result<Change> {
    let Some(prior) = prior else {
        return Ok(next);
    };
    if prior.id() != next.id() {
        return Err(Error::EntityMismatch {
            expected: prior.id(),
            got: next.id(),
        });
    }
    match (prior, next) {
        (_, next @ (Change::Create(_) | Change::Delete(_))) => Ok(next),
        (Change::Create(mut entity), Change::Update(patch)) => {
            entity.apply_patch(&patch)?;
            Ok(Change::Create(entity))
        }
        (Change::Update(mut earlier), Change::Update(later)) => {
            earlier.merge(&later)?;
            Ok(Change::Update(earlier))
        }
        (Change::Delete(_), next @ Change::Update(_)) => Ok(next),
    }
}

/// An ordered batch of changes stamped with the tick they were produced at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeBatch {
    /// Tick of the batch; entity versions advance to it
    pub tick: Tick,
    /// Changes in application order
    pub changes: Vec<Change>,
}

impl ChangeBatch {
    /// Create an empty batch
    pub fn new(tick: Tick) -> Self {
        Self {
            tick,
            changes: Vec::new(),
        }
    }

    /// Builder-style: append a change
    pub fn with(mut self, change: Change) -> Self {
        self.changes.push(change);
        self
    }

    /// Append a change
    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    /// Ids touched by the batch, in first-touch order without duplicates
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = Vec::with_capacity(self.changes.len());
        for change in self.changes.iter() {
            let id = change.id();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Number of changes in the batch
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Check if the batch is empty
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
