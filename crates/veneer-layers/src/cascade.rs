//! Cascade planning
//!
//! Any edit to an entity's layer stack (a layer removed, rewritten in place or
//! inserted) invalidates the assumptions of every layer above it, and an
//! authoritative change invalidates all of them. Planning walks the affected
//! layers bottom-up, asks each one's strategy what to do, and records the
//! outcome on a working copy. Nothing in the [`LayerStack`] is touched until
//! [`StackPlan::commit`], so a failing strategy leaves no trace.

use crate::error::{Error, Result};
use crate::layer::LayerId;
use crate::reconcile::Decision;
use crate::stack::LayerStack;
use tracing::{trace, warn};
use veneer_core::{Change, Entity, EntityId};

/// An edit made by the caller, below which nothing is re-evaluated
#[derive(Debug, Clone)]
pub(crate) enum StackEdit {
    /// The layer leaves the stack
    Remove(LayerId),
    /// The layer keeps its position with a new change
    Replace(LayerId, Change),
    /// The layer joins the stack at its creation position
    Insert(LayerId, Change),
}

/// Resolved outcome for one entity's stack
#[derive(Debug)]
pub(crate) struct StackPlan {
    pub entity: EntityId,
    /// Surviving layers and their changes, in creation order
    pub layers: Vec<(LayerId, Change)>,
    /// Layers whose strategy chose to expire
    pub expired: Vec<LayerId>,
}

impl StackPlan {
    /// Apply the strategies' decisions
    ///
    /// Expired layers leave the stack and every survivor still in it takes
    /// its planned change. Structural edits (removing, inserting or
    /// retargeting a record) stay with the caller.
    pub fn commit(self, stack: &mut LayerStack) {
        trace!(
            entity = %self.entity,
            survivors = self.layers.len(),
            expired = self.expired.len(),
            "cascade committed"
        );
        for id in self.expired.iter() {
            stack.remove(*id);
        }
        for (id, change) in self.layers {
            if let Some(record) = stack.get_mut(id) {
                record.change = change;
            }
        }
    }
}

struct Slot {
    id: LayerId,
    change: Change,
    edited: bool,
}

/// Plan the cascade for one entity
///
/// * `base` - the raw authoritative entity
/// * `edits` - the caller's edits to this entity's stack
/// * `incoming` - the authoritative change, when one triggered the cascade;
///   every layer is then re-evaluated instead of only those above the edits
pub(crate) fn plan(
    stack: &LayerStack,
    entity: EntityId,
    base: Option<&Entity>,
    edits: &[StackEdit],
    incoming: Option<&Change>,
) -> Result<StackPlan> {
    let mut slots: Vec<Slot> = stack
        .on_entity(entity)
        .iter()
        .filter_map(|id| {
            stack.get(*id).map(|record| Slot {
                id: *id,
                change: record.change.clone(),
                edited: false,
            })
        })
        .collect();

    let mut from = slots.len();
    for edit in edits {
        match edit {
            StackEdit::Remove(id) => {
                if let Some(position) = slots.iter().position(|slot| slot.id == *id) {
                    slots.remove(position);
                    from = from.min(position);
                }
            }
            StackEdit::Replace(id, change) => {
                if let Some(position) = slots.iter().position(|slot| slot.id == *id) {
                    slots[position].change = change.clone();
                    slots[position].edited = true;
                    from = from.min(position + 1);
                }
            }
            StackEdit::Insert(id, change) => {
                let position = slots.partition_point(|slot| slot.id < *id);
                slots.insert(
                    position,
                    Slot {
                        id: *id,
                        change: change.clone(),
                        edited: true,
                    },
                );
                from = from.min(position + 1);
            }
        }
    }
    if incoming.is_some() {
        from = 0;
    }

    let noop = Change::noop(entity);
    let incoming = incoming.unwrap_or(&noop);
    let mut expired = Vec::new();
    let mut survivors = Vec::with_capacity(slots.len());

    for (position, slot) in slots.into_iter().enumerate() {
        if position < from || slot.edited {
            survivors.push((slot.id, slot.change));
            continue;
        }
        let Some(record) = stack.get(slot.id) else {
            continue;
        };

        let decision = record
            .reconcile
            .reconcile(base, incoming, &slot.change)
            .map_err(|e| {
                warn!(layer = %slot.id, %entity, error = %e, "reconcile strategy failed");
                Error::violation(slot.id, e.to_string())
            })?;

        match decision {
            Decision::Ignore => {
                trace!(layer = %slot.id, %entity, "reconcile: ignore");
                survivors.push((slot.id, slot.change));
            }
            Decision::Expire => {
                trace!(layer = %slot.id, %entity, "reconcile: expire");
                expired.push(slot.id);
            }
            Decision::Replace(change) => {
                if change.id() != entity {
                    warn!(layer = %slot.id, %entity, other = %change.id(), "replacement targets another entity");
                    return Err(Error::violation(
                        slot.id,
                        format!("replacement targets {} instead of {}", change.id(), entity),
                    ));
                }
                trace!(layer = %slot.id, %entity, kind = change.kind(), "reconcile: replace");
                survivors.push((slot.id, change));
            }
        }
    }

    Ok(StackPlan {
        entity,
        layers: survivors,
        expired,
    })
}
