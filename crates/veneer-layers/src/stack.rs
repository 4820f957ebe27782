//! Layer arena plus per-entity index
//!
//! The arena owns every active [`LayerRecord`] keyed by handle. The index maps
//! each entity to the handles targeting it, kept sorted so that iterating a
//! stack visits layers in creation order.

use crate::layer::{LayerId, LayerRecord};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use veneer_core::EntityId;

#[derive(Debug, Default)]
pub(crate) struct LayerStack {
    next_id: u64,
    layers: BTreeMap<LayerId, LayerRecord>,
    by_entity: IndexMap<EntityId, Vec<LayerId>>,
    /// No layer has a deadline earlier than this
    pub low_water_mark: u64,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_id(&mut self) -> LayerId {
        let id = LayerId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn get(&self, id: LayerId) -> Option<&LayerRecord> {
        self.layers.get(&id)
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut LayerRecord> {
        self.layers.get_mut(&id)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.layers.contains_key(&id)
    }

    /// Handles targeting an entity, in creation order
    pub fn on_entity(&self, entity: EntityId) -> &[LayerId] {
        self.by_entity
            .get(&entity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Add a record and index it under its target
    pub fn insert(&mut self, id: LayerId, record: LayerRecord) {
        if let Some(deadline) = record.expires_at {
            self.note_deadline(deadline);
        }
        let handles = self.by_entity.entry(record.target).or_default();
        if let Err(position) = handles.binary_search(&id) {
            handles.insert(position, id);
        }
        self.layers.insert(id, record);
    }

    /// Drop a record and unindex it
    pub fn remove(&mut self, id: LayerId) -> Option<LayerRecord> {
        let record = self.layers.remove(&id)?;
        if let Some(handles) = self.by_entity.get_mut(&record.target) {
            handles.retain(|handle| *handle != id);
            if handles.is_empty() {
                self.by_entity.shift_remove(&record.target);
            }
        }
        Some(record)
    }

    /// Remember a deadline so compaction will not skip it
    pub fn note_deadline(&mut self, deadline: u64) {
        self.low_water_mark = self.low_water_mark.min(deadline);
    }

    /// Active records in creation order
    pub fn iter(&self) -> impl Iterator<Item = (LayerId, &LayerRecord)> {
        self.layers.iter().map(|(id, record)| (*id, record))
    }

    /// Entities with at least one layer, in first-layered order
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.by_entity.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Drop every record; handles stay unique
    pub fn clear(&mut self) {
        self.layers.clear();
        self.by_entity.clear();
        self.low_water_mark = 0;
    }
}
