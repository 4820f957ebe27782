//! Entity snapshots

use crate::change::Patch;
use crate::{EntityId, Error, Result, Value, ValueMap};
use serde::{Deserialize, Serialize};

/// A full snapshot of one entity: its id plus every field it currently has
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier for this entity
    pub id: EntityId,
    /// Named fields (e.g., {"label": "Taylor", "position": [1, 2, 3]})
    pub fields: ValueMap,
}

impl Entity {
    /// Create an entity with no fields
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            fields: ValueMap::new(),
        }
    }

    /// Builder-style field setter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Check whether a field is present
    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Set a field value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Remove a field
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    /// Merge a patch onto this entity in place
    ///
    /// Fields set to `Some` are overwritten, fields set to `None` are removed.
    pub fn apply_patch(&mut self, patch: &Patch) -> Result<()> {
        if patch.id != self.id {
            return Err(Error::EntityMismatch {
                expected: self.id,
                got: patch.id,
            });
        }
        for (key, value) in patch.fields.iter() {
            match value {
                Some(value) => {
                    self.fields.insert(key.clone(), value.clone());
                }
                None => {
                    self.fields.shift_remove(key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_fields() {
        let mut entity = Entity::new(EntityId::new(7))
            .with("label", "Taylor")
            .with("position", vec![1i64, 2, 3]);

        assert_eq!(entity.get("label").and_then(|v| v.as_str()), Some("Taylor"));
        assert!(entity.has("position"));

        entity.remove("position");
        assert!(!entity.has("position"));
    }

    #[test]
    fn test_apply_patch_sets_and_clears() {
        let mut entity = Entity::new(EntityId::new(7))
            .with("label", "Taylor")
            .with("connection", Value::empty_map());

        let patch = Patch::new(EntityId::new(7))
            .set("label", "Gordy")
            .clear("connection");
        entity.apply_patch(&patch).unwrap();

        assert_eq!(entity.get("label"), Some(&Value::from("Gordy")));
        assert!(!entity.has("connection"));
    }

    #[test]
    fn test_apply_patch_rejects_other_entity() {
        let mut entity = Entity::new(EntityId::new(7));
        let patch = Patch::new(EntityId::new(8)).set("label", "x");

        assert_eq!(
            entity.apply_patch(&patch),
            Err(Error::EntityMismatch {
                expected: EntityId::new(7),
                got: EntityId::new(8),
            })
        );
        assert!(entity.fields.is_empty());
    }
}
