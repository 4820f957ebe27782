//! Folding layers over the authoritative entity, and diffing the results

use veneer_core::{Change, Entity, EntityId, Patch};

/// Fold a sequence of changes over a base entity
pub fn materialize<'a, I>(base: Option<&Entity>, changes: I) -> Option<Entity>
where
    I: IntoIterator<Item = &'a Change>,
{
    changes
        .into_iter()
        .fold(base.cloned(), |entity, change| change.apply(entity))
}

/// The minimal change turning `before` into `after`
///
/// An entity that is absent afterwards yields `Delete`, one that appears
/// yields `Create`, and otherwise the result is an `Update` holding exactly
/// the fields that differ (cleared fields as `None`), possibly empty.
pub fn diff(id: EntityId, before: Option<&Entity>, after: Option<&Entity>) -> Change {
    match (before, after) {
        (_, None) => Change::Delete(id),
        (None, Some(after)) => Change::Create(after.clone()),
        (Some(before), Some(after)) => {
            let mut patch = Patch::new(id);
            for (key, value) in after.fields.iter() {
                if before.get(key) != Some(value) {
                    patch.fields.insert(key.clone(), Some(value.clone()));
                }
            }
            for key in before.fields.keys() {
                if !after.has(key) {
                    patch.fields.insert(key.clone(), None);
                }
            }
            Change::Update(patch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veneer_core::Value;

    fn taylor() -> Entity {
        Entity::new(EntityId::new(7))
            .with("label", "Taylor")
            .with("position", vec![1i64, 2, 3])
    }

    #[test]
    fn test_materialize_folds_in_order() {
        let id = EntityId::new(7);
        let changes = vec![
            Change::update(Patch::new(id).set("label", "Gordy")),
            Change::update(Patch::new(id).set("connection", Value::empty_map())),
            Change::update(Patch::new(id).set("label", "Joey")),
        ];
        let result = materialize(Some(&taylor()), &changes).unwrap();
        assert_eq!(result.get("label"), Some(&Value::from("Joey")));
        assert!(result.has("connection"));
        assert!(result.has("position"));
    }

    #[test]
    fn test_materialize_delete_then_create() {
        let id = EntityId::new(7);
        let fresh = Entity::new(id).with("label", "fresh");
        let changes = vec![Change::Delete(id), Change::Create(fresh.clone())];
        assert_eq!(materialize(Some(&taylor()), &changes), Some(fresh));
        assert_eq!(materialize(None, &changes[..1]), None);
    }

    #[test]
    fn test_diff_is_minimal() {
        let before = taylor();
        let after = before
            .clone()
            .with("label", "Gordy")
            .with("connection", Value::empty_map());
        let mut after = after;
        after.remove("position");

        assert_eq!(
            diff(before.id, Some(&before), Some(&after)),
            Change::update(
                Patch::new(before.id)
                    .set("label", "Gordy")
                    .set("connection", Value::empty_map())
                    .clear("position")
            )
        );
    }

    #[test]
    fn test_diff_unchanged_is_empty_update() {
        let entity = taylor();
        assert!(diff(entity.id, Some(&entity), Some(&entity)).is_noop());
    }

    #[test]
    fn test_diff_appear_and_disappear() {
        let entity = taylor();
        assert_eq!(
            diff(entity.id, None, Some(&entity)),
            Change::Create(entity.clone())
        );
        assert_eq!(
            diff(entity.id, Some(&entity), None),
            Change::Delete(entity.id)
        );
        assert_eq!(diff(entity.id, None, None), Change::Delete(entity.id));
    }
}
