//! An observer that only ever sees announcements must end up holding exactly
//! the materialized view, whatever mix of batches and layer operations ran.

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use veneer_core::{Change, ChangeBatch, Entity, EntityId, Patch, TableObserver, Tick};
use veneer_layers::{AlwaysExpire, AlwaysIgnore, Decision, EagerOptions, Expiry, LayerId, LayeredTable};
use veneer_store::{AuthoritativeStore, VersionedTable};

const ENTITIES: u64 = 4;

/// `RUST_LOG=veneer_layers=trace` shows every cascade decision of a failing case
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Default)]
struct Mirror {
    entities: Arc<Mutex<BTreeMap<EntityId, Entity>>>,
}

impl Mirror {
    fn get(&self, id: EntityId) -> Option<Entity> {
        self.entities.lock().unwrap().get(&id).cloned()
    }
}

impl TableObserver for Mirror {
    fn pre_apply(&mut self, _ids: &[EntityId]) {}

    fn post_apply(&mut self, _tick: Tick, changes: &[Change]) {
        let mut entities = self.entities.lock().unwrap();
        for change in changes {
            let id = change.id();
            if let Some(entity) = change.apply(entities.remove(&id)) {
                entities.insert(id, entity);
            }
        }
    }

    fn clear(&mut self) {
        self.entities.lock().unwrap().clear();
    }
}

#[derive(Debug, Clone)]
enum Write {
    Create(i64),
    Set(&'static str, i64),
    Clear(&'static str),
    Delete,
}

impl Write {
    fn into_change(self, id: EntityId) -> Change {
        match self {
            Write::Create(n) => Change::Create(Entity::new(id).with("a", n)),
            Write::Set(key, n) => Change::update(Patch::new(id).set(key, n)),
            Write::Clear(key) => Change::update(Patch::new(id).clear(key)),
            Write::Delete => Change::Delete(id),
        }
    }
}

#[derive(Debug, Clone)]
enum Op {
    Batch(u64, Vec<(u64, Write)>),
    Eager(u64, Write, Option<u64>, u8),
    Update(usize, u64, Write),
    Expire(usize),
    Compact(u64),
    Clear,
}

fn key() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("a"), Just("b"), Just("c")]
}

fn write() -> impl Strategy<Value = Write> {
    prop_oneof![
        (0i64..10).prop_map(Write::Create),
        (key(), 0i64..10).prop_map(|(k, n)| Write::Set(k, n)),
        key().prop_map(Write::Clear),
        Just(Write::Delete),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u64..2, prop::collection::vec((0..ENTITIES, write()), 1..4))
            .prop_map(|(delta, changes)| Op::Batch(delta, changes)),
        4 => (0..ENTITIES, write(), prop::option::of(0u64..60), 0u8..3)
            .prop_map(|(id, w, expiry, policy)| Op::Eager(id, w, expiry, policy)),
        2 => (0usize..8, 0..ENTITIES, write()).prop_map(|(i, id, w)| Op::Update(i, id, w)),
        2 => (0usize..8).prop_map(Op::Expire),
        2 => (0u64..70).prop_map(Op::Compact),
        1 => Just(Op::Clear),
    ]
}

fn options(expiry: Option<u64>, policy: u8) -> EagerOptions {
    let options = EagerOptions::new().expires(expiry.map_or(Expiry::Never, Expiry::At));
    match policy {
        0 => options.reconcile(AlwaysIgnore),
        1 => options.reconcile(AlwaysExpire),
        _ => options.reconcile_fn(|_, _, current| {
            Decision::Replace(Change::update(Patch::new(current.id()).set("r", 1i64)))
        }),
    }
}

proptest! {
    #[test]
    fn mirror_converges_to_materialized_view(ops in prop::collection::vec(op(), 1..40)) {
        init_tracing();
        let mut table = LayeredTable::new(VersionedTable::new());
        let mirror = Mirror::default();
        table.subscribe(Box::new(mirror.clone()));
        let mut layers: Vec<LayerId> = Vec::new();

        for op in ops {
            match op {
                Op::Batch(delta, changes) => {
                    let mut batch = ChangeBatch::new(table.tick() + delta);
                    for (id, w) in changes {
                        batch.push(w.into_change(EntityId(id)));
                    }
                    prop_assert!(table.apply(&batch).is_ok());
                }
                Op::Eager(id, w, expiry, policy) => {
                    if let Ok(layer) = table.eager_apply(w.into_change(EntityId(id)), options(expiry, policy)) {
                        layers.push(layer);
                    }
                }
                Op::Update(i, id, w) => {
                    if let Some(layer) = layers.get(i % layers.len().max(1)).copied() {
                        let _ = table.update_layer(layer, w.into_change(EntityId(id)), EagerOptions::new());
                    }
                }
                Op::Expire(i) => {
                    if let Some(layer) = layers.get(i % layers.len().max(1)).copied() {
                        let _ = table.expire_layer(layer);
                        prop_assert!(table.is_expired(layer));
                    }
                }
                Op::Compact(now) => {
                    prop_assert!(table.compact_layers(now).is_ok());
                }
                Op::Clear => table.clear(),
            }

            for id in 0..ENTITIES {
                let id = EntityId(id);
                prop_assert_eq!(mirror.get(id), table.get(id));
            }
        }
    }

    #[test]
    fn expiring_everything_restores_authoritative_view(
        writes in prop::collection::vec((0..ENTITIES, write(), 0u8..3), 1..20)
    ) {
        let mut store = VersionedTable::new();
        let mut seed = ChangeBatch::new(1);
        for id in 0..ENTITIES {
            seed.push(Change::Create(Entity::new(EntityId(id)).with("a", 0i64)));
        }
        store.apply(&seed);

        let mut table = LayeredTable::new(store);
        for (id, w, policy) in writes {
            let _ = table.eager_apply(w.into_change(EntityId(id)), options(Some(10), policy));
        }
        prop_assert!(table.compact_layers(10).is_ok());
        prop_assert_eq!(table.layer_count(), 0);
        for id in 0..ENTITIES {
            let id = EntityId(id);
            prop_assert_eq!(table.get(id), table.store().get(id).cloned());
        }
    }
}
