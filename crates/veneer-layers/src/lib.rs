//! Veneer Layers - speculative overlays on an authoritative entity table
//!
//! A client that acts before the server confirms needs its guesses visible
//! immediately, but without losing track of what the server actually said.
//! This crate keeps the two apart:
//!
//! - **Eager layers**: each layer contributes one change to one entity and
//!   stacks on top of the authoritative value in creation order
//! - **Expiry**: layers time out at a deadline (`compact_layers`) or are
//!   expired explicitly
//! - **Reconciliation**: when the authoritative entity changes, or a lower
//!   layer disappears, each affected layer's strategy decides to keep,
//!   replace or drop it
//! - **Minimal deltas**: observers see one `pre_apply`/`post_apply` pair per
//!   mutation, with exactly the fields that changed
//!
//! # Architecture
//!
//! ```text
//!            ┌────────────────────────────────────────┐
//!  eager ───▶│ LayerStack   layer 0 ▶ layer 1 ▶ ...    │
//!  apply     │                 ▲ cascade (bottom-up)  │──▶ get(id) = fold
//!            ├─────────────────┼──────────────────────┤
//!  batch ───▶│ AuthoritativeStore (VersionedTable)    │
//!            └────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                 observers: pre_apply / post_apply
//! ```
//!
//! # Example
//!
//! ```rust
//! use veneer_core::{Change, ChangeBatch, Entity, EntityId, Patch};
//! use veneer_layers::{AlwaysIgnore, EagerOptions, Expiry, LayeredTable};
//! use veneer_store::VersionedTable;
//!
//! let id = EntityId::new(7);
//! let mut table = LayeredTable::new(VersionedTable::new());
//! table
//!     .apply(&ChangeBatch::new(1).with(Change::Create(Entity::new(id).with("label", "Taylor"))))
//!     .unwrap();
//!
//! let layer = table
//!     .eager_apply(
//!         Change::update(Patch::new(id).set("label", "Gordy")),
//!         EagerOptions::new().expires(Expiry::At(10)).reconcile(AlwaysIgnore),
//!     )
//!     .unwrap();
//! assert_eq!(table.get(id).unwrap().get("label").unwrap().as_str(), Some("Gordy"));
//!
//! table.compact_layers(10).unwrap();
//! assert!(table.is_expired(layer));
//! assert_eq!(table.get(id).unwrap().get("label").unwrap().as_str(), Some("Taylor"));
//! ```

mod cascade;
mod compact;
mod config;
mod error;
mod layer;
pub mod materialize;
mod reconcile;
mod shared;
mod stack;
mod table;

pub use config::{LayerConfig, ReconcilePolicy};
pub use error::{Error, Result};
pub use layer::{EagerOptions, Expiry, LayerId};
pub use reconcile::{AlwaysExpire, AlwaysIgnore, Decision, Reconcile, ReconcileError, TryReconcile};
pub use shared::SharedLayeredTable;
pub use table::LayeredTable;
