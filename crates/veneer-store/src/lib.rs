//! Veneer Store - authoritative versioned entity table
//!
//! The authoritative side of a layered table: server-confirmed entities,
//! mutated only by ticked [`ChangeBatch`](veneer_core::ChangeBatch)es, with
//! two-phase notifications for every batch.
//!
//! - [`AuthoritativeStore`]: the seam a layered table reads and forwards to
//! - [`VersionedTable`]: in-memory implementation keeping a per-entity version

mod store;
mod table;

pub use store::{AppliedBatch, AuthoritativeStore};
pub use table::{EntityRecord, VersionedTable};
