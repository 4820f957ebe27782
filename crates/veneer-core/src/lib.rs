//! Veneer Core - shared data model for layered entity tables
//!
//! This crate provides the types every veneer table speaks:
//! - Entity identifiers and dynamic field values (`EntityId`, `Value`)
//! - Entity snapshots (`Entity`)
//! - Changes and ticked batches (`Change`, `Patch`, `ChangeBatch`)
//! - The two-phase notification contract (`TableObserver`)
//! - Ticks and millisecond clocks (`Tick`, `Clock`)
//!
//! The authoritative table lives in `veneer-store`; the speculative overlay
//! lives in `veneer-layers`.

mod change;
mod entity;
mod error;
mod identity;
pub mod observer;
pub mod time;
mod value;

pub use change::{merge_change, Change, ChangeBatch, Patch};
pub use entity::Entity;
pub use error::{Error, Result};
pub use identity::EntityId;
pub use observer::{EventLog, Observers, SubscriptionId, TableEvent, TableObserver};
pub use time::{Clock, ManualClock, SystemClock, Tick};
pub use value::{Value, ValueMap};
