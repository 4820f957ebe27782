//! Thread-shareable layered table

use crate::table::LayeredTable;
use std::sync::{Arc, Mutex, MutexGuard};
use veneer_store::{AuthoritativeStore, VersionedTable};

/// A [`LayeredTable`] behind one mutex
///
/// Every entry point runs to completion under the lock, so no thread ever
/// observes a half-applied cascade. Clones share the same table.
pub struct SharedLayeredTable<S: AuthoritativeStore = VersionedTable> {
    inner: Arc<Mutex<LayeredTable<S>>>,
}

impl<S: AuthoritativeStore> SharedLayeredTable<S> {
    pub fn new(table: LayeredTable<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(table)),
        }
    }

    /// Run `f` with exclusive access to the table
    pub fn with<R>(&self, f: impl FnOnce(&mut LayeredTable<S>) -> R) -> R {
        let mut table = self.lock();
        f(&mut table)
    }

    /// Lock the table directly; poisoning is ignored
    pub fn lock(&self) -> MutexGuard<'_, LayeredTable<S>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<S: AuthoritativeStore> Clone for SharedLayeredTable<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: AuthoritativeStore> From<LayeredTable<S>> for SharedLayeredTable<S> {
    fn from(table: LayeredTable<S>) -> Self {
        Self::new(table)
    }
}
