//! Layer handles, expiry requests and per-layer options

use crate::reconcile::{Decision, Reconcile, ReconcileError, TryReconcile};
use serde::{Deserialize, Serialize};
use std::fmt;
use veneer_core::{Change, Clock, Entity, EntityId};

/// Handle to an eager layer
///
/// Handles are allocated in increasing order and never reused, so comparing
/// two handles compares the creation order of their layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub u64);

impl LayerId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer:{}", self.0)
    }
}

/// When a layer should time out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expiry {
    /// At an absolute time in milliseconds
    At(u64),
    /// After a duration in milliseconds, measured from the table clock
    In(u64),
    /// Only when expired explicitly or by reconciliation
    Never,
}

impl Expiry {
    /// Absolute deadline for this request, if any
    pub fn deadline(&self, clock: &dyn Clock) -> Option<u64> {
        match self {
            Expiry::At(at) => Some(*at),
            Expiry::In(delta) => Some(clock.now_ms().saturating_add(*delta)),
            Expiry::Never => None,
        }
    }
}

/// Options for creating or updating a layer
///
/// Fields left as `None` fall back to the table's configured defaults on
/// creation and keep the layer's current values on update.
#[derive(Default)]
pub struct EagerOptions {
    pub expires: Option<Expiry>,
    pub reconcile: Option<Box<dyn Reconcile>>,
}

impl EagerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: set the expiry
    pub fn expires(mut self, expiry: Expiry) -> Self {
        self.expires = Some(expiry);
        self
    }

    /// Builder-style: set the reconcile strategy
    pub fn reconcile<R: Reconcile + 'static>(mut self, strategy: R) -> Self {
        self.reconcile = Some(Box::new(strategy));
        self
    }

    /// Builder-style: use a closure as the reconcile strategy
    pub fn reconcile_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Entity>, &Change, &Change) -> Decision + Send + Sync + 'static,
    {
        self.reconcile = Some(Box::new(f));
        self
    }

    /// Builder-style: use a fallible closure as the reconcile strategy
    pub fn try_reconcile_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Entity>, &Change, &Change) -> Result<Decision, ReconcileError>
            + Send
            + Sync
            + 'static,
    {
        self.reconcile = Some(Box::new(TryReconcile(f)));
        self
    }
}

impl fmt::Debug for EagerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerOptions")
            .field("expires", &self.expires)
            .field("reconcile", &self.reconcile.is_some())
            .finish()
    }
}

/// An active layer
pub(crate) struct LayerRecord {
    pub target: EntityId,
    pub change: Change,
    /// Absolute deadline in milliseconds
    pub expires_at: Option<u64>,
    pub reconcile: Box<dyn Reconcile>,
}

impl fmt::Debug for LayerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerRecord")
            .field("target", &self.target)
            .field("change", &self.change)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veneer_core::ManualClock;

    #[test]
    fn test_layer_id_order_and_display() {
        assert!(LayerId(1) < LayerId(2));
        assert_eq!(LayerId(4).to_string(), "layer:4");
        assert_eq!(LayerId(4).raw(), 4);
    }

    #[test]
    fn test_expiry_deadline() {
        let clock = ManualClock::new(100);
        assert_eq!(Expiry::At(10).deadline(&clock), Some(10));
        assert_eq!(Expiry::In(50).deadline(&clock), Some(150));
        assert_eq!(Expiry::In(u64::MAX).deadline(&clock), Some(u64::MAX));
        assert_eq!(Expiry::Never.deadline(&clock), None);
    }

    #[test]
    fn test_options_builders() {
        let options = EagerOptions::new().expires(Expiry::At(5));
        assert_eq!(options.expires, Some(Expiry::At(5)));
        assert!(options.reconcile.is_none());

        let options = EagerOptions::new().reconcile_fn(|_, _, _| Decision::Ignore);
        assert!(options.reconcile.is_some());
        assert!(format!("{:?}", options).contains("reconcile: true"));
    }

    #[test]
    fn test_expiry_serialization() {
        let serialized = ron::to_string(&Expiry::In(3000)).expect("serialize");
        let deserialized: Expiry = ron::from_str(&serialized).expect("deserialize");
        assert_eq!(deserialized, Expiry::In(3000));
    }
}
