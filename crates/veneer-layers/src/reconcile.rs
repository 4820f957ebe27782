//! Reconcile strategies
//!
//! When something changes underneath an eager layer (the authoritative entity
//! was updated, or a lower layer was removed or rewritten), the layer's
//! strategy decides what happens to it:
//!
//! - [`Decision::Ignore`] keeps contributing the same change
//! - [`Decision::Expire`] removes the layer
//! - [`Decision::Replace`] keeps the layer but swaps its change
//!
//! Strategies are capability objects rather than bare closures so layers can
//! own them without lifetime ties to the caller. Any
//! `Fn(Option<&Entity>, &Change, &Change) -> Decision` is a strategy.

use thiserror::Error;
use veneer_core::{Change, Entity};

/// What to do with a layer after a change underneath it
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Keep the layer as-is
    Ignore,
    /// Remove the layer
    Expire,
    /// Keep the layer with a new change (must target the same entity)
    Replace(Change),
}

/// Failure reported by a strategy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ReconcileError(pub String);

impl ReconcileError {
    /// Create an error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Decides how a layer reacts to a change underneath it
pub trait Reconcile: Send + Sync {
    /// Decide the fate of a layer
    ///
    /// * `base` - the raw authoritative entity after the change, without any
    ///   layer applied
    /// * `incoming` - the authoritative change, or `Change::noop` when the
    ///   trigger was a lower layer being removed or rewritten
    /// * `current` - the change this layer contributes right now
    fn reconcile(
        &self,
        base: Option<&Entity>,
        incoming: &Change,
        current: &Change,
    ) -> Result<Decision, ReconcileError>;
}

impl<F> Reconcile for F
where
    F: Fn(Option<&Entity>, &Change, &Change) -> Decision + Send + Sync,
{
    fn reconcile(
        &self,
        base: Option<&Entity>,
        incoming: &Change,
        current: &Change,
    ) -> Result<Decision, ReconcileError> {
        Ok(self(base, incoming, current))
    }
}

/// Keep the layer no matter what happens underneath
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysIgnore;

impl Reconcile for AlwaysIgnore {
    fn reconcile(&self, _: Option<&Entity>, _: &Change, _: &Change) -> Result<Decision, ReconcileError> {
        Ok(Decision::Ignore)
    }
}

/// Drop the layer as soon as anything happens underneath
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysExpire;

impl Reconcile for AlwaysExpire {
    fn reconcile(&self, _: Option<&Entity>, _: &Change, _: &Change) -> Result<Decision, ReconcileError> {
        Ok(Decision::Expire)
    }
}

/// Adapter for strategies that can fail
pub struct TryReconcile<F>(pub F);

impl<F> Reconcile for TryReconcile<F>
where
    F: Fn(Option<&Entity>, &Change, &Change) -> Result<Decision, ReconcileError> + Send + Sync,
{
    fn reconcile(
        &self,
        base: Option<&Entity>,
        incoming: &Change,
        current: &Change,
    ) -> Result<Decision, ReconcileError> {
        (self.0)(base, incoming, current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veneer_core::{EntityId, Patch};

    fn run(strategy: &dyn Reconcile) -> Result<Decision, ReconcileError> {
        let id = EntityId::new(1);
        strategy.reconcile(None, &Change::noop(id), &Change::Delete(id))
    }

    #[test]
    fn test_builtin_strategies() {
        assert_eq!(run(&AlwaysIgnore), Ok(Decision::Ignore));
        assert_eq!(run(&AlwaysExpire), Ok(Decision::Expire));
    }

    #[test]
    fn test_closure_is_a_strategy() {
        fn boxed<F>(f: F) -> Box<dyn Reconcile>
        where
            F: Fn(Option<&Entity>, &Change, &Change) -> Decision + Send + Sync + 'static,
        {
            Box::new(f)
        }

        let strategy = boxed(|_, incoming, current| {
            if incoming.is_noop() {
                Decision::Ignore
            } else {
                Decision::Replace(current.clone())
            }
        });
        assert_eq!(run(strategy.as_ref()), Ok(Decision::Ignore));

        let id = EntityId::new(1);
        let incoming = Change::update(Patch::new(id).set("label", "x"));
        assert_eq!(
            strategy.reconcile(None, &incoming, &Change::Delete(id)),
            Ok(Decision::Replace(Change::Delete(id)))
        );
    }

    #[test]
    fn test_fallible_strategy() {
        let strategy = TryReconcile(|_: Option<&Entity>, _: &Change, _: &Change| {
            Err(ReconcileError::new("lost track of the entity"))
        });
        assert_eq!(
            run(&strategy),
            Err(ReconcileError::new("lost track of the entity"))
        );
    }
}
