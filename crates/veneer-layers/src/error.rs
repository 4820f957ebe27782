//! Error types for veneer-layers

use crate::LayerId;
use thiserror::Error;
use veneer_core::EntityId;

/// Layered table error type
#[derive(Debug, Error)]
pub enum Error {
    /// The change cannot target the entity it names
    #[error("invalid target {id}: {reason}")]
    InvalidTarget { id: EntityId, reason: String },

    /// The layer already expired; its handle is permanently inert
    #[error("{0} already expired")]
    UseAfterExpiry(LayerId),

    /// A reconcile strategy failed or broke its contract
    ///
    /// The cascade that hit it was abandoned before any layer changed.
    #[error("reconcile contract violated by {layer}: {reason}")]
    ReconcileContractViolation { layer: LayerId, reason: String },

    /// Configuration could not be loaded
    #[error("config error: {0}")]
    Config(String),

    /// Core error
    #[error("core error: {0}")]
    Core(#[from] veneer_core::Error),
}

impl Error {
    pub(crate) fn invalid_target(id: EntityId, reason: impl Into<String>) -> Self {
        Error::InvalidTarget {
            id,
            reason: reason.into(),
        }
    }

    pub(crate) fn violation(layer: LayerId, reason: impl Into<String>) -> Self {
        Error::ReconcileContractViolation {
            layer,
            reason: reason.into(),
        }
    }
}

/// Result type for layered table operations
pub type Result<T> = std::result::Result<T, Error>;

// Compile-time check that Error can cross threads with a shared table.
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}
