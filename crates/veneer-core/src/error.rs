//! Error types for veneer-core

use crate::EntityId;
use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Two changes (or a change and an entity) name different entities
    #[error("entity mismatch: expected {expected}, got {got}")]
    EntityMismatch { expected: EntityId, got: EntityId },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
