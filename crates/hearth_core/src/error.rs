//! # ECS Error Types
//!
//! All errors that can occur while mutating ECS state.
//!
//! Read paths never error: a missing entity or component is an `Option::None`.

use crate::ecs::EntityId;
use thiserror::Error;

/// Errors that can occur in the ECS.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The entity was never created or has been destroyed.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// No archetype template is registered under this id.
    #[error("archetype template not found: {0}")]
    TemplateNotFound(String),
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
