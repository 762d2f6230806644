//! # DomainError
//!
//! Centralized error handling for the blog engine.
//! Every service operation returns one of these; the routing layer maps them
//! to transport codes.

use thiserror::Error;
use uuid::Uuid;

/// The primary error type for all engine operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Resource not found (e.g., content item, account, comment)
    #[error("{entity} not found with ID {id}")]
    NotFound { entity: &'static str, id: String },

    /// A foreign id supplied by the caller does not resolve
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// Actor is not allowed to mutate the resource
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Resource already exists (e.g., duplicate username)
    #[error("conflict: {0}")]
    AlreadyExists(String),

    #[error("{follower} already follows {followee}")]
    AlreadyFollowing { follower: Uuid, followee: Uuid },

    #[error("{follower} does not follow {followee}")]
    NotFollowing { follower: Uuid, followee: Uuid },

    /// Missing or malformed input
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Failure reported by a storage port
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::ValidationError(msg.into())
    }
}

/// A specialized Result type for engine logic.
pub type Result<T> = std::result::Result<T, DomainError>;
