//! Domain-level error types.

use thiserror::Error;
use uuid::Uuid;

/// Domain errors - business logic failures surfaced to the request layer.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: &'static str, id: Uuid },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not authorized to {0}")]
    Unauthorized(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(entity_type: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity_type, id }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Repository-level errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    Query(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// The store refused a write that would break a cross-entity invariant
    /// (negative counter, dangling reference).
    #[error("Integrity check failed: {0}")]
    Integrity(String),
}

impl From<RepoError> for DomainError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Constraint(msg) => DomainError::Conflict(msg),
            RepoError::Integrity(msg) => DomainError::IntegrityViolation(msg),
            RepoError::NotFound => DomainError::Internal("row vanished during write".to_string()),
            RepoError::Connection(msg) | RepoError::Query(msg) => DomainError::Internal(msg),
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
