//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts, denied access). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (missing or malformed field).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced user exists but cannot take the requested slot
    /// (e.g. assigning a member as a trainer).
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// A referenced entity is absent. Carries the entity kind ("gym", "request", ...).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Authorization policy denied the action. Carries the reason verbatim.
    #[error("{0}")]
    Forbidden(String),

    /// Duplicate or already-present state (e.g. trainer assigned twice).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A transition out of a terminal state was attempted.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Optimistic concurrency check failed (stale revision).
    #[error("concurrency conflict: {0}")]
    Concurrency(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_target(msg: impl Into<String>) -> Self {
        Self::InvalidTarget(msg.into())
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound(entity)
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn concurrency(msg: impl Into<String>) -> Self {
        Self::Concurrency(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_reason_is_surfaced_verbatim() {
        let err = DomainError::forbidden("Access denied");
        assert_eq!(err.to_string(), "Access denied");
    }

    #[test]
    fn not_found_names_the_entity() {
        assert_eq!(DomainError::not_found("gym").to_string(), "gym not found");
    }
}
