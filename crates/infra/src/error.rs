//! Service-level error taxonomy.
//!
//! Every failure that reaches the request boundary is one of these. Domain,
//! store, storage and credential errors are folded in via `From`, so services
//! can use `?` throughout.

use thiserror::Error;

use gymhub_core::DomainError;

use crate::identity::CredentialError;
use crate::storage::StorageError;
use crate::store::StoreError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Referenced entity absent. Carries the entity kind.
    #[error("{0} not found")]
    NotFound(String),

    /// Authorization denied; carries the reason verbatim.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    InvalidTarget(String),

    #[error("{0}")]
    Validation(String),

    /// Stale revision or lost write race.
    #[error("{0}")]
    Concurrency(String),

    /// Unexpected store or collaborator failure. The detail is logged, never
    /// returned to callers.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound(entity.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_target(msg: impl Into<String>) -> Self {
        Self::InvalidTarget(msg.into())
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::InvalidTarget(msg) => ServiceError::InvalidTarget(msg),
            DomainError::NotFound(entity) => ServiceError::NotFound(entity.to_string()),
            DomainError::Forbidden(reason) => ServiceError::Forbidden(reason),
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
            DomainError::InvalidState(msg) => ServiceError::InvalidState(msg),
            DomainError::Concurrency(msg) => ServiceError::Concurrency(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { collection } => ServiceError::NotFound(singular(collection).to_string()),
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            e @ StoreError::Concurrency { .. } => ServiceError::Concurrency(e.to_string()),
            e @ (StoreError::Duplicate { .. } | StoreError::Serialization(_) | StoreError::Backend { .. }) => {
                ServiceError::Internal(e.to_string())
            }
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::Empty => ServiceError::Validation("upload body is empty".into()),
            e @ StorageError::Unavailable(_) => ServiceError::Internal(e.to_string()),
        }
    }
}

impl From<CredentialError> for ServiceError {
    fn from(value: CredentialError) -> Self {
        match value {
            e @ CredentialError::TooShort { .. } => ServiceError::Validation(e.to_string()),
            e @ CredentialError::Hashing(_) => ServiceError::Internal(e.to_string()),
        }
    }
}

/// "gyms" → "gym", for not-found messages.
fn singular(collection: &str) -> &str {
    collection.strip_suffix('s').unwrap_or(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gymhub_core::ExpectedVersion;

    #[test]
    fn store_errors_map_onto_the_taxonomy() {
        assert_eq!(
            ServiceError::from(StoreError::NotFound { collection: "gyms" }),
            ServiceError::NotFound("gym".into())
        );
        assert!(matches!(
            ServiceError::from(StoreError::Concurrency {
                expected: ExpectedVersion::Exact(1),
                actual: 2
            }),
            ServiceError::Concurrency(_)
        ));
        assert!(matches!(
            ServiceError::from(StoreError::Backend {
                message: "io".into(),
                transient: true
            }),
            ServiceError::Internal(_)
        ));
    }

    #[test]
    fn domain_errors_keep_their_kind_and_message() {
        assert_eq!(
            ServiceError::from(DomainError::forbidden("Access denied")),
            ServiceError::Forbidden("Access denied".into())
        );
        assert_eq!(
            ServiceError::from(DomainError::not_found("request")),
            ServiceError::NotFound("request".into())
        );
    }
}
