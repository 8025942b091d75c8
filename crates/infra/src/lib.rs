//! Infrastructure layer: persistence, derived indexes, external
//! collaborators and the application services that tie them to the domain.

pub mod error;
pub mod identity;
pub mod roster;
pub mod services;
pub mod storage;
pub mod store;

pub use error::{ServiceError, ServiceResult};
pub use identity::{BcryptHasher, CredentialError, CredentialHasher};
pub use roster::{RosterIndex, UserLinks};
pub use services::Services;
pub use storage::{InMemoryObjectStorage, ObjectStorage, StorageError};
pub use store::{DocumentStore, Filter, InMemoryDocumentStore, Repository, RetryPolicy, StoreError, Versioned};

#[cfg(test)]
mod integration_tests;
