//! Error types and result types for adapter operations.
//!
//! Every fallible operation in this crate returns [`AdapterResult<T>`]. Store drivers
//! report their failures as [`StoreError`], which the adapter either passes through
//! (wrapped in [`AdapterError::Store`]) or normalizes into success for the few cases
//! that are benign, such as dropping a collection that does not exist.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::config::ConfigSnapshot;

/// Errors reported by a store driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The referenced namespace (database or collection) does not exist.
    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),
    /// Any other failure reported by the underlying store.
    #[error("Store error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for store driver operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Represents all possible errors that can occur while using the adapter.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The connection configuration is invalid. Raised before any network attempt.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A connection was registered without an identity.
    #[error("Connection is missing an identity")]
    IdentityMissing,
    /// A connection with the same identity is already registered.
    #[error("Connection {0} is already registered")]
    IdentityDuplicate(String),
    /// The store could not be reached with the given configuration.
    ///
    /// The snapshot never contains the plaintext password.
    #[error("Failed to connect to {target}: {source}")]
    ConnectionFailure {
        target: ConfigSnapshot,
        #[source]
        source: StoreError,
    },
    /// A store primitive failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// No connection is registered under the given identity.
    #[error("Unknown connection: {0}")]
    UnknownConnection(String),
    /// The collection is not registered on the given connection.
    /// The first argument is the collection name, the second is the connection identity.
    #[error("Unknown collection {0} on connection {1}")]
    UnknownCollection(String, String),
    /// The connection's live handle has already been released by a teardown.
    #[error("Connection {0} is closed")]
    ConnectionClosed(String),
    /// The join planner referenced a connection or collection the registry does not know.
    #[error("Join consistency violation: {0}")]
    JoinConsistency(String),
    /// The join planner itself failed.
    #[error("Join error: {0}")]
    Join(String),
    /// Serialization/deserialization error when converting between formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A specialized `Result` type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

impl From<BsonError> for AdapterError {
    fn from(err: BsonError) -> Self {
        AdapterError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for AdapterError {
    fn from(err: SerdeJsonError) -> Self {
        AdapterError::Serialization(err.to_string())
    }
}
