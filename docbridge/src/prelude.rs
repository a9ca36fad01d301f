//! Convenient re-exports of commonly used types from docbridge.
//!
//! ```ignore
//! use docbridge::prelude::*;
//! ```
//!
//! This provides access to:
//! - The registry and its entries
//! - Connection configuration
//! - Collection definitions and criteria
//! - Join planner traits
//! - Store driver traits and error types

pub use docbridge_core::{
    backend::{CollectionHandle, StoreDriver, StoreHandle},
    collection::{CollectionEntry, RecordStream},
    config::{ConnectTarget, ConnectionConfig, ConnectionConfigBuilder},
    criteria::{Criteria, CriteriaBuilder},
    error::{AdapterError, AdapterResult, StoreError, StoreResult},
    join::{JoinAccess, JoinInstructions, JoinPlanner, JoinSpec},
    registry::{ConnectionEntry, Registry},
    schema::{AttributeDefinition, CollectionDefinition, IndexSpec, Schema},
};
