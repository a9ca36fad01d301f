//! Main docbridge crate: a MongoDB adapter for storage-agnostic object-query layers.
//!
//! This crate is the primary entry point of the docbridge project. It re-exports the
//! core types from `docbridge-core` and gives access to the store drivers.
//!
//! # Features
//!
//! - **Connection registry** - Named connections with a strict registration pipeline
//! - **Option normalization** - Discrete fields, URL parameters and defaults merged deterministically
//! - **Record operations** - Create, find, stream, update, destroy and count with read-only enforcement
//! - **Join emulation** - Cross-collection population delegated to a pluggable planner
//!
//! # Quick Start
//!
//! ```ignore
//! use docbridge::{prelude::*, memory::MemoryDriver};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> AdapterResult<()> {
//!     let registry = Registry::new(MemoryDriver::new());
//!
//!     registry
//!         .register_connection(
//!             ConnectionConfig::builder("default")
//!                 .host("localhost")
//!                 .database("blog")
//!                 .build(),
//!             vec![
//!                 CollectionDefinition::new("users")
//!                     .attribute("email", AttributeDefinition::new("string").unique()),
//!                 CollectionDefinition::new("posts")
//!                     .attribute("author", AttributeDefinition::new("string").indexed()),
//!             ],
//!         )
//!         .await?;
//!
//!     let alice = registry
//!         .create("default", "users", doc! { "email": "alice@example.com" })
//!         .await?;
//!
//!     let posts = registry
//!         .find(
//!             "default",
//!             "posts",
//!             Criteria::builder()
//!                 .filter(doc! { "author": alice.get_str("id").unwrap() })
//!                 .sort(doc! { "title": 1 })
//!                 .limit(10)
//!                 .build(),
//!         )
//!         .await?;
//!
//!     println!("Found {} posts", posts.len());
//!
//!     registry.teardown(None).await
//! }
//! ```
//!
//! # Joins
//!
//! The store has no native join. [`Registry::join`](registry::Registry::join) hands the
//! instructions to a [`JoinPlanner`](join::JoinPlanner), which reads through a narrow
//! [`JoinAccess`](join::JoinAccess) bound to the same connection:
//!
//! ```ignore
//! use docbridge::{prelude::*, async_trait};
//!
//! struct AttachAuthors;
//!
//! #[async_trait]
//! impl JoinPlanner for AttachAuthors {
//!     async fn run(
//!         &self,
//!         instructions: JoinInstructions,
//!         parent: &str,
//!         access: &dyn JoinAccess,
//!     ) -> AdapterResult<Vec<bson::Document>> {
//!         let mut parents = access.find(parent, instructions.criteria).await?;
//!         // ... look up children per join and attach them ...
//!         Ok(parents)
//!     }
//! }
//! ```
//!
//! # Drivers
//!
//! - [`memory`] - In-process store for development and testing
//! - [`mongodb`] - MongoDB through the official driver (requires the `mongodb` feature)

pub mod prelude;

pub use docbridge_core::{
    backend, collection, config, criteria, error, index, join, record, registry, schema,
};

// Re-exported for implementing join planners and building documents.
pub use async_trait::async_trait;
pub use bson;

/// In-memory store driver.
pub mod memory {
    pub use docbridge_memory::{MemoryCollection, MemoryDriver, MemoryDriverBuilder, MemoryHandle};
}

/// MongoDB store driver.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docbridge_mongodb::{MongoDbCollection, MongoDbDriver, MongoDbHandle};
}
