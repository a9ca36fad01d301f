//! In-memory store driver for docbridge.
//!
//! This crate provides a [`MemoryDriver`] implementing the store driver traits of
//! `docbridge-core` against a simulated server held in process memory. It is meant for
//! development and tests: the driver records connection attempts and created indexes,
//! and can be configured to fail connecting or provisioning indexes.
//!
//! # Features
//!
//! - **Shared server** - Handles opened by one driver see the same databases
//! - **Filter evaluation** - Equality, comparison, membership and logical operators
//! - **Failure injection** - Unreachable servers and rejected index builds
//!
//! # Quick Start
//!
//! ```ignore
//! use bson::doc;
//! use docbridge_core::{config::ConnectionConfig, registry::Registry, schema::CollectionDefinition};
//! use docbridge_memory::MemoryDriver;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Registry::new(MemoryDriver::new());
//!
//!     registry
//!         .register_connection(
//!             ConnectionConfig::builder("default").database("app").build(),
//!             vec![CollectionDefinition::new("users")],
//!         )
//!         .await?;
//!
//!     registry.create("default", "users", doc! { "name": "Alice" }).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_memory;

pub mod evaluator;
pub mod store;

pub use store::{MemoryCollection, MemoryDriver, MemoryDriverBuilder, MemoryHandle};
