//! A MongoDB adapter core for storage-agnostic object-query layers.
//!
//! This crate is the core of the docbridge project and provides:
//!
//! - **Connection configuration** ([`config`]) - Option normalization and connection string synthesis
//! - **Store driver abstraction** ([`backend`]) - Traits implemented by concrete store clients
//! - **Connection registry** ([`registry`]) - Named connections and their lifecycle
//! - **Collection facade** ([`collection`]) - CRUD and streaming with read-only enforcement
//! - **Join engine** ([`join`]) - Cross-collection population through an external planner
//! - **Schema and indexes** ([`schema`], [`index`]) - Collection definitions and index provisioning
//! - **Criteria** ([`criteria`]) - Store-native query criteria
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use docbridge_core::{
//!     config::ConnectionConfig,
//!     criteria::Criteria,
//!     registry::Registry,
//!     schema::{AttributeDefinition, CollectionDefinition},
//! };
//!
//! let registry = Registry::new(driver);
//!
//! registry
//!     .register_connection(
//!         ConnectionConfig::builder("default").database("blog").build(),
//!         vec![
//!             CollectionDefinition::new("users")
//!                 .attribute("email", AttributeDefinition::new("string").unique()),
//!         ],
//!     )
//!     .await?;
//!
//! let alice = registry
//!     .create("default", "users", doc! { "email": "alice@example.com" })
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_core;

pub mod backend;
pub mod collection;
pub mod config;
pub mod criteria;
pub mod error;
pub mod index;
pub mod join;
pub mod record;
pub mod registry;
pub mod schema;
