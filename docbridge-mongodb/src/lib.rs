//! MongoDB store driver for docbridge.
//!
//! This crate implements the store driver traits of `docbridge-core` with the official
//! MongoDB driver. Connect options normalized by the adapter are forwarded as URI options
//! where the driver understands them; legacy options are dropped.
//!
//! To use this driver, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docbridge = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docbridge::{config::ConnectionConfig, mongodb::MongoDbDriver, registry::Registry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Registry::new(MongoDbDriver::new().with_app_name("blog"));
//!
//!     registry
//!         .register_connection(
//!             ConnectionConfig::builder("default")
//!                 .url("mongodb://localhost:27017/blog?retryWrites=true")
//!                 .unified_topology(true)
//!                 .build(),
//!             vec![],
//!         )
//!         .await?;
//!
//!     registry.teardown(None).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_mongodb;

mod options;
pub mod store;

pub use store::{MongoDbCollection, MongoDbDriver, MongoDbHandle};
