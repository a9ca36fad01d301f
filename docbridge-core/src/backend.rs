//! Store driver abstraction.
//!
//! This module defines the boundary between the adapter and the underlying document
//! store. The adapter only ever talks to a store through these traits, so the registry,
//! collection facade and join engine are independent of any concrete client.
//!
//! # Traits
//!
//! - [`StoreDriver`]: Opens a live handle from a normalized [`ConnectTarget`]
//! - [`StoreHandle`]: One live connection, scoped to a database
//! - [`CollectionHandle`]: Point operations on a single collection
//!
//! Every operation is a reliable point operation from the adapter's view. Drivers do not
//! retry on behalf of the adapter and the adapter does not retry on behalf of drivers;
//! any retry or timeout behaviour comes from the driver's own configuration.

use std::fmt::Debug;

use async_trait::async_trait;
use bson::Document;
use futures::stream::BoxStream;

use crate::{
    config::ConnectTarget,
    error::StoreResult,
    schema::IndexSpec,
};

/// A stream of store-native documents.
pub type DocumentStream = BoxStream<'static, StoreResult<Document>>;

/// Store-native find options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub limit: Option<i64>,
    pub skip: Option<u64>,
}

/// Opens live store handles.
#[async_trait]
pub trait StoreDriver: Send + Sync + Debug {
    type Handle: StoreHandle;

    /// Opens a connection to the target.
    ///
    /// Implementations must not retry internally.
    async fn connect(&self, target: &ConnectTarget) -> StoreResult<Self::Handle>;
}

/// A live connection to one database of a store.
///
/// Handles are cheap to clone; clones share the same underlying connection.
#[async_trait]
pub trait StoreHandle: Clone + Send + Sync + Debug + 'static {
    type Collection: CollectionHandle;

    /// Returns a handle to the named collection. Does not touch the store.
    fn collection(&self, name: &str) -> Self::Collection;

    /// Creates the named collection. Creating an existing collection succeeds.
    async fn create_collection(&self, name: &str) -> StoreResult<Self::Collection>;

    /// Reports whether the named collection exists in the store.
    async fn collection_exists(&self, name: &str) -> StoreResult<bool>;

    /// Drops the named collection.
    ///
    /// Returns [`StoreError::NamespaceNotFound`](crate::error::StoreError::NamespaceNotFound)
    /// when the collection does not exist.
    async fn drop_collection(&self, name: &str) -> StoreResult<()>;

    /// Releases the connection.
    async fn close(&self) -> StoreResult<()>;
}

/// Point operations on a single collection, taking store-native documents.
#[async_trait]
pub trait CollectionHandle: Clone + Send + Sync + Debug + 'static {
    fn name(&self) -> &str;

    /// Ensures the index exists. Creating an equivalent existing index succeeds.
    async fn create_index(&self, spec: &IndexSpec) -> StoreResult<()>;

    /// Inserts documents. Each document must already carry its `_id`.
    async fn insert(&self, documents: Vec<Document>) -> StoreResult<()>;

    async fn find(&self, filter: Document, options: FindOptions) -> StoreResult<Vec<Document>>;

    /// Like [`find`](Self::find), yielding documents as the store produces them.
    async fn stream(&self, filter: Document, options: FindOptions) -> StoreResult<DocumentStream>;

    /// Applies an update document to every match. Returns the number of matched documents.
    async fn update(&self, filter: Document, update: Document) -> StoreResult<u64>;

    /// Deletes every match. Returns the number of deleted documents.
    async fn delete(&self, filter: Document) -> StoreResult<u64>;

    async fn count(&self, filter: Document) -> StoreResult<u64>;
}
