//! The connection registry.
//!
//! A [`Registry`] owns every registered connection of one adapter instance. Each
//! identity moves through `absent -> registered -> absent`; no intermediate state is
//! observable. Registration runs as a strict pipeline:
//!
//! 1. identity checks (missing, duplicate)
//! 2. option normalization, which rejects invalid configurations before any network call
//! 3. connection open
//! 4. index provisioning for every declared collection (skipped when read-only)
//! 5. insertion into the registry
//!
//! The identity map is guarded by a single async mutex. Entries are immutable once
//! inserted apart from their live handle slot, which teardown clears.
//!
//! # Example
//!
//! ```ignore
//! use docbridge_core::{config::ConnectionConfig, registry::Registry, schema::CollectionDefinition};
//!
//! let registry = Registry::new(driver);
//! registry
//!     .register_connection(
//!         ConnectionConfig::builder("default").database("app").build(),
//!         vec![CollectionDefinition::new("users")],
//!     )
//!     .await?;
//!
//! let users = registry.find("default", "users", Criteria::new()).await?;
//! registry.teardown(None).await?;
//! ```

use std::{collections::HashMap, fmt, sync::Arc};

use bson::Document;
use futures::future::join_all;
use mea::mutex::Mutex;

use crate::{
    backend::{StoreDriver, StoreHandle},
    collection::{CollectionEntry, RecordStream},
    config::{self, ConnectTarget, ConnectionConfig},
    criteria::Criteria,
    error::{AdapterError, AdapterResult, StoreError},
    index::provision_indexes,
    schema::{CollectionDefinition, Schema},
};

type CollectionOf<H> = <H as StoreHandle>::Collection;

/// A registered connection: its configuration, live handle and collections.
pub struct ConnectionEntry<H: StoreHandle> {
    config: ConnectionConfig,
    target: ConnectTarget,
    handle: Mutex<Option<H>>,
    collections: HashMap<String, CollectionEntry<CollectionOf<H>>>,
}

impl<H: StoreHandle> fmt::Debug for ConnectionEntry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEntry")
            .field("config", &self.config)
            .field("target", &self.target)
            .field("collections", &self.collection_names())
            .finish_non_exhaustive()
    }
}

impl<H: StoreHandle> ConnectionEntry<H> {
    fn new(
        config: ConnectionConfig,
        target: ConnectTarget,
        handle: H,
        collections: HashMap<String, CollectionEntry<CollectionOf<H>>>,
    ) -> Self {
        Self {
            config,
            target,
            handle: Mutex::new(Some(handle)),
            collections,
        }
    }

    pub fn identity(&self) -> &str {
        &self.config.identity
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// The normalized target this connection was opened with.
    pub fn target(&self) -> &ConnectTarget {
        &self.target
    }

    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    /// Looks up a registered collection.
    pub fn collection(&self, name: &str) -> AdapterResult<&CollectionEntry<CollectionOf<H>>> {
        self.collections
            .get(name)
            .ok_or_else(|| AdapterError::UnknownCollection(name.to_string(), self.identity().to_string()))
    }

    /// Names of the registered collections, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names = self.collections.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    /// Returns the live handle, or [`AdapterError::ConnectionClosed`] after teardown.
    pub async fn handle(&self) -> AdapterResult<H> {
        self.handle
            .lock()
            .await
            .clone()
            .ok_or_else(|| AdapterError::ConnectionClosed(self.identity().to_string()))
    }

    /// Releases the live handle. Closing an already closed entry succeeds.
    async fn close(&self) -> AdapterResult<()> {
        let handle = self.handle.lock().await.take();

        match handle {
            Some(handle) => {
                handle.close().await?;
                tracing::info!(identity = self.identity(), "Closed connection");
            }
            None => {
                tracing::debug!(identity = self.identity(), "Connection already closed");
            }
        }

        Ok(())
    }
}

/// Owns the registered connections of one adapter instance.
#[derive(Debug)]
pub struct Registry<D: StoreDriver> {
    driver: D,
    connections: Mutex<HashMap<String, Arc<ConnectionEntry<D::Handle>>>>,
}

impl<D: StoreDriver> Registry<D> {
    /// Creates an empty registry that opens connections through `driver`.
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            connections: Mutex::new(HashMap::new()),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Registers a connection and its collections.
    ///
    /// # Errors
    ///
    /// - [`AdapterError::IdentityMissing`] if the identity is empty
    /// - [`AdapterError::IdentityDuplicate`] if the identity is already registered
    /// - [`AdapterError::Configuration`] if the configuration is invalid; no connection is attempted
    /// - [`AdapterError::ConnectionFailure`] if the store cannot be reached
    /// - [`AdapterError::Store`] if an index cannot be created
    pub async fn register_connection(
        &self,
        config: ConnectionConfig,
        definitions: Vec<CollectionDefinition>,
    ) -> AdapterResult<()> {
        if config.identity.is_empty() {
            return Err(AdapterError::IdentityMissing);
        }
        if self.connections.lock().await.contains_key(&config.identity) {
            return Err(AdapterError::IdentityDuplicate(config.identity));
        }

        config::validate_definitions(&config, &definitions)?;
        let target = config::normalize(&config)?;

        tracing::info!(
            identity = %config.identity,
            uri = %config::redact_url(&target.connection_string),
            database = %target.database,
            read_only = config.read_only,
            "Registering connection"
        );

        let handle = self
            .driver
            .connect(&target)
            .await
            .map_err(|source| AdapterError::ConnectionFailure {
                target: config.snapshot(),
                source,
            })?;

        let mut collections = HashMap::with_capacity(definitions.len());
        for definition in definitions {
            let collection = handle.collection(&definition.name);

            if !config.read_only {
                if let Err(err) = provision_indexes(&collection, &definition.index_specs()).await {
                    Self::abandon(&config.identity, &handle).await;
                    return Err(err);
                }
            }

            collections.insert(
                definition.name.clone(),
                CollectionEntry::new(definition, config.read_only, collection),
            );
        }

        let identity = config.identity.clone();
        let entry = Arc::new(ConnectionEntry::new(config, target, handle, collections));

        let inserted = {
            let mut connections = self.connections.lock().await;
            if connections.contains_key(&identity) {
                false
            } else {
                connections.insert(identity.clone(), entry.clone());
                true
            }
        };

        if !inserted {
            tracing::warn!(identity = %identity, "Identity registered concurrently, discarding connection");
            entry.close().await?;
            return Err(AdapterError::IdentityDuplicate(identity));
        }

        tracing::info!(identity = %identity, "Registered connection");

        Ok(())
    }

    async fn abandon(identity: &str, handle: &D::Handle) {
        if let Err(err) = handle.close().await {
            tracing::warn!(identity, error = %err, "Failed to close abandoned connection");
        }
    }

    /// Returns the entry registered under `identity`.
    pub async fn lookup(&self, identity: &str) -> AdapterResult<Arc<ConnectionEntry<D::Handle>>> {
        self.connections
            .lock()
            .await
            .get(identity)
            .cloned()
            .ok_or_else(|| AdapterError::UnknownConnection(identity.to_string()))
    }

    /// Whether a connection is registered under `identity`.
    pub async fn contains(&self, identity: &str) -> bool {
        self.connections.lock().await.contains_key(identity)
    }

    /// Registered identities, sorted.
    pub async fn identities(&self) -> Vec<String> {
        let mut identities = self
            .connections
            .lock()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        identities.sort();
        identities
    }

    /// Closes and removes one connection, or every connection when `identity` is `None`.
    ///
    /// Idempotent: tearing down an unknown identity, an empty registry, or an entry whose
    /// handle is already closed succeeds. When closing everything, handles are closed
    /// concurrently and the registry is cleared even if a close fails; the first failure
    /// is returned.
    pub async fn teardown(&self, identity: Option<&str>) -> AdapterResult<()> {
        let entries = {
            let mut connections = self.connections.lock().await;
            match identity {
                Some(identity) => connections.remove(identity).into_iter().collect::<Vec<_>>(),
                None => connections.drain().map(|(_, entry)| entry).collect(),
            }
        };

        if entries.is_empty() {
            tracing::debug!(identity = ?identity, "Nothing to tear down");
            return Ok(());
        }

        tracing::info!(identity = ?identity, connections = entries.len(), "Tearing down");

        join_all(entries.iter().map(|entry| entry.close()))
            .await
            .into_iter()
            .collect::<AdapterResult<Vec<_>>>()?;

        Ok(())
    }

    /// Returns the schema of a collection if the store reports that it exists.
    pub async fn describe(&self, connection: &str, collection: &str) -> AdapterResult<Option<Schema>> {
        let entry = self.lookup(connection).await?;
        let schema = entry.collection(collection)?.schema().clone();

        if entry.handle().await?.collection_exists(collection).await? {
            Ok(Some(schema))
        } else {
            Ok(None)
        }
    }

    /// Creates a registered collection in the store and provisions its declared indexes.
    /// A no-op on read-only connections.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::UnknownCollection`] if `collection` was not registered on
    /// the connection; nothing is created in the store.
    pub async fn define(&self, connection: &str, collection: &str) -> AdapterResult<()> {
        let entry = self.lookup(connection).await?;
        let registered = entry.collection(collection)?;

        if entry.is_read_only() {
            tracing::debug!(connection, collection, "Skipping define on read-only connection");
            return Ok(());
        }

        let created = entry.handle().await?.create_collection(collection).await?;
        provision_indexes(&created, &registered.indexes()).await?;

        tracing::info!(connection, collection, "Defined collection");

        Ok(())
    }

    /// Drops a collection. Dropping a collection that does not exist succeeds.
    pub async fn drop(&self, connection: &str, collection: &str) -> AdapterResult<()> {
        let entry = self.lookup(connection).await?;

        if entry.is_read_only() {
            tracing::debug!(connection, collection, "Skipping drop on read-only connection");
            return Ok(());
        }

        match entry.handle().await?.drop_collection(collection).await {
            Ok(()) => {
                tracing::info!(connection, collection, "Dropped collection");
                Ok(())
            }
            Err(StoreError::NamespaceNotFound(namespace)) => {
                tracing::warn!(connection, collection, namespace = %namespace, "Collection to drop does not exist");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Returns the raw store handle of a registered collection.
    pub async fn native(
        &self,
        connection: &str,
        collection: &str,
    ) -> AdapterResult<CollectionOf<D::Handle>> {
        Ok(self
            .lookup(connection)
            .await?
            .collection(collection)?
            .native()
            .clone())
    }

    /// Returns a copy of a registered collection's facade.
    pub async fn collection(
        &self,
        connection: &str,
        collection: &str,
    ) -> AdapterResult<CollectionEntry<CollectionOf<D::Handle>>> {
        Ok(self.lookup(connection).await?.collection(collection)?.clone())
    }

    pub async fn create(
        &self,
        connection: &str,
        collection: &str,
        values: Document,
    ) -> AdapterResult<Document> {
        self.collection(connection, collection)
            .await?
            .create(values)
            .await
    }

    pub async fn create_each(
        &self,
        connection: &str,
        collection: &str,
        values: Vec<Document>,
    ) -> AdapterResult<Vec<Document>> {
        self.collection(connection, collection)
            .await?
            .create_each(values)
            .await
    }

    pub async fn find(
        &self,
        connection: &str,
        collection: &str,
        criteria: Criteria,
    ) -> AdapterResult<Vec<Document>> {
        self.collection(connection, collection)
            .await?
            .find(criteria)
            .await
    }

    pub async fn stream(
        &self,
        connection: &str,
        collection: &str,
        criteria: Criteria,
    ) -> AdapterResult<RecordStream> {
        self.collection(connection, collection)
            .await?
            .stream(criteria)
            .await
    }

    pub async fn update(
        &self,
        connection: &str,
        collection: &str,
        criteria: Criteria,
        values: Document,
    ) -> AdapterResult<Vec<Document>> {
        self.collection(connection, collection)
            .await?
            .update(criteria, values)
            .await
    }

    pub async fn destroy(
        &self,
        connection: &str,
        collection: &str,
        criteria: Criteria,
    ) -> AdapterResult<Vec<Document>> {
        self.collection(connection, collection)
            .await?
            .destroy(criteria)
            .await
    }

    pub async fn count(
        &self,
        connection: &str,
        collection: &str,
        criteria: Criteria,
    ) -> AdapterResult<u64> {
        self.collection(connection, collection)
            .await?
            .count(criteria)
            .await
    }
}
