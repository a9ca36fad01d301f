//! In-memory store driver.
//!
//! Every [`MemoryDriver`] owns one simulated server: a map of databases, each a map of
//! collections holding documents in insertion order. Handles opened by the driver share
//! that server, so tests can register connections through the adapter and inspect the
//! result through the driver.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering},
    },
};

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;

use docbridge_core::{
    backend::{CollectionHandle, DocumentStream, FindOptions, StoreDriver, StoreHandle},
    config::ConnectTarget,
    error::{StoreError, StoreResult},
    schema::IndexSpec,
};

use crate::evaluator::{Comparable, DocumentEvaluator, compare_documents, lookup, project};

#[derive(Debug, Default)]
struct MemoryCollectionData {
    documents: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

type DatabaseMap = HashMap<String, MemoryCollectionData>;
type ServerMap = HashMap<String, DatabaseMap>;

/// Driver backed by a shared in-memory server.
///
/// Cloning the driver shares the server and its counters.
///
/// # Example
///
/// ```ignore
/// use docbridge_memory::MemoryDriver;
/// use docbridge_core::registry::Registry;
///
/// let driver = MemoryDriver::new();
/// let registry = Registry::new(driver.clone());
/// // ... register connections ...
/// assert_eq!(driver.connect_attempts(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct MemoryDriver {
    server: Arc<RwLock<ServerMap>>,
    connect_attempts: Arc<AtomicUsize>,
    open_handles: Arc<AtomicUsize>,
    unreachable: bool,
    rejected_index_collections: Arc<Vec<String>>,
}

impl MemoryDriver {
    /// Creates a driver with an empty server.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> MemoryDriverBuilder {
        MemoryDriverBuilder::default()
    }

    /// Number of times [`StoreDriver::connect`] was called.
    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(AtomicOrdering::SeqCst)
    }

    /// Number of handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(AtomicOrdering::SeqCst)
    }

    /// Names of the collections that exist in `database`, sorted.
    pub async fn collection_names(&self, database: &str) -> Vec<String> {
        let server = self.server.read().await;
        let mut names = server
            .get(database)
            .map(|collections| collections.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Indexes created on a collection, in creation order.
    pub async fn indexes(&self, database: &str, collection: &str) -> Vec<IndexSpec> {
        self.server
            .read()
            .await
            .get(database)
            .and_then(|collections| collections.get(collection))
            .map(|data| data.indexes.clone())
            .unwrap_or_default()
    }

    /// Raw documents stored in a collection, in insertion order.
    pub async fn documents(&self, database: &str, collection: &str) -> Vec<Document> {
        self.server
            .read()
            .await
            .get(database)
            .and_then(|collections| collections.get(collection))
            .map(|data| data.documents.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StoreDriver for MemoryDriver {
    type Handle = MemoryHandle;

    async fn connect(&self, target: &ConnectTarget) -> StoreResult<Self::Handle> {
        self.connect_attempts.fetch_add(1, AtomicOrdering::SeqCst);

        if self.unreachable {
            tracing::debug!(database = %target.database, "Refusing connection to unreachable server");
            return Err(StoreError::Backend(format!(
                "server selection timed out for {}",
                target.database
            )));
        }

        self.open_handles.fetch_add(1, AtomicOrdering::SeqCst);
        tracing::debug!(database = %target.database, "Opened in-memory handle");

        Ok(MemoryHandle {
            server: self.server.clone(),
            database: target.database.clone(),
            closed: Arc::new(AtomicBool::new(false)),
            open_handles: self.open_handles.clone(),
            rejected_index_collections: self.rejected_index_collections.clone(),
        })
    }
}

/// Builder for [`MemoryDriver`] instances with simulated failures.
#[derive(Default, Debug)]
pub struct MemoryDriverBuilder {
    unreachable: bool,
    rejected_index_collections: Vec<String>,
}

impl MemoryDriverBuilder {
    /// Every connection attempt fails.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Index creation on the named collection fails.
    pub fn reject_indexes_on(mut self, collection: impl Into<String>) -> Self {
        self.rejected_index_collections.push(collection.into());
        self
    }

    pub fn build(self) -> MemoryDriver {
        MemoryDriver {
            unreachable: self.unreachable,
            rejected_index_collections: Arc::new(self.rejected_index_collections),
            ..MemoryDriver::default()
        }
    }
}

/// A live connection to one database of the in-memory server.
#[derive(Clone, Debug)]
pub struct MemoryHandle {
    server: Arc<RwLock<ServerMap>>,
    database: String,
    closed: Arc<AtomicBool>,
    open_handles: Arc<AtomicUsize>,
    rejected_index_collections: Arc<Vec<String>>,
}

impl MemoryHandle {
    pub fn database(&self) -> &str {
        &self.database
    }
}

#[async_trait]
impl StoreHandle for MemoryHandle {
    type Collection = MemoryCollection;

    fn collection(&self, name: &str) -> Self::Collection {
        MemoryCollection {
            handle: self.clone(),
            name: name.to_string(),
        }
    }

    async fn create_collection(&self, name: &str) -> StoreResult<Self::Collection> {
        ensure_open(&self.closed)?;

        self.server
            .write()
            .await
            .entry(self.database.clone())
            .or_default()
            .entry(name.to_string())
            .or_default();

        Ok(self.collection(name))
    }

    async fn collection_exists(&self, name: &str) -> StoreResult<bool> {
        ensure_open(&self.closed)?;

        Ok(self
            .server
            .read()
            .await
            .get(&self.database)
            .is_some_and(|collections| collections.contains_key(name)))
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<()> {
        ensure_open(&self.closed)?;

        let mut server = self.server.write().await;
        let removed = server
            .get_mut(&self.database)
            .and_then(|collections| collections.remove(name));

        match removed {
            Some(_) => Ok(()),
            None => Err(StoreError::NamespaceNotFound(format!("{}.{}", self.database, name))),
        }
    }

    async fn close(&self) -> StoreResult<()> {
        if !self.closed.swap(true, AtomicOrdering::SeqCst) {
            self.open_handles.fetch_sub(1, AtomicOrdering::SeqCst);
        }

        Ok(())
    }
}

fn ensure_open(closed: &AtomicBool) -> StoreResult<()> {
    if closed.load(AtomicOrdering::SeqCst) {
        return Err(StoreError::Backend("connection is closed".to_string()));
    }

    Ok(())
}

/// One collection of the in-memory server.
#[derive(Clone, Debug)]
pub struct MemoryCollection {
    handle: MemoryHandle,
    name: String,
}

impl MemoryCollection {
    async fn query(&self, filter: &Document, options: FindOptions) -> StoreResult<Vec<Document>> {
        ensure_open(&self.handle.closed)?;

        let server = self.handle.server.read().await;
        let Some(data) = server
            .get(&self.handle.database)
            .and_then(|collections| collections.get(&self.name))
        else {
            return Ok(vec![]);
        };

        let mut documents = DocumentEvaluator::filter_documents(&data.documents, filter)?;

        if let Some(sort) = &options.sort {
            documents.sort_by(|a, b| compare_documents(a, b, sort));
        }

        let limit = match options.limit {
            Some(limit) if limit != 0 => limit.unsigned_abs() as usize,
            _ => usize::MAX,
        };

        Ok(documents
            .into_iter()
            .skip(options.skip.unwrap_or(0) as usize)
            .take(limit)
            .map(|document| match &options.projection {
                Some(projection) => project(document, projection),
                None => document,
            })
            .collect())
    }

    fn unique_conflict(existing: &[Document], candidate: &Document, indexes: &[IndexSpec]) -> Option<String> {
        for index in indexes.iter().filter(|index| index.is_unique()) {
            let key_of = |document: &Document| {
                index
                    .keys
                    .keys()
                    .map(|field| lookup(document, field).cloned().unwrap_or(Bson::Null))
                    .collect::<Vec<_>>()
            };
            let candidate_key = key_of(candidate);

            let duplicate = existing.iter().any(|document| {
                key_of(document)
                    .iter()
                    .zip(&candidate_key)
                    .all(|(left, right)| Comparable::from(left) == Comparable::from(right))
            });

            if duplicate {
                return Some(format!("E11000 duplicate key error index: {}", index.keys));
            }
        }

        None
    }
}

#[async_trait]
impl CollectionHandle for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_index(&self, spec: &IndexSpec) -> StoreResult<()> {
        ensure_open(&self.handle.closed)?;

        if self.handle.rejected_index_collections.contains(&self.name) {
            tracing::debug!(collection = %self.name, keys = %spec.keys, "Rejecting index build");
            return Err(StoreError::Backend(format!(
                "index build failed on {}: {}",
                self.name, spec.keys
            )));
        }

        let mut server = self.handle.server.write().await;
        let data = server
            .entry(self.handle.database.clone())
            .or_default()
            .entry(self.name.clone())
            .or_default();

        if !data.indexes.iter().any(|index| index.keys == spec.keys) {
            data.indexes.push(spec.clone());
        }

        Ok(())
    }

    async fn insert(&self, documents: Vec<Document>) -> StoreResult<()> {
        ensure_open(&self.handle.closed)?;

        let mut server = self.handle.server.write().await;
        let data = server
            .entry(self.handle.database.clone())
            .or_default()
            .entry(self.name.clone())
            .or_default();

        for document in documents {
            let id = document
                .get("_id")
                .ok_or_else(|| StoreError::Backend("document is missing _id".to_string()))?;

            if data
                .documents
                .iter()
                .any(|existing| existing.get("_id").map(Comparable::from) == Some(Comparable::from(id)))
            {
                return Err(StoreError::Backend(format!(
                    "E11000 duplicate key error collection: {}.{} _id: {}",
                    self.handle.database, self.name, id
                )));
            }

            if let Some(conflict) = Self::unique_conflict(&data.documents, &document, &data.indexes) {
                return Err(StoreError::Backend(conflict));
            }

            data.documents.push(document);
        }

        Ok(())
    }

    async fn find(&self, filter: Document, options: FindOptions) -> StoreResult<Vec<Document>> {
        self.query(&filter, options).await
    }

    async fn stream(&self, filter: Document, options: FindOptions) -> StoreResult<DocumentStream> {
        let documents = self.query(&filter, options).await?;

        Ok(stream::iter(documents.into_iter().map(Ok)).boxed())
    }

    async fn update(&self, filter: Document, update: Document) -> StoreResult<u64> {
        ensure_open(&self.handle.closed)?;

        let mut server = self.handle.server.write().await;
        let Some(data) = server
            .get_mut(&self.handle.database)
            .and_then(|collections| collections.get_mut(&self.name))
        else {
            return Ok(0);
        };

        let mut matched = 0;
        for document in data.documents.iter_mut() {
            if !DocumentEvaluator::new(document).evaluate(&filter)? {
                continue;
            }
            matched += 1;

            for (operator, fields) in &update {
                let fields = fields.as_document().ok_or_else(|| {
                    StoreError::Backend(format!("{} requires a document", operator))
                })?;

                match operator.as_str() {
                    "$set" => {
                        for (field, value) in fields {
                            document.insert(field.clone(), value.clone());
                        }
                    }
                    "$unset" => {
                        for field in fields.keys() {
                            document.remove(field);
                        }
                    }
                    _ => {
                        return Err(StoreError::Backend(format!(
                            "unsupported update operator {}",
                            operator
                        )));
                    }
                }
            }
        }

        Ok(matched)
    }

    async fn delete(&self, filter: Document) -> StoreResult<u64> {
        ensure_open(&self.handle.closed)?;

        let mut server = self.handle.server.write().await;
        let Some(data) = server
            .get_mut(&self.handle.database)
            .and_then(|collections| collections.get_mut(&self.name))
        else {
            return Ok(0);
        };

        let matched = data
            .documents
            .iter()
            .map(|document| DocumentEvaluator::new(document).evaluate(&filter))
            .collect::<StoreResult<Vec<_>>>()?;

        let mut removed = matched.iter().copied();
        data.documents.retain(|_| !removed.next().unwrap_or(false));

        Ok(matched.iter().filter(|matched| **matched).count() as u64)
    }

    async fn count(&self, filter: Document) -> StoreResult<u64> {
        Ok(self.query(&filter, FindOptions::default()).await?.len() as u64)
    }
}
