//! Per-collection facade over a store collection handle.
//!
//! A [`CollectionEntry`] pairs the static [`CollectionDefinition`] registered by the
//! caller with the store handle it was built from, and translates the adapter verbs
//! into store primitives:
//!
//! | verb          | store primitives                          |
//! |---------------|-------------------------------------------|
//! | `create`      | insert                                    |
//! | `create_each` | insert                                    |
//! | `find`        | find                                      |
//! | `stream`      | find (streaming)                          |
//! | `update`      | find ids, update by id, find by id        |
//! | `destroy`     | find, delete by id                        |
//! | `count`       | count                                     |
//!
//! # Read-only collections
//!
//! Collections registered on a read-only connection accept every mutating verb and
//! do nothing: `create` returns an empty record, `create_each`, `update` and `destroy`
//! return no records. No error is raised.

use bson::{Bson, Document, doc};
use futures::{StreamExt, TryStreamExt, stream::BoxStream};

use crate::{
    backend::{CollectionHandle, FindOptions},
    criteria::Criteria,
    error::{AdapterError, AdapterResult},
    record,
    schema::{CollectionDefinition, IndexSpec, Schema},
};

/// A stream of caller records.
pub type RecordStream = BoxStream<'static, AdapterResult<Document>>;

/// One registered collection of a connection.
#[derive(Debug, Clone)]
pub struct CollectionEntry<C: CollectionHandle> {
    definition: CollectionDefinition,
    read_only: bool,
    handle: C,
}

impl<C: CollectionHandle> CollectionEntry<C> {
    pub(crate) fn new(definition: CollectionDefinition, read_only: bool, handle: C) -> Self {
        Self {
            definition,
            read_only,
            handle,
        }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn schema(&self) -> &Schema {
        &self.definition.schema
    }

    pub fn definition(&self) -> &CollectionDefinition {
        &self.definition
    }

    /// Indexes provisioned for this collection.
    pub fn indexes(&self) -> Vec<IndexSpec> {
        self.definition.index_specs()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Name of the primary key attribute.
    pub fn primary_key(&self) -> &str {
        self.definition.primary_key()
    }

    /// The raw store handle, bypassing the adapter.
    pub fn native(&self) -> &C {
        &self.handle
    }

    /// Inserts one record and returns it as stored, including its generated `id`.
    pub async fn create(&self, values: Document) -> AdapterResult<Document> {
        if self.read_only {
            self.skip_write("create");
            return Ok(Document::new());
        }

        let mut document = record::to_store_values(values);
        record::ensure_store_id(&mut document);

        self.handle.insert(vec![document.clone()]).await?;

        Ok(record::from_store(document))
    }

    /// Inserts several records in one store call.
    pub async fn create_each(&self, values: Vec<Document>) -> AdapterResult<Vec<Document>> {
        if self.read_only {
            self.skip_write("create_each");
            return Ok(vec![]);
        }
        if values.is_empty() {
            return Ok(vec![]);
        }

        let documents = values
            .into_iter()
            .map(|values| {
                let mut document = record::to_store_values(values);
                record::ensure_store_id(&mut document);
                document
            })
            .collect::<Vec<_>>();

        self.handle.insert(documents.clone()).await?;

        Ok(documents.into_iter().map(record::from_store).collect())
    }

    /// Returns every record matching the criteria.
    pub async fn find(&self, criteria: Criteria) -> AdapterResult<Vec<Document>> {
        let (filter, options) = Self::store_query(criteria);

        Ok(self
            .handle
            .find(filter, options)
            .await?
            .into_iter()
            .map(record::from_store)
            .collect())
    }

    /// Streams the records matching the criteria.
    pub async fn stream(&self, criteria: Criteria) -> AdapterResult<RecordStream> {
        let (filter, options) = Self::store_query(criteria);

        Ok(self
            .handle
            .stream(filter, options)
            .await?
            .map_ok(record::from_store)
            .map_err(AdapterError::from)
            .boxed())
    }

    /// Applies `values` to every record matching the criteria and returns the updated records.
    ///
    /// Matching records are resolved first and the update is applied by primary key, so
    /// records that start matching between the two steps are left untouched.
    pub async fn update(&self, criteria: Criteria, values: Document) -> AdapterResult<Vec<Document>> {
        if self.read_only {
            self.skip_write("update");
            return Ok(vec![]);
        }

        let ids = self.matching_ids(criteria).await?;
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let mut values = record::to_store_values(values);
        values.remove(record::STORE_ID);

        let by_id = record::ids_filter(ids);
        if !values.is_empty() {
            self.handle
                .update(by_id.clone(), doc! { "$set": values })
                .await?;
        }

        Ok(self
            .handle
            .find(by_id, FindOptions::default())
            .await?
            .into_iter()
            .map(record::from_store)
            .collect())
    }

    /// Deletes every record matching the criteria and returns the deleted records.
    ///
    /// The store's delete does not report what it removed, so the matching records are
    /// read first and then deleted by primary key. The two steps are not isolated.
    pub async fn destroy(&self, criteria: Criteria) -> AdapterResult<Vec<Document>> {
        if self.read_only {
            self.skip_write("destroy");
            return Ok(vec![]);
        }

        let (filter, options) = Self::store_query(criteria.without_projection());
        let documents = self.handle.find(filter, options).await?;
        if documents.is_empty() {
            return Ok(vec![]);
        }

        let ids = documents
            .iter()
            .filter_map(|document| document.get(record::STORE_ID).cloned())
            .collect::<Vec<_>>();
        self.handle.delete(record::ids_filter(ids)).await?;

        Ok(documents.into_iter().map(record::from_store).collect())
    }

    /// Counts the records matching the criteria. Pagination fields are ignored.
    pub async fn count(&self, criteria: Criteria) -> AdapterResult<u64> {
        Ok(self
            .handle
            .count(record::to_store_filter(criteria.filter))
            .await?)
    }

    async fn matching_ids(&self, criteria: Criteria) -> AdapterResult<Vec<Bson>> {
        let (filter, mut options) = Self::store_query(criteria);
        options.projection = Some(doc! { record::STORE_ID: 1 });

        Ok(self
            .handle
            .find(filter, options)
            .await?
            .into_iter()
            .filter_map(|mut document| document.remove(record::STORE_ID))
            .collect())
    }

    fn store_query(criteria: Criteria) -> (Document, FindOptions) {
        let options = FindOptions {
            projection: criteria
                .select
                .as_deref()
                .map(record::to_store_projection),
            sort: criteria.sort.map(record::to_store_sort),
            limit: criteria.limit,
            skip: criteria.skip,
        };

        (record::to_store_filter(criteria.filter), options)
    }

    fn skip_write(&self, verb: &str) {
        tracing::debug!(collection = self.name(), verb, "Skipping write on read-only collection");
    }
}
