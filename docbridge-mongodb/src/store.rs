use async_trait::async_trait;
use bson::{Document, doc};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    Client, Collection as MongoCollection, Database, IndexModel,
    error::{Error as MongoError, ErrorKind},
    options::{ClientOptions, FindOptions as MongoFindOptions, IndexOptions},
};
use docbridge_core::{
    backend::{CollectionHandle, DocumentStream, FindOptions, StoreDriver, StoreHandle},
    config::{ConnectTarget, redact_url},
    error::{StoreError, StoreResult},
    schema::IndexSpec,
};

use crate::options::connection_uri;

const NAMESPACE_NOT_FOUND: i32 = 26;
const NAMESPACE_EXISTS: i32 = 48;

fn backend_error(error: MongoError) -> StoreError {
    StoreError::Backend(error.to_string())
}

fn command_code(error: &MongoError) -> Option<i32> {
    match &*error.kind {
        ErrorKind::Command(command) => Some(command.code),
        _ => None,
    }
}

/// Opens [`MongoDbHandle`]s with the official driver.
#[derive(Debug, Default, Clone)]
pub struct MongoDbDriver {
    app_name: Option<String>,
}

impl MongoDbDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `app_name` to the server unless the options already name one.
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }
}

#[async_trait]
impl StoreDriver for MongoDbDriver {
    type Handle = MongoDbHandle;

    async fn connect(&self, target: &ConnectTarget) -> StoreResult<Self::Handle> {
        let uri = connection_uri(&target.connection_string, &target.options);

        tracing::debug!(uri = %redact_url(&uri), "Connecting to MongoDB");

        let mut options = ClientOptions::parse(&uri).await.map_err(backend_error)?;
        if options.app_name.is_none() {
            options.app_name = self.app_name.clone();
        }

        let client = Client::with_options(options).map_err(backend_error)?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(backend_error)?;

        Ok(MongoDbHandle::new(client, &target.database))
    }
}

/// A live client scoped to one database.
#[derive(Debug, Clone)]
pub struct MongoDbHandle {
    client: Client,
    database: Database,
}

impl MongoDbHandle {
    pub fn new(client: Client, database: &str) -> Self {
        Self {
            database: client.database(database),
            client,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.database
    }
}

#[async_trait]
impl StoreHandle for MongoDbHandle {
    type Collection = MongoDbCollection;

    fn collection(&self, name: &str) -> Self::Collection {
        MongoDbCollection {
            collection: self.database.collection(name),
        }
    }

    async fn create_collection(&self, name: &str) -> StoreResult<Self::Collection> {
        match self.database.create_collection(name).await {
            Ok(()) => {}
            Err(error) if command_code(&error) == Some(NAMESPACE_EXISTS) => {}
            Err(error) => return Err(backend_error(error)),
        }

        Ok(self.collection(name))
    }

    async fn collection_exists(&self, name: &str) -> StoreResult<bool> {
        Ok(!self
            .database
            .list_collection_names()
            .filter(doc! { "name": name })
            .await
            .map_err(backend_error)?
            .is_empty())
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<()> {
        let namespace = format!("{}.{}", self.database.name(), name);

        // The driver suppresses "ns not found" on drop, so absence is checked up front.
        if !self.collection_exists(name).await? {
            return Err(StoreError::NamespaceNotFound(namespace));
        }

        self.database
            .collection::<Document>(name)
            .drop()
            .await
            .map_err(|error| match command_code(&error) {
                Some(NAMESPACE_NOT_FOUND) => StoreError::NamespaceNotFound(namespace),
                _ => backend_error(error),
            })
    }

    async fn close(&self) -> StoreResult<()> {
        self.client.clone().shutdown().await;

        Ok(())
    }
}

/// One MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoDbCollection {
    collection: MongoCollection<Document>,
}

impl MongoDbCollection {
    pub fn native(&self) -> &MongoCollection<Document> {
        &self.collection
    }

    fn find_options(options: FindOptions) -> MongoFindOptions {
        let mut find_options = MongoFindOptions::default();
        find_options.projection = options.projection;
        find_options.sort = options.sort;
        find_options.limit = options.limit;
        find_options.skip = options.skip;
        find_options
    }

    fn index_model(spec: &IndexSpec) -> IndexModel {
        let mut options = IndexOptions::default();
        options.unique = spec.options.get_bool("unique").ok();
        options.sparse = spec.options.get_bool("sparse").ok();
        options.name = spec.options.get_str("name").ok().map(str::to_string);

        IndexModel::builder()
            .keys(spec.keys.clone())
            .options(options)
            .build()
    }
}

#[async_trait]
impl CollectionHandle for MongoDbCollection {
    fn name(&self) -> &str {
        self.collection.name()
    }

    async fn create_index(&self, spec: &IndexSpec) -> StoreResult<()> {
        self.collection
            .create_index(Self::index_model(spec))
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn insert(&self, documents: Vec<Document>) -> StoreResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        self.collection
            .insert_many(documents)
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn find(&self, filter: Document, options: FindOptions) -> StoreResult<Vec<Document>> {
        self.collection
            .find(filter)
            .with_options(Self::find_options(options))
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn stream(&self, filter: Document, options: FindOptions) -> StoreResult<DocumentStream> {
        Ok(self
            .collection
            .find(filter)
            .with_options(Self::find_options(options))
            .await
            .map_err(backend_error)?
            .map_err(backend_error)
            .boxed())
    }

    async fn update(&self, filter: Document, update: Document) -> StoreResult<u64> {
        Ok(self
            .collection
            .update_many(filter, update)
            .await
            .map_err(backend_error)?
            .matched_count)
    }

    async fn delete(&self, filter: Document) -> StoreResult<u64> {
        Ok(self
            .collection
            .delete_many(filter)
            .await
            .map_err(backend_error)?
            .deleted_count)
    }

    async fn count(&self, filter: Document) -> StoreResult<u64> {
        self.collection
            .count_documents(filter)
            .await
            .map_err(backend_error)
    }
}
