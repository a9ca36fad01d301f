//! Cross-collection population without a native join.
//!
//! The store cannot join collections, so population is delegated to an external
//! [`JoinPlanner`]. The planner decides which associations to traverse, in what order,
//! and how to attach child records; the adapter only gives it data access through the
//! two methods of [`JoinAccess`]:
//!
//! - [`JoinAccess::find`] runs a plain find against a collection of the same connection
//! - [`JoinAccess::primary_key`] reports the primary key attribute of a collection
//!
//! Each call resolves before the planner can issue a call that depends on it. Nothing
//! here is transactional; population is best effort across collections.

use async_trait::async_trait;
use bson::Document;
use serde::{Deserialize, Serialize};

use crate::{
    backend::StoreDriver,
    criteria::Criteria,
    error::{AdapterError, AdapterResult},
    registry::Registry,
};

/// One association to populate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JoinSpec {
    /// Collection holding the parent records.
    pub parent: String,
    /// Attribute of the parent matched against `child_key`.
    pub parent_key: String,
    /// Collection holding the child records.
    pub child: String,
    pub child_key: String,
    /// Attribute of the parent record the children are attached under.
    pub alias: String,
    /// Whether the association is to-many.
    pub collection: bool,
    /// Whether `child` is a junction collection of a many-to-many association.
    pub junction_table: bool,
    /// Drop the parent key from populated records.
    pub remove_parent_key: bool,
    /// Attributes to return from the child.
    pub select: Option<Vec<String>>,
    /// Additional criteria applied to the child lookup.
    pub criteria: Option<Criteria>,
}

/// Which associations to populate for one query on a parent collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinInstructions {
    /// Criteria for the parent query.
    #[serde(flatten)]
    pub criteria: Criteria,
    pub joins: Vec<JoinSpec>,
}

impl JoinInstructions {
    pub fn new(criteria: Criteria, joins: Vec<JoinSpec>) -> Self {
        Self { criteria, joins }
    }
}

/// Data access offered to a join planner.
#[async_trait]
pub trait JoinAccess: Send + Sync {
    /// Finds records of `collection` on the same connection.
    async fn find(&self, collection: &str, criteria: Criteria) -> AdapterResult<Vec<Document>>;

    /// Returns the primary key attribute of `collection`.
    ///
    /// An unknown connection or collection is a [`AdapterError::JoinConsistency`]: the
    /// planner's view of the schema disagrees with the registry.
    async fn primary_key(&self, collection: &str) -> AdapterResult<String>;
}

/// Plans and executes the population of associations.
#[async_trait]
pub trait JoinPlanner: Send + Sync {
    async fn run(
        &self,
        instructions: JoinInstructions,
        parent: &str,
        access: &dyn JoinAccess,
    ) -> AdapterResult<Vec<Document>>;
}

/// [`JoinAccess`] bound to one connection of a registry.
struct ConnectionAccess<'a, D: StoreDriver> {
    registry: &'a Registry<D>,
    connection: &'a str,
}

#[async_trait]
impl<D: StoreDriver> JoinAccess for ConnectionAccess<'_, D> {
    async fn find(&self, collection: &str, criteria: Criteria) -> AdapterResult<Vec<Document>> {
        tracing::debug!(connection = self.connection, collection, "Join lookup");

        self.registry
            .find(self.connection, collection, criteria)
            .await
    }

    async fn primary_key(&self, collection: &str) -> AdapterResult<String> {
        let entry = self
            .registry
            .lookup(self.connection)
            .await
            .map_err(|_| {
                AdapterError::JoinConsistency(format!(
                    "connection `{}` is not registered",
                    self.connection
                ))
            })?;

        entry
            .collection(collection)
            .map(|collection| collection.primary_key().to_string())
            .map_err(|_| {
                AdapterError::JoinConsistency(format!(
                    "collection `{}` is not registered on connection `{}`",
                    collection, self.connection
                ))
            })
    }
}

impl<D: StoreDriver> Registry<D> {
    /// Populates associations of `parent` records by driving `planner`.
    ///
    /// Projection is stripped from the parent criteria before the planner sees them;
    /// the planner applies projection itself.
    pub async fn join(
        &self,
        connection: &str,
        parent: &str,
        instructions: JoinInstructions,
        planner: &dyn JoinPlanner,
    ) -> AdapterResult<Vec<Document>> {
        self.lookup(connection).await?.collection(parent)?;

        let instructions = JoinInstructions {
            criteria: instructions.criteria.without_projection(),
            joins: instructions.joins,
        };

        tracing::debug!(
            connection,
            parent,
            joins = instructions.joins.len(),
            "Running join"
        );

        let access = ConnectionAccess {
            registry: self,
            connection,
        };

        planner.run(instructions, parent, &access).await
    }
}
