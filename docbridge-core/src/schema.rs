//! Collection schema and index declarations.
//!
//! A [`CollectionDefinition`] is the static description a caller registers for each
//! collection of a connection: its attributes and the indexes that must exist before
//! the collection is used.

use std::collections::BTreeMap;

use bson::{Document, doc};
use serde::{Deserialize, Serialize};

/// The attribute used as primary key when no attribute is flagged `primaryKey`.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Definition of a single attribute in a collection schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeDefinition {
    /// Declared type name (e.g. `string`, `integer`, `json`).
    #[serde(rename = "type")]
    pub kind: String,
    pub primary_key: bool,
    /// Enforce uniqueness with a unique index.
    pub unique: bool,
    /// Create a plain index on this attribute.
    pub index: bool,
    pub required: bool,
}

impl AttributeDefinition {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Attribute name to definition.
pub type Schema = BTreeMap<String, AttributeDefinition>;

/// An index declaration: the key document and the creation options.
///
/// Creating an index equivalent to one that already exists is a no-op in the store, so
/// specs can be applied repeatedly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSpec {
    pub keys: Document,
    pub options: Document,
}

impl IndexSpec {
    pub fn new(keys: Document, options: Document) -> Self {
        Self { keys, options }
    }

    /// An ascending index on a single field.
    pub fn single(field: &str, unique: bool) -> Self {
        let options = if unique {
            doc! { "unique": true }
        } else {
            Document::new()
        };

        Self::new(doc! { field: 1 }, options)
    }

    pub fn is_unique(&self) -> bool {
        matches!(self.options.get("unique"), Some(bson::Bson::Boolean(true)))
    }
}

/// Static description of one collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionDefinition {
    pub name: String,
    pub schema: Schema,
    /// Explicitly declared indexes, in addition to those derived from the schema.
    pub indexes: Vec<IndexSpec>,
}

impl CollectionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn attribute(mut self, name: impl Into<String>, definition: AttributeDefinition) -> Self {
        self.schema.insert(name.into(), definition);
        self
    }

    pub fn index(mut self, spec: IndexSpec) -> Self {
        self.indexes.push(spec);
        self
    }

    /// Name of the primary key attribute.
    pub fn primary_key(&self) -> &str {
        self.schema
            .iter()
            .find(|(_, attribute)| attribute.primary_key)
            .map(|(name, _)| name.as_str())
            .unwrap_or(DEFAULT_PRIMARY_KEY)
    }

    /// All indexes to provision: the declared ones followed by one per attribute flagged
    /// `unique`, `index` or `primaryKey`.
    ///
    /// `id` maps to the store's `_id`, which the store indexes natively, so it never gets
    /// an index of its own. Any other primary key attribute gets a unique index.
    pub fn index_specs(&self) -> Vec<IndexSpec> {
        self.indexes
            .iter()
            .cloned()
            .chain(
                self.schema
                    .iter()
                    .filter(|(name, attribute)| {
                        name.as_str() != DEFAULT_PRIMARY_KEY
                            && (attribute.unique || attribute.index || attribute.primary_key)
                    })
                    .map(|(name, attribute)| {
                        IndexSpec::single(name, attribute.unique || attribute.primary_key)
                    }),
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_key_defaults_to_id() {
        let definition = CollectionDefinition::new("users")
            .attribute("name", AttributeDefinition::new("string"));

        assert_eq!(definition.primary_key(), "id");
    }

    #[test]
    fn primary_key_follows_flagged_attribute() {
        let definition = CollectionDefinition::new("users")
            .attribute("email", AttributeDefinition::new("string").primary_key());

        assert_eq!(definition.primary_key(), "email");
    }

    #[test]
    fn derives_indexes_from_attributes() {
        let definition = CollectionDefinition::new("users")
            .attribute("id", AttributeDefinition::new("string").primary_key().unique())
            .attribute("email", AttributeDefinition::new("string").unique())
            .attribute("age", AttributeDefinition::new("integer").indexed())
            .attribute("bio", AttributeDefinition::new("string"))
            .index(IndexSpec::new(doc! { "name": 1, "age": -1 }, Document::new()));

        let specs = definition.index_specs();

        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].keys, doc! { "name": 1, "age": -1 });
        assert_eq!(specs[1], IndexSpec::single("age", false));
        assert_eq!(specs[2], IndexSpec::single("email", true));
        assert!(specs[2].is_unique());
    }

    #[test]
    fn custom_primary_key_gets_a_unique_index() {
        let definition = CollectionDefinition::new("posts")
            .attribute("slug", AttributeDefinition::new("string").primary_key());

        assert_eq!(definition.index_specs(), vec![IndexSpec::single("slug", true)]);
    }
}
