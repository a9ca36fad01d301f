//! Query criteria handed to the adapter by the criteria translator.
//!
//! The adapter does not parse any abstract query language. Callers supply a
//! [`Criteria`] whose `filter` is already a store-native filter document; the
//! remaining fields describe projection, ordering and pagination.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use docbridge_core::criteria::Criteria;
//!
//! let criteria = Criteria::builder()
//!     .filter(doc! { "age": { "$gte": 18 } })
//!     .select(["name", "email"])
//!     .sort(doc! { "name": 1 })
//!     .limit(10)
//!     .build();
//! ```

use bson::Document;
use serde::{Deserialize, Serialize};

/// A store-native query: filter, projection, ordering and pagination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Criteria {
    /// Store-native filter document. Empty matches every record.
    #[serde(rename = "where")]
    pub filter: Document,
    /// Attributes to return. `None` returns whole records.
    pub select: Option<Vec<String>>,
    /// Store-native sort document (`{ field: 1 | -1 }`).
    pub sort: Option<Document>,
    /// Maximum number of records to return.
    pub limit: Option<i64>,
    /// Number of records to skip.
    pub skip: Option<u64>,
}

impl Criteria {
    /// Criteria matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Criteria with only a filter.
    pub fn filter(filter: Document) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn builder() -> CriteriaBuilder {
        CriteriaBuilder::new()
    }

    /// Returns these criteria with projection-only fields removed.
    pub fn without_projection(mut self) -> Self {
        self.select = None;
        self
    }
}

impl From<Document> for Criteria {
    fn from(filter: Document) -> Self {
        Criteria::filter(filter)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CriteriaBuilder {
    criteria: Criteria,
}

impl CriteriaBuilder {
    pub fn new() -> Self {
        CriteriaBuilder { criteria: Criteria::default() }
    }

    /// Sets the store-native filter document.
    pub fn filter(mut self, filter: Document) -> Self {
        self.criteria.filter = filter;
        self
    }

    /// Restricts the returned attributes.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.criteria.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.criteria.sort = Some(sort);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.criteria.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.criteria.skip = Some(skip);
        self
    }

    pub fn build(self) -> Criteria {
        self.criteria
    }
}
