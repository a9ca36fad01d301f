//! Filter evaluation for in-memory documents.
//!
//! Evaluates store-native filter documents against stored documents. The supported
//! subset covers what the adapter and typical criteria translators emit:
//!
//! - implicit equality (`{ field: value }`), including membership for array fields
//! - comparison: `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`
//! - membership: `$in`, `$nin`
//! - `$exists`, `$not`
//! - logical: `$and`, `$or`, `$nor`
//!
//! Field names may be dotted paths into embedded documents.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, DateTime, Document, oid::ObjectId};

use docbridge_core::error::{StoreError, StoreResult};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so that `Int32(1)` equals `Double(1.0)`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    ObjectId(ObjectId),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Types without a comparison. Never equal to anything.
    Opaque,
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Opaque,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.bytes().partial_cmp(&b.bytes()),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a possibly dotted field path.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    match path.split_once('.') {
        Some((head, rest)) => match document.get(head)? {
            Bson::Document(inner) => lookup(inner, rest),
            _ => None,
        },
        None => document.get(path),
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Whether the document matches every clause of the filter.
    pub fn evaluate(&self, filter: &Document) -> StoreResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => {
                    let mut all = true;
                    for clause in Self::clauses(key, condition)? {
                        if !self.evaluate(clause)? {
                            all = false;
                            break;
                        }
                    }
                    all
                }
                "$or" => {
                    let mut any = false;
                    for clause in Self::clauses(key, condition)? {
                        if self.evaluate(clause)? {
                            any = true;
                            break;
                        }
                    }
                    any
                }
                "$nor" => {
                    let mut none = true;
                    for clause in Self::clauses(key, condition)? {
                        if self.evaluate(clause)? {
                            none = false;
                            break;
                        }
                    }
                    none
                }
                operator if operator.starts_with('$') => {
                    return Err(StoreError::Backend(format!(
                        "unsupported top-level operator {}",
                        operator
                    )));
                }
                field => Self::matches_condition(lookup(self.document, field), condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    pub fn filter_documents<I>(documents: I, filter: &Document) -> StoreResult<Vec<Document>>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).evaluate(filter)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    fn clauses<'f>(operator: &str, condition: &'f Bson) -> StoreResult<Vec<&'f Document>> {
        match condition {
            Bson::Array(clauses) => clauses
                .iter()
                .map(|clause| {
                    clause.as_document().ok_or_else(|| {
                        StoreError::Backend(format!("{} clauses must be documents", operator))
                    })
                })
                .collect(),
            _ => Err(StoreError::Backend(format!("{} requires an array", operator))),
        }
    }

    fn is_operator_document(condition: &Bson) -> bool {
        match condition {
            Bson::Document(ops) => ops.keys().next().is_some_and(|key| key.starts_with('$')),
            _ => false,
        }
    }

    fn matches_condition(value: Option<&Bson>, condition: &Bson) -> StoreResult<bool> {
        if !Self::is_operator_document(condition) {
            return Ok(Self::equals(value, condition));
        }

        let Bson::Document(operators) = condition else {
            unreachable!("checked by is_operator_document");
        };

        for (operator, operand) in operators {
            if !Self::matches_operator(value, operator, operand)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn matches_operator(value: Option<&Bson>, operator: &str, operand: &Bson) -> StoreResult<bool> {
        match operator {
            "$eq" => Ok(Self::equals(value, operand)),
            "$ne" => Ok(!Self::equals(value, operand)),
            "$gt" => Ok(Self::compare(value, operand, |o| o == Ordering::Greater)),
            "$gte" => Ok(Self::compare(value, operand, |o| o != Ordering::Less)),
            "$lt" => Ok(Self::compare(value, operand, |o| o == Ordering::Less)),
            "$lte" => Ok(Self::compare(value, operand, |o| o != Ordering::Greater)),
            "$in" => match operand {
                Bson::Array(candidates) => Ok(candidates
                    .iter()
                    .any(|candidate| Self::equals(value, candidate))),
                _ => Err(StoreError::Backend("$in requires an array".to_string())),
            },
            "$nin" => match operand {
                Bson::Array(candidates) => Ok(!candidates
                    .iter()
                    .any(|candidate| Self::equals(value, candidate))),
                _ => Err(StoreError::Backend("$nin requires an array".to_string())),
            },
            "$exists" => Ok(value.is_some() == Self::truthy(operand)),
            "$not" => Ok(!Self::matches_condition(value, operand)?),
            _ => Err(StoreError::Backend(format!("unsupported operator {}", operator))),
        }
    }

    /// Equality as the store defines it: a missing field equals null, and an array
    /// field equals any scalar it contains.
    fn equals(value: Option<&Bson>, target: &Bson) -> bool {
        match value {
            None => matches!(target, Bson::Null),
            Some(Bson::Array(items)) if !matches!(target, Bson::Array(_)) => items
                .iter()
                .any(|item| Comparable::from(item) == Comparable::from(target)),
            Some(value) => Comparable::from(value) == Comparable::from(target),
        }
    }

    fn compare(value: Option<&Bson>, target: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
        let target = Comparable::from(target);
        let check = |item: &Bson| {
            Comparable::from(item)
                .partial_cmp(&target)
                .is_some_and(&accept)
        };

        match value {
            Some(Bson::Array(items)) => items.iter().any(check),
            Some(value) => check(value),
            None => false,
        }
    }

    fn truthy(operand: &Bson) -> bool {
        match operand {
            Bson::Boolean(value) => *value,
            Bson::Int32(value) => *value != 0,
            Bson::Int64(value) => *value != 0,
            Bson::Double(value) => *value != 0.0,
            Bson::Null => false,
            _ => true,
        }
    }
}

/// Orders two documents by a store-native sort document.
pub(crate) fn compare_documents(left: &Document, right: &Document, sort: &Document) -> Ordering {
    for (field, direction) in sort {
        let descending = matches!(direction, Bson::Int32(d) if *d < 0)
            || matches!(direction, Bson::Int64(d) if *d < 0)
            || matches!(direction, Bson::Double(d) if *d < 0.0);

        let left_value = lookup(left, field).map(Comparable::from).unwrap_or(Comparable::Null);
        let right_value = lookup(right, field).map(Comparable::from).unwrap_or(Comparable::Null);

        let ordering = if descending {
            right_value.partial_cmp(&left_value)
        } else {
            left_value.partial_cmp(&right_value)
        }
        .unwrap_or(Ordering::Equal);

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

/// Applies an inclusion or exclusion projection.
pub(crate) fn project(document: Document, projection: &Document) -> Document {
    let include_id = !matches!(
        projection.get("_id"),
        Some(Bson::Int32(0)) | Some(Bson::Int64(0)) | Some(Bson::Boolean(false))
    );
    let inclusive = projection
        .values()
        .any(DocumentEvaluator::truthy);

    document
        .into_iter()
        .filter(|(key, _)| {
            if key == "_id" {
                return include_id;
            }
            match projection.get(key) {
                Some(value) => DocumentEvaluator::truthy(value),
                None => !inclusive,
            }
        })
        .collect()
}
