//! Conversion between caller records and store documents.
//!
//! Callers address records by `id`; the store keys them by `_id`, usually as an
//! `ObjectId`. Values and filters are rewritten on the way in and documents on the
//! way out, so neither side sees the other's convention.

use bson::{Bson, Document, doc, oid::ObjectId};

pub const RECORD_ID: &str = "id";
pub const STORE_ID: &str = "_id";

/// Rewrites caller values into a store document, mapping `id` to `_id`.
pub fn to_store_values(values: Document) -> Document {
    values
        .into_iter()
        .map(|(key, value)| {
            if key == RECORD_ID {
                (STORE_ID.to_string(), to_store_id(value))
            } else {
                (key, value)
            }
        })
        .collect()
}

/// Rewrites a caller filter into a store filter.
///
/// `id` becomes `_id` wherever it appears as a field, including below `$and`, `$or`
/// and `$nor`, and 24 character hex strings compared against it become `ObjectId`s.
pub fn to_store_filter(filter: Document) -> Document {
    filter
        .into_iter()
        .map(|(key, value)| match key.as_str() {
            RECORD_ID | STORE_ID => (STORE_ID.to_string(), to_store_id(value)),
            "$and" | "$or" | "$nor" => (key, map_clauses(value)),
            _ => (key, value),
        })
        .collect()
}

fn map_clauses(value: Bson) -> Bson {
    match value {
        Bson::Array(clauses) => Bson::Array(
            clauses
                .into_iter()
                .map(|clause| match clause {
                    Bson::Document(clause) => Bson::Document(to_store_filter(clause)),
                    other => other,
                })
                .collect(),
        ),
        other => other,
    }
}

/// Converts an id value, recursing into arrays and operator documents.
fn to_store_id(value: Bson) -> Bson {
    match value {
        Bson::String(hex) => match ObjectId::parse_str(&hex) {
            Ok(oid) => Bson::ObjectId(oid),
            Err(_) => Bson::String(hex),
        },
        Bson::Array(values) => Bson::Array(values.into_iter().map(to_store_id).collect()),
        Bson::Document(operators) => Bson::Document(
            operators
                .into_iter()
                .map(|(op, operand)| {
                    if op.starts_with('$') {
                        (op, to_store_id(operand))
                    } else {
                        (op, operand)
                    }
                })
                .collect(),
        ),
        other => other,
    }
}

/// Rewrites a store document into a caller record, exposing `_id` as `id`.
pub fn from_store(document: Document) -> Document {
    let mut record = Document::new();

    if let Some(id) = document.get(STORE_ID) {
        record.insert(
            RECORD_ID,
            match id {
                Bson::ObjectId(oid) => Bson::String(oid.to_hex()),
                other => other.clone(),
            },
        );
    }

    for (key, value) in document {
        if key != STORE_ID {
            record.insert(key, value);
        }
    }

    record
}

/// Ensures a store document carries an `_id`, generating one when missing.
pub fn ensure_store_id(document: &mut Document) {
    if !document.contains_key(STORE_ID) {
        document.insert(STORE_ID, ObjectId::new());
    }
}

/// Builds a store projection from selected attribute names.
pub fn to_store_projection(select: &[String]) -> Document {
    select
        .iter()
        .map(|field| {
            let field = if field == RECORD_ID { STORE_ID } else { field.as_str() };
            (field.to_string(), Bson::Int32(1))
        })
        .collect()
}

/// Rewrites `id` to `_id` in a sort document.
pub fn to_store_sort(sort: Document) -> Document {
    sort.into_iter()
        .map(|(key, value)| {
            if key == RECORD_ID {
                (STORE_ID.to_string(), value)
            } else {
                (key, value)
            }
        })
        .collect()
}

/// A filter matching exactly the given store ids.
pub fn ids_filter(ids: Vec<Bson>) -> Document {
    doc! { STORE_ID: { "$in": ids } }
}
