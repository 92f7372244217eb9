//! Partial-match queries over documents.
//!
//! A [Query] is a JSON object matched against documents by recursive partial
//! structural containment: every query key must be present in the document
//! and its value must match, while extra document keys are ignored. Nested
//! objects recurse; scalars and arrays require deep equality.
//!
//! Query keys are plain field names, not dotted paths — to constrain a
//! nested field, nest the query object: `{"pet": {"species": "cat"}}`.

use crate::collection::Document;
use crate::common::Value;
use crate::errors::QuiltResult;
use std::fmt::{Debug, Display, Formatter};

/// A parsed partial-match query.
///
/// Matching is pure and order-independent: a document matches when every
/// query key's value matches the corresponding document value, recursively.
/// The empty query matches everything.
#[derive(Clone, PartialEq, Eq)]
pub struct Query {
    root: Document,
}

impl Query {
    /// Parses a query from JSON text. The text must be a JSON object.
    pub fn parse(text: &str) -> QuiltResult<Query> {
        Ok(Query {
            root: Document::from_json(text)?,
        })
    }

    /// Builds a query from an already-parsed document.
    pub fn from_document(root: Document) -> Query {
        Query { root }
    }

    /// The query that matches every document.
    pub fn all() -> Query {
        Query {
            root: Document::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Evaluates this query against a document.
    pub fn matches(&self, doc: &Document) -> bool {
        matches_object(&self.root, doc)
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.root.to_json())
    }
}

impl Debug for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Query({})", self.root.to_json())
    }
}

/// Every key of `query` must be present in `target` with a matching value.
/// A key mapped to null in `target` is present; a missing key fails the
/// whole match even when the query value is null.
fn matches_object(query: &Document, target: &Document) -> bool {
    query.iter().all(|(key, query_value)| {
        match target.get(key) {
            Some(doc_value) => matches_value(query_value, doc_value),
            None => false,
        }
    })
}

/// Object query values recurse as partial matches; everything else requires
/// deep equality (type-aware, numeric across int/float, no other coercion).
fn matches_value(query_value: &Value, doc_value: &Value) -> bool {
    match query_value {
        Value::Object(inner) => match doc_value {
            Value::Object(target) => matches_object(inner, target),
            _ => false,
        },
        _ => query_value == doc_value,
    }
}
