//! Common types shared across the crate: the [Value] sum type, parsed
//! [PathExpression]s, sort direction, and small concurrency helpers.

mod path;
mod sort_order;
mod value;

pub use path::{PathExpression, PathSegment, Resolution};
pub use sort_order::SortOrder;
pub use value::{Value, ValueType};

use parking_lot::RwLock;
use std::sync::Arc;

/// The reserved top-level field holding a document's identifier.
pub const DOC_ID: &str = "_id";

/// The exact length of a generated document id (24 hex characters, 96 bits).
pub const DOC_ID_LENGTH: usize = 24;

/// A shared, lock-protected value.
pub type Atomic<T> = Arc<RwLock<T>>;

/// Wraps a value in an [Atomic].
pub fn atomic<T>(value: T) -> Atomic<T> {
    Arc::new(RwLock::new(value))
}
