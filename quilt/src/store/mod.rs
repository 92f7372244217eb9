//! Storage collaborator abstraction.
//!
//! The collection service drives any backend through [CollectionStore]. Each
//! trait call is one atomic read-modify-write unit from the service's point
//! of view: the backend must apply it all-or-nothing, and the service never
//! observes partial writes. Durability, transactions and replication live
//! behind this boundary.

mod memory;

pub use memory::InMemoryStore;

use crate::collection::Document;
use crate::errors::QuiltResult;
use std::collections::HashSet;

/// Contract between the collection service and a document storage backend.
///
/// Collections are created implicitly by the first write. Reads against a
/// missing collection yield empty results, never errors.
pub trait CollectionStore: Send + Sync {
    /// Names of all existing collections.
    fn list_collections(&self) -> QuiltResult<Vec<String>>;

    fn collection_exists(&self, name: &str) -> QuiltResult<bool>;

    /// Creates an empty collection. Returns `false` if it already existed.
    fn create_collection(&self, name: &str) -> QuiltResult<bool>;

    /// Drops a collection and all its documents. Returns `false` if it did
    /// not exist.
    fn delete_collection(&self, name: &str) -> QuiltResult<bool>;

    /// All documents of a collection in natural (creation) order. Empty for
    /// a missing collection.
    fn scan(&self, name: &str) -> QuiltResult<Vec<Document>>;

    /// Direct `_id` lookup.
    fn get_by_id(&self, name: &str, id: &str) -> QuiltResult<Option<Document>>;

    /// Inserts a document whose `_id` is already set, creating the
    /// collection if needed.
    ///
    /// # Errors
    ///
    /// `DuplicateKey` if the id already exists in the collection.
    fn insert_atomic(&self, name: &str, doc: Document) -> QuiltResult<()>;

    /// Replaces the document stored under `id` wholesale, creating it (and
    /// the collection) if absent. A replaced document keeps its original
    /// position in natural order.
    fn replace_atomic(&self, name: &str, id: &str, doc: Document) -> QuiltResult<()>;

    /// Deletes every listed id that exists; returns how many were removed.
    fn delete_matching(&self, name: &str, ids: &HashSet<String>) -> QuiltResult<u64>;
}
