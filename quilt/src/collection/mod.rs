//! Named collections of schema-flexible documents.
//!
//! [Document] is the unit of storage, [CollectionService] the operational
//! surface over it: insert, save, find, remove and constraint management,
//! all routed through a [crate::store::CollectionStore] backend.

mod collection_service;
mod doc_id;
mod document;
mod find_options;

pub use collection_service::CollectionService;
pub use doc_id::random_doc_id;
pub use document::Document;
pub use find_options::{limit_to, order_by, skip_by, FindOptions};
