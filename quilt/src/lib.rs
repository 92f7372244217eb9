//! Quilt is an embedded, schema-flexible JSON document layer.
//!
//! Documents live in named collections and carry no fixed schema; any JSON
//! object is a valid document. On top of that flexibility the library offers
//! partial-match queries, declarative per-field constraints, multi-key
//! sorting over a single total order across JSON types, and skip/limit
//! pagination. Storage is pluggable behind the
//! [store::CollectionStore] trait, with an in-memory backend included.
//!
//! ```rust
//! use quilt::collection::{CollectionService, Document, FindOptions};
//! use quilt::filter::Query;
//! use quilt::sort::SortSpec;
//!
//! # fn main() -> quilt::errors::QuiltResult<()> {
//! let db = CollectionService::in_memory();
//!
//! db.insert("people", Document::from_json(r#"{"name": "Sarah", "age": 22}"#)?)?;
//! db.insert("people", Document::from_json(r#"{"name": "Mike", "age": 31}"#)?)?;
//! db.insert("people", Document::from_json(r#"{"name": "Brian", "age": 31}"#)?)?;
//!
//! let options = FindOptions::new()
//!     .sort(SortSpec::parse(r#"[{"name": 1}]"#)?)
//!     .limit(10);
//! let adults = db.find("people", &Query::parse(r#"{"age": 31}"#)?, &options)?;
//! assert_eq!(adults.len(), 2);
//! assert_eq!(adults[0].get("name"), Some(&quilt::common::Value::from("Brian")));
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod common;
pub mod constraint;
pub mod errors;
pub mod filter;
pub mod sort;
pub mod store;

pub use collection::{CollectionService, Document, FindOptions};
pub use constraint::ConstraintSpec;
pub use errors::{ErrorKind, QuiltError, QuiltResult};
pub use filter::Query;
pub use sort::SortSpec;
