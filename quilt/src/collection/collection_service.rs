use crate::collection::doc_id::{random_doc_id, MAX_ID_ATTEMPTS};
use crate::collection::{Document, FindOptions};
use crate::common::Value;
use crate::constraint::{ConstraintRegistry, ConstraintSpec};
use crate::errors::{ErrorKind, QuiltError, QuiltResult};
use crate::filter::Query;
use crate::store::CollectionStore;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Orchestrates document operations over an injected [CollectionStore].
///
/// The service parses nothing per document: queries, sort specs and
/// constraint specs arrive already parsed and are evaluated by streaming
/// candidate documents from the store through match → sort → skip/limit.
///
/// Each collection owns a [ConstraintRegistry], held here in a [DashMap] so
/// that registry mutation is serialized per collection: a concurrent write
/// observes either the pre- or post-mutation constraint set, never a
/// mixture. Cloning the service shares the underlying state (the handle
/// wraps an `Arc`).
#[derive(Clone)]
pub struct CollectionService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    store: Arc<dyn CollectionStore>,
    registries: DashMap<String, ConstraintRegistry>,
}

impl CollectionService {
    /// Creates a service over the given storage collaborator.
    pub fn new(store: Arc<dyn CollectionStore>) -> CollectionService {
        CollectionService {
            inner: Arc::new(ServiceInner {
                store,
                registries: DashMap::new(),
            }),
        }
    }

    /// Creates a service backed by a fresh [crate::store::InMemoryStore].
    pub fn in_memory() -> CollectionService {
        CollectionService::new(Arc::new(crate::store::InMemoryStore::new()))
    }

    /// Inserts a document, returning its id.
    ///
    /// With `_id` present it must be a string and must not already exist in
    /// the collection. Without one, a fresh 24-hex-character id is attached,
    /// re-drawn on the rare collision up to a bounded number of attempts.
    /// Constraints are enforced before anything is persisted; the collection
    /// is created implicitly on the first successful write.
    pub fn insert(&self, collection: &str, doc: Document) -> QuiltResult<String> {
        log::debug!("insert into '{}'", collection);
        match doc.raw_id() {
            Some(Value::String(id)) => {
                let id = id.clone();
                self.enforce(collection, &doc)?;
                self.inner.store.insert_atomic(collection, doc)?;
                Ok(id)
            }
            Some(other) => Err(invalid_id(other)),
            None => self.insert_with_generated_id(collection, doc),
        }
    }

    fn insert_with_generated_id(&self, collection: &str, doc: Document) -> QuiltResult<String> {
        for attempt in 0..MAX_ID_ATTEMPTS {
            let mut candidate = doc.clone();
            let id = random_doc_id();
            candidate.set_id(id.clone());
            if attempt == 0 {
                self.enforce(collection, &candidate)?;
            }
            match self.inner.store.insert_atomic(collection, candidate) {
                Ok(()) => return Ok(id),
                Err(err) if err.kind() == &ErrorKind::DuplicateKey => {
                    log::warn!(
                        "Generated id '{}' collided in '{}', retrying ({}/{})",
                        id,
                        collection,
                        attempt + 1,
                        MAX_ID_ATTEMPTS
                    );
                }
                Err(err) => return Err(err),
            }
        }
        log::error!("Exhausted id generation attempts for '{}'", collection);
        Err(QuiltError::new(
            &format!(
                "Could not generate a unique _id for '{}' in {} attempts",
                collection, MAX_ID_ATTEMPTS
            ),
            ErrorKind::IdGenerationExhausted,
        ))
    }

    /// Saves a document: insert when `_id` is absent, full-document replace
    /// when present (creating the entry if no such id exists). Constraints
    /// are re-enforced on every save. A replaced document keeps its original
    /// position in natural order.
    pub fn save(&self, collection: &str, doc: Document) -> QuiltResult<String> {
        log::debug!("save into '{}'", collection);
        match doc.raw_id() {
            None => self.insert(collection, doc),
            Some(Value::String(id)) => {
                let id = id.clone();
                self.enforce(collection, &doc)?;
                self.inner.store.replace_atomic(collection, &id, doc)?;
                Ok(id)
            }
            Some(other) => Err(invalid_id(other)),
        }
    }

    /// Finds documents matching a query.
    ///
    /// Streams the collection in natural order, keeps the matches, applies
    /// the sort spec if one is given (the sort is stable, so documents tied
    /// on every key keep creation order), then skip, then limit. An absent
    /// collection yields an empty result.
    pub fn find(
        &self,
        collection: &str,
        query: &Query,
        options: &FindOptions,
    ) -> QuiltResult<Vec<Document>> {
        let mut results: Vec<Document> = self
            .inner
            .store
            .scan(collection)?
            .into_iter()
            .filter(|doc| query.matches(doc))
            .collect();

        if let Some(sort) = options.sort_spec() {
            results.sort_by(|a, b| sort.compare(a, b));
        }

        let skip = usize::try_from(options.skip_count()).unwrap_or(usize::MAX);
        let limit = options
            .limit_count()
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        Ok(results.into_iter().skip(skip).take(limit).collect())
    }

    /// Finds the first matching document in natural order, if any.
    pub fn find_one(&self, collection: &str, query: &Query) -> QuiltResult<Option<Document>> {
        let mut found = self.find(collection, query, &FindOptions::new().limit(1))?;
        Ok(found.pop())
    }

    /// Direct `_id` lookup.
    pub fn find_one_by_id(&self, collection: &str, id: &str) -> QuiltResult<Option<Document>> {
        self.inner.store.get_by_id(collection, id)
    }

    /// Removes every matching document, returning how many were deleted.
    /// Zero, never an error, for empty or absent collections.
    pub fn remove(&self, collection: &str, query: &Query) -> QuiltResult<u64> {
        let ids: HashSet<String> = self
            .inner
            .store
            .scan(collection)?
            .into_iter()
            .filter(|doc| query.matches(doc))
            .filter_map(|doc| doc.id().map(str::to_string))
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }
        self.inner.store.delete_matching(collection, &ids)
    }

    /// Removes at most one matching document (the first in natural order).
    pub fn remove_one(&self, collection: &str, query: &Query) -> QuiltResult<u64> {
        let first = self.find_one(collection, query)?;
        match first.and_then(|doc| doc.id().map(str::to_string)) {
            Some(id) => self.remove_one_by_id(collection, &id),
            None => Ok(0),
        }
    }

    /// Removes the document with the given `_id`, returning 1 or 0.
    pub fn remove_one_by_id(&self, collection: &str, id: &str) -> QuiltResult<u64> {
        let ids: HashSet<String> = [id.to_string()].into_iter().collect();
        self.inner.store.delete_matching(collection, &ids)
    }

    /// Registers constraints on a collection. Returns `true` iff at least
    /// one constraint was newly added; fails with `ConstraintConflict` on a
    /// contradictory `$type`, leaving the registry unchanged.
    pub fn add_constraints(&self, collection: &str, spec: &ConstraintSpec) -> QuiltResult<bool> {
        let mut registry = self
            .inner
            .registries
            .entry(collection.to_string())
            .or_default();
        registry.add(spec)
    }

    /// Removes the named constraints. Returns `true` iff any existed; never
    /// errors, even for a collection that was never written to.
    pub fn remove_constraints(&self, collection: &str, spec: &ConstraintSpec) -> bool {
        match self.inner.registries.get_mut(collection) {
            Some(mut registry) => registry.remove(spec),
            None => false,
        }
    }

    /// Registered constraints as sorted display strings.
    pub fn list_constraints(&self, collection: &str) -> Vec<String> {
        self.inner
            .registries
            .get(collection)
            .map(|registry| registry.list())
            .unwrap_or_default()
    }

    /// Explicitly creates a collection. Returns `false` if it existed.
    pub fn create_collection(&self, name: &str) -> QuiltResult<bool> {
        self.inner.store.create_collection(name)
    }

    /// Drops a collection together with its constraint registry.
    pub fn delete_collection(&self, name: &str) -> QuiltResult<bool> {
        self.inner.registries.remove(name);
        self.inner.store.delete_collection(name)
    }

    pub fn list_collections(&self) -> QuiltResult<Vec<String>> {
        self.inner.store.list_collections()
    }

    pub fn collection_exists(&self, name: &str) -> QuiltResult<bool> {
        self.inner.store.collection_exists(name)
    }

    fn enforce(&self, collection: &str, doc: &Document) -> QuiltResult<()> {
        match self.inner.registries.get(collection) {
            Some(registry) => registry.enforce(doc),
            None => Ok(()),
        }
    }
}

fn invalid_id(value: &Value) -> QuiltError {
    log::error!("_id must be a string, got {}", value.value_type());
    QuiltError::new(
        &format!("_id must be a string, got {}", value.value_type()),
        ErrorKind::InvalidSpec,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::DOC_ID_LENGTH;

    fn service() -> CollectionService {
        CollectionService::in_memory()
    }

    fn doc(text: &str) -> Document {
        Document::from_json(text).unwrap()
    }

    fn query(text: &str) -> Query {
        Query::parse(text).unwrap()
    }

    #[test]
    fn insert_with_caller_supplied_id() {
        let svc = service();
        let id = svc
            .insert("people", doc(r#"{"_id": "user@example.com", "name": "Some User"}"#))
            .unwrap();
        assert_eq!(id, "user@example.com");
        assert_eq!(svc.list_collections().unwrap(), vec!["people"]);
    }

    #[test]
    fn insert_generates_24_hex_id_when_absent() {
        let svc = service();
        let id = svc.insert("people", doc(r#"{"name": "Some User"}"#)).unwrap();
        assert_eq!(id.len(), DOC_ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));

        let found = svc.find_one_by_id("people", &id).unwrap().unwrap();
        assert_eq!(found.get("name"), Some(&Value::from("Some User")));
        assert_eq!(found.id(), Some(id.as_str()));
    }

    #[test]
    fn insert_duplicate_id_fails_and_preserves_state() {
        let svc = service();
        let d = doc(r#"{"_id": "u1", "first_name": "steve"}"#);
        svc.insert("people", d.clone()).unwrap();

        let err = svc.insert("people", d).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DuplicateKey);
        assert_eq!(
            svc.find("people", &Query::all(), &FindOptions::new())
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn insert_rejects_non_string_id() {
        let svc = service();
        let err = svc.insert("people", doc(r#"{"_id": 42}"#)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidSpec);
    }

    #[test]
    fn insert_round_trip_preserves_document() {
        let svc = service();
        let original = doc(r#"{"name": "Sarah", "pet": {"species": "cat", "toys": [1, 2]}}"#);
        let id = svc.insert("people", original.clone()).unwrap();

        let mut expected = original;
        expected.set_id(id.clone());
        let found = svc.find_one_by_id("people", &id).unwrap().unwrap();
        assert_eq!(found, expected);
    }

    #[test]
    fn save_without_id_inserts() {
        let svc = service();
        let id = svc.save("people", doc(r#"{"name": "x"}"#)).unwrap();
        assert!(svc.find_one_by_id("people", &id).unwrap().is_some());
    }

    #[test]
    fn save_replaces_wholesale() {
        let svc = service();
        svc.insert("people", doc(r#"{"_id": "u1", "name": "old", "age": 30}"#))
            .unwrap();
        svc.save("people", doc(r#"{"_id": "u1", "name": "new"}"#)).unwrap();

        let found = svc.find_one_by_id("people", "u1").unwrap().unwrap();
        assert_eq!(found.get("name"), Some(&Value::from("new")));
        // full replace, not merge: the old field is gone
        assert_eq!(found.get("age"), None);
    }

    #[test]
    fn save_creates_when_id_is_unknown() {
        let svc = service();
        let id = svc
            .save("people", doc(r#"{"_id": "fresh", "name": "x"}"#))
            .unwrap();
        assert_eq!(id, "fresh");
        assert!(svc.find_one_by_id("people", "fresh").unwrap().is_some());
    }

    #[test]
    fn find_on_absent_collection_is_empty() {
        let svc = service();
        assert!(svc
            .find("nope", &Query::all(), &FindOptions::new())
            .unwrap()
            .is_empty());
        assert_eq!(svc.find_one("nope", &query(r#"{"name": "Mike"}"#)).unwrap(), None);
        assert_eq!(svc.find_one_by_id("nope", "x").unwrap(), None);
    }

    #[test]
    fn find_keeps_natural_order_without_sort() {
        let svc = service();
        for i in 0..10 {
            svc.insert("things", doc(&format!(r#"{{"num": {}}}"#, i)))
                .unwrap();
        }
        let nums: Vec<_> = svc
            .find("things", &Query::all(), &FindOptions::new())
            .unwrap()
            .iter()
            .map(|d| d.get("num").cloned().unwrap())
            .collect();
        assert_eq!(nums, (0..10).map(Value::from).collect::<Vec<_>>());
    }

    #[test]
    fn find_applies_skip_and_limit_after_filtering() {
        let svc = service();
        for i in 0..10 {
            svc.insert("things", doc(&format!(r#"{{"num": {}}}"#, i)))
                .unwrap();
        }

        let page = svc
            .find("things", &Query::all(), &FindOptions::new().skip(4).limit(2))
            .unwrap();
        let nums: Vec<_> = page.iter().map(|d| d.get("num").cloned().unwrap()).collect();
        assert_eq!(nums, vec![Value::Int(4), Value::Int(5)]);

        // skip beyond the end
        assert!(svc
            .find("things", &Query::all(), &FindOptions::new().skip(30).limit(4))
            .unwrap()
            .is_empty());

        // limit zero
        assert!(svc
            .find("things", &Query::all(), &FindOptions::new().limit(0))
            .unwrap()
            .is_empty());

        // omitted limit returns everything after the skip
        assert_eq!(
            svc.find("things", &Query::all(), &FindOptions::new().skip(6))
                .unwrap()
                .len(),
            4
        );
    }

    #[test]
    fn find_one_returns_first_match_in_natural_order() {
        let svc = service();
        svc.insert("people", doc(r#"{"name": "a", "age": 32}"#)).unwrap();
        svc.insert("people", doc(r#"{"name": "b", "age": 32}"#)).unwrap();

        let found = svc.find_one("people", &query(r#"{"age": 32}"#)).unwrap().unwrap();
        assert_eq!(found.get("name"), Some(&Value::from("a")));
        assert_eq!(svc.find_one("people", &query(r#"{"age": 1}"#)).unwrap(), None);
    }

    #[test]
    fn remove_deletes_all_matches_and_counts() {
        let svc = service();
        svc.insert("people", doc(r#"{"name": "a", "age": 32}"#)).unwrap();
        svc.insert("people", doc(r#"{"name": "b", "age": 32}"#)).unwrap();
        svc.insert("people", doc(r#"{"name": "c", "age": 40}"#)).unwrap();

        assert_eq!(svc.remove("people", &query(r#"{"age": 32}"#)).unwrap(), 2);
        let rest = svc.find("people", &Query::all(), &FindOptions::new()).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].get("name"), Some(&Value::from("c")));

        // nothing matches
        assert_eq!(svc.remove("people", &query(r#"{"age": 99}"#)).unwrap(), 0);
        // absent collection
        assert_eq!(svc.remove("ghosts", &query(r#"{"age": 22}"#)).unwrap(), 0);
    }

    #[test]
    fn remove_one_deletes_first_match_only() {
        let svc = service();
        svc.insert("people", doc(r#"{"name": "a", "age": 32}"#)).unwrap();
        svc.insert("people", doc(r#"{"name": "b", "age": 32}"#)).unwrap();

        assert_eq!(svc.remove_one("people", &query(r#"{"age": 32}"#)).unwrap(), 1);
        let rest = svc.find("people", &Query::all(), &FindOptions::new()).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].get("name"), Some(&Value::from("b")));

        assert_eq!(svc.remove_one("people", &query(r#"{"age": 99}"#)).unwrap(), 0);
    }

    #[test]
    fn remove_one_by_id_returns_zero_for_absent_id() {
        let svc = service();
        svc.insert("people", doc(r#"{"_id": "u1", "name": "a"}"#)).unwrap();

        assert_eq!(svc.remove_one_by_id("people", "absent").unwrap(), 0);
        assert_eq!(
            svc.find("people", &Query::all(), &FindOptions::new())
                .unwrap()
                .len(),
            1
        );

        assert_eq!(svc.remove_one_by_id("people", "u1").unwrap(), 1);
        assert_eq!(svc.remove_one_by_id("people", "u1").unwrap(), 0);
    }

    #[test]
    fn constraints_gate_inserts() {
        let svc = service();
        let spec = ConstraintSpec::parse(r#"{"first_name": {"$required": true}}"#).unwrap();
        assert!(svc.add_constraints("cool_things", &spec).unwrap());
        assert!(!svc.add_constraints("cool_things", &spec).unwrap());

        let err = svc.insert("cool_things", doc(r#"{"age": 1}"#)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConstraintViolation);

        // explicit null satisfies required
        svc.insert("cool_things", doc(r#"{"first_name": null, "age": 1}"#))
            .unwrap();
    }

    #[test]
    fn constraints_gate_saves_too() {
        let svc = service();
        svc.insert("c", doc(r#"{"_id": "u1", "first_name": "a"}"#)).unwrap();
        let spec = ConstraintSpec::parse(r#"{"first_name": {"$notnull": true}}"#).unwrap();
        svc.add_constraints("c", &spec).unwrap();

        let err = svc
            .save("c", doc(r#"{"_id": "u1", "first_name": null}"#))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConstraintViolation);

        // original untouched
        let found = svc.find_one_by_id("c", "u1").unwrap().unwrap();
        assert_eq!(found.get("first_name"), Some(&Value::from("a")));
    }

    #[test]
    fn type_conflict_leaves_registry_showing_original() {
        let svc = service();
        svc.add_constraints(
            "c",
            &ConstraintSpec::parse(r#"{"age": {"$type": "number"}}"#).unwrap(),
        )
        .unwrap();

        let err = svc
            .add_constraints(
                "c",
                &ConstraintSpec::parse(r#"{"age": {"$type": "string"}}"#).unwrap(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConstraintConflict);
        assert_eq!(svc.list_constraints("c"), vec!["age:type:number"]);
    }

    #[test]
    fn remove_constraints_never_errors() {
        let svc = service();
        let spec = ConstraintSpec::parse(r#"{"a": {"$required": true}}"#).unwrap();
        // collection never touched
        assert!(!svc.remove_constraints("ghosts", &spec));

        svc.add_constraints("c", &spec).unwrap();
        assert!(svc.remove_constraints("c", &spec));
        assert!(!svc.remove_constraints("c", &spec));
    }

    #[test]
    fn constraint_removal_is_not_retroactive() {
        let svc = service();
        let spec = ConstraintSpec::parse(r#"{"age": {"$type": "number"}}"#).unwrap();
        svc.add_constraints("c", &spec).unwrap();
        svc.insert("c", doc(r#"{"age": 1}"#)).unwrap();
        svc.remove_constraints("c", &spec);

        // documents written under the constraint stay as they are, and new
        // writes are no longer checked
        svc.insert("c", doc(r#"{"age": "not a number"}"#)).unwrap();
        assert_eq!(
            svc.find("c", &Query::all(), &FindOptions::new()).unwrap().len(),
            2
        );
    }

    #[test]
    fn delete_collection_drops_documents_and_constraints() {
        let svc = service();
        svc.insert("c", doc(r#"{"a": 1}"#)).unwrap();
        svc.add_constraints(
            "c",
            &ConstraintSpec::parse(r#"{"a": {"$required": true}}"#).unwrap(),
        )
        .unwrap();

        assert!(svc.delete_collection("c").unwrap());
        assert!(!svc.collection_exists("c").unwrap());
        assert!(svc.list_constraints("c").is_empty());

        // a new collection under the same name starts clean
        svc.insert("c", doc(r#"{"b": 2}"#)).unwrap();
        assert_eq!(
            svc.find("c", &Query::all(), &FindOptions::new()).unwrap().len(),
            1
        );
    }

    #[test]
    fn create_collection_is_explicit_and_idempotent() {
        let svc = service();
        assert!(svc.create_collection("c").unwrap());
        assert!(!svc.create_collection("c").unwrap());
        assert!(svc.collection_exists("c").unwrap());
        assert!(svc.find("c", &Query::all(), &FindOptions::new()).unwrap().is_empty());
    }
}
