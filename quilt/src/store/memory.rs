use crate::collection::Document;
use crate::errors::{ErrorKind, QuiltError, QuiltResult};
use crate::store::CollectionStore;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Documents of one collection, keyed by creation sequence number.
///
/// The sequence number is assigned once when a document enters the
/// collection and never changes afterwards; `replace` keeps it. Iterating
/// `by_seq` therefore yields natural (creation) order.
#[derive(Default)]
struct CollectionData {
    next_seq: u64,
    by_seq: BTreeMap<u64, Document>,
    id_index: HashMap<String, u64>,
}

impl CollectionData {
    fn insert(&mut self, id: String, doc: Document) -> QuiltResult<()> {
        if self.id_index.contains_key(&id) {
            log::debug!("Rejecting insert, id '{}' already exists", id);
            return Err(QuiltError::new(
                &format!("A document with _id '{}' already exists", id),
                ErrorKind::DuplicateKey,
            ));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_seq.insert(seq, doc);
        self.id_index.insert(id, seq);
        Ok(())
    }

    fn replace(&mut self, id: &str, doc: Document) {
        match self.id_index.get(id) {
            Some(seq) => {
                self.by_seq.insert(*seq, doc);
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.by_seq.insert(seq, doc);
                self.id_index.insert(id.to_string(), seq);
            }
        }
    }

    fn delete(&mut self, id: &str) -> bool {
        match self.id_index.remove(id) {
            Some(seq) => {
                self.by_seq.remove(&seq);
                true
            }
            None => false,
        }
    }
}

/// In-memory [CollectionStore] backend.
///
/// Collections live in a [DashMap]; its per-entry locking makes every trait
/// call an atomic read-modify-write on the target collection, which is all
/// the concurrency contract the collection service requires. Cloning the
/// store shares the underlying state.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<DashMap<String, CollectionData>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            collections: Arc::new(DashMap::new()),
        }
    }
}

impl CollectionStore for InMemoryStore {
    fn list_collections(&self) -> QuiltResult<Vec<String>> {
        let mut names: Vec<String> = self
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn collection_exists(&self, name: &str) -> QuiltResult<bool> {
        Ok(self.collections.contains_key(name))
    }

    fn create_collection(&self, name: &str) -> QuiltResult<bool> {
        let mut created = false;
        self.collections.entry(name.to_string()).or_insert_with(|| {
            created = true;
            CollectionData::default()
        });
        Ok(created)
    }

    fn delete_collection(&self, name: &str) -> QuiltResult<bool> {
        Ok(self.collections.remove(name).is_some())
    }

    fn scan(&self, name: &str) -> QuiltResult<Vec<Document>> {
        Ok(self
            .collections
            .get(name)
            .map(|data| data.by_seq.values().cloned().collect())
            .unwrap_or_default())
    }

    fn get_by_id(&self, name: &str, id: &str) -> QuiltResult<Option<Document>> {
        Ok(self.collections.get(name).and_then(|data| {
            data.id_index
                .get(id)
                .and_then(|seq| data.by_seq.get(seq).cloned())
        }))
    }

    fn insert_atomic(&self, name: &str, doc: Document) -> QuiltResult<()> {
        let id = doc.id().map(str::to_string).ok_or_else(|| {
            QuiltError::new(
                "Document reached the store without a string _id",
                ErrorKind::InternalError,
            )
        })?;
        let mut data = self.collections.entry(name.to_string()).or_default();
        data.insert(id, doc)
    }

    fn replace_atomic(&self, name: &str, id: &str, doc: Document) -> QuiltResult<()> {
        let mut data = self.collections.entry(name.to_string()).or_default();
        data.replace(id, doc);
        Ok(())
    }

    fn delete_matching(&self, name: &str, ids: &HashSet<String>) -> QuiltResult<u64> {
        let mut count = 0;
        if let Some(mut data) = self.collections.get_mut(name) {
            for id in ids {
                if data.delete(id) {
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}
