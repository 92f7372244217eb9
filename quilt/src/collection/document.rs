use im::OrdMap;

use crate::common::{PathExpression, PathSegment, Resolution, Value, DOC_ID};
use crate::errors::{ErrorKind, QuiltError, QuiltResult};
use std::fmt::{Debug, Display, Formatter};

/// A JSON object stored in a collection.
///
/// Documents are composed of string keys mapped to [Value]s. The top-level
/// `_id` field, always a string once persisted, identifies the document
/// uniquely within its collection. Documents are immutable in the store
/// except via full replace.
///
/// Keys here are plain field names: `get("a.b")` looks up the literal key
/// `"a.b"`. Dotted traversal through nested objects and arrays is the job of
/// [PathExpression].
///
/// The backing map is `im::OrdMap`, a persistent ordered map: cloning is
/// O(1) via structural sharing, so documents can be handed around the
/// matcher, sorter and store without copying.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Document {
    data: OrdMap<String, Value>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document {
            data: OrdMap::new(),
        }
    }

    /// Parses a document from JSON text. The text must be a JSON object.
    pub fn from_json(text: &str) -> QuiltResult<Document> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Document::from_value(Value::from(json))
    }

    /// Converts a [Value] into a document, rejecting non-objects.
    pub fn from_value(value: Value) -> QuiltResult<Document> {
        match value {
            Value::Object(doc) => Ok(doc),
            other => {
                log::error!("Expected a JSON object, got {}", other.value_type());
                Err(QuiltError::new(
                    &format!("Expected a JSON object, got {}", other.value_type()),
                    ErrorKind::InvalidSpec,
                ))
            }
        }
    }

    /// Serializes this document as compact JSON text.
    pub fn to_json(&self) -> String {
        Value::Object(self.clone()).to_json()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Associates a value with a key, validating the key is non-empty.
    pub fn put<T: Into<Value>>(&mut self, key: &str, value: T) -> QuiltResult<()> {
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(QuiltError::new(
                "Document does not support empty key",
                ErrorKind::InvalidSpec,
            ));
        }
        self.data = self.data.update(key.to_string(), value.into());
        Ok(())
    }

    /// Inserts without validation; used when building documents from parsed
    /// JSON, where keys come from a real object and may be any string.
    pub fn insert(&mut self, key: String, value: Value) {
        self.data = self.data.update(key, value);
    }

    /// Returns the value mapped to a key.
    ///
    /// `None` means the key is absent; `Some(&Value::Null)` means the key is
    /// present with an explicit null. The two are never conflated.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Removes a key, returning its previous value if it existed.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let previous = self.data.get(key).cloned();
        if previous.is_some() {
            self.data = self.data.without(key);
        }
        previous
    }

    /// The document's `_id`, if present and a string.
    pub fn id(&self) -> Option<&str> {
        self.data.get(DOC_ID).and_then(|v| v.as_str())
    }

    /// The raw `_id` value regardless of its category. A non-string `_id` is
    /// rejected at write time by the collection service.
    pub fn raw_id(&self) -> Option<&Value> {
        self.data.get(DOC_ID)
    }

    pub fn has_id(&self) -> bool {
        self.data.contains_key(DOC_ID)
    }

    /// Sets the `_id` field.
    pub fn set_id(&mut self, id: String) {
        self.data = self.data.update(DOC_ID.to_string(), Value::String(id));
    }

    /// Iterates over (key, value) entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// Resolves a parsed path against this document.
    ///
    /// The first segment must name a top-level field; the rest walk nested
    /// values per [PathExpression::resolve]. The empty path has no meaning on
    /// a bare document and resolves absent.
    pub fn resolve<'a>(&'a self, path: &PathExpression) -> Resolution<'a> {
        let (first, rest) = match path.segments().split_first() {
            Some(parts) => parts,
            None => return Resolution::Absent,
        };
        let start = match first {
            PathSegment::Field(name) => self.get(name),
            PathSegment::Index(_) => None,
        };
        match start {
            Some(value) => PathExpression::walk(rest, value),
            None => Resolution::Absent,
        }
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Document {
            data: iter.into_iter().collect(),
        }
    }
}

impl serde::Serialize for Document {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.data.len()))?;
        for (key, value) in self.data.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> serde::Deserialize<'de> for Document {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Document::from_value(value).map_err(serde::de::Error::custom)
    }
}
