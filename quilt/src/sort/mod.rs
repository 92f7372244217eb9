//! Multi-key document sorting.
//!
//! A [SortSpec] is an ordered list of (path, direction) keys parsed from a
//! JSON array of single-key objects: `[{"b.c": 1}, {"name": -1}]` sorts
//! ascending by `b.c`, then descending by `name` within ties.
//!
//! Values order across categories as null < boolean < number < string <
//! array < object (see [Value]'s `Ord`). A key that resolves absent on a
//! document sorts below every present value for that key, explicit null
//! included; descending reverses the whole key comparison, absent placement
//! included. The comparator returns `Equal` on a full tie across every key —
//! callers apply it with a stable sort over the natural (creation order)
//! scan, which realizes the creation-sequence tie-break and keeps fully-tied
//! results in insertion order.

use crate::collection::Document;
use crate::common::{PathExpression, Resolution, SortOrder};
use crate::errors::{ErrorKind, QuiltError, QuiltResult};
use itertools::Itertools;
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};

/// A single sort key: a parsed path and a direction.
#[derive(Clone, Debug)]
pub struct SortKey {
    path: PathExpression,
    order: SortOrder,
}

impl SortKey {
    pub fn new(path: PathExpression, order: SortOrder) -> SortKey {
        SortKey { path, order }
    }

    pub fn path(&self) -> &PathExpression {
        &self.path
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }
}

/// An ordered list of sort keys, evaluated left to right.
#[derive(Clone, Debug, Default)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    pub fn new(keys: Vec<SortKey>) -> SortSpec {
        SortSpec { keys }
    }

    /// Parses a sort spec from JSON text.
    ///
    /// The spec must be an array of objects with exactly one key each — the
    /// dotted path — mapped to the integer `1` (ascending) or `-1`
    /// (descending). An element with zero or several keys is rejected, since
    /// JSON object key order is not reliable.
    pub fn parse(text: &str) -> QuiltResult<SortSpec> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Self::from_json_value(&json)
    }

    /// Builds a sort spec from an already-parsed JSON value.
    pub fn from_json_value(json: &serde_json::Value) -> QuiltResult<SortSpec> {
        let elements = json.as_array().ok_or_else(|| {
            log::error!("Sort spec must be a JSON array, got: {}", json);
            QuiltError::new("Sort spec must be a JSON array", ErrorKind::InvalidSpec)
        })?;

        let mut keys = Vec::with_capacity(elements.len());
        for element in elements {
            let entry = element.as_object().ok_or_else(|| {
                QuiltError::new(
                    "Sort spec element must be an object",
                    ErrorKind::InvalidSpec,
                )
            })?;
            let (raw_path, direction) = match entry.iter().exactly_one() {
                Ok(pair) => pair,
                Err(_) => {
                    log::error!("Sort spec element must have exactly one key: {}", element);
                    return Err(QuiltError::new(
                        "Sort spec element must have exactly one key",
                        ErrorKind::InvalidSpec,
                    ));
                }
            };
            let path = PathExpression::parse(raw_path)?;
            if path.segments().is_empty() {
                return Err(QuiltError::new(
                    "Sort spec path cannot be empty",
                    ErrorKind::InvalidSpec,
                ));
            }
            let order = match direction.as_i64() {
                Some(1) => SortOrder::Ascending,
                Some(-1) => SortOrder::Descending,
                _ => {
                    log::error!(
                        "Sort direction for '{}' must be 1 or -1, got: {}",
                        raw_path,
                        direction
                    );
                    return Err(QuiltError::new(
                        &format!("Sort direction for '{}' must be 1 or -1", raw_path),
                        ErrorKind::InvalidSpec,
                    ));
                }
            };
            keys.push(SortKey::new(path, order));
        }
        Ok(SortSpec { keys })
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Compares two documents under this spec, evaluating keys left to right
    /// and returning on the first non-equal key.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for key in &self.keys {
            let ordering = compare_at(key, a, b);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl Display for SortSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let rendered = self
            .keys
            .iter()
            .map(|key| {
                let direction = match key.order {
                    SortOrder::Ascending => 1,
                    SortOrder::Descending => -1,
                };
                format!("{{\"{}\": {}}}", key.path, direction)
            })
            .join(", ");
        write!(f, "[{}]", rendered)
    }
}

/// One key comparison. Absent ranks below every present value; the whole
/// result reverses for a descending key.
fn compare_at(key: &SortKey, a: &Document, b: &Document) -> Ordering {
    let left = a.resolve(key.path());
    let right = b.resolve(key.path());
    let ordering = match (left, right) {
        (Resolution::Absent, Resolution::Absent) => Ordering::Equal,
        (Resolution::Absent, Resolution::Present(_)) => Ordering::Less,
        (Resolution::Present(_), Resolution::Absent) => Ordering::Greater,
        (Resolution::Present(x), Resolution::Present(y)) => x.cmp(y),
    };
    match key.order() {
        SortOrder::Ascending => ordering,
        SortOrder::Descending => ordering.reverse(),
    }
}
