//! Declarative field constraints enforced before every write.
//!
//! A constraint binds a rule to a dotted path:
//!
//! - `$required` — the path must resolve present (explicit null passes)
//! - `$notnull` — the path must not resolve to an explicit null (absent passes)
//! - `$type` — when present and non-null, the value must belong to the named
//!   JSON category
//!
//! Constraint specs arrive as JSON objects mapping paths to rule objects,
//! e.g. `{"address.city": {"$required": true, "$type": "string"}}`. The
//! `$required` and `$notnull` values are truthy-checked: `false` and `null`
//! mean "not requested", anything else requests the rule.
//!
//! At most one `$type` constraint may exist per path. Registering a `$type`
//! with a different category on an already-typed path rejects the entire
//! call and leaves the registry unchanged — it is a conflict, not an
//! overwrite.

use crate::collection::Document;
use crate::common::{PathExpression, Resolution, ValueType};
use crate::errors::{ErrorKind, QuiltError, QuiltResult};
use itertools::Itertools;
use std::fmt::{Debug, Display, Formatter};

/// The rule half of a constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstraintKind {
    Required,
    NotNull,
    Type(ValueType),
}

impl ConstraintKind {
    /// True when both sides are the same rule family, ignoring the `$type`
    /// category. Registry identity is (path, kind family).
    fn same_family(&self, other: &ConstraintKind) -> bool {
        matches!(
            (self, other),
            (ConstraintKind::Required, ConstraintKind::Required)
                | (ConstraintKind::NotNull, ConstraintKind::NotNull)
                | (ConstraintKind::Type(_), ConstraintKind::Type(_))
        )
    }
}

impl Display for ConstraintKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintKind::Required => write!(f, "required"),
            ConstraintKind::NotNull => write!(f, "notnull"),
            ConstraintKind::Type(category) => write!(f, "type:{}", category),
        }
    }
}

/// A single path-bound rule.
#[derive(Clone, Debug)]
pub struct Constraint {
    path: PathExpression,
    kind: ConstraintKind,
}

impl Constraint {
    pub fn new(path: PathExpression, kind: ConstraintKind) -> Constraint {
        Constraint { path, kind }
    }

    pub fn path(&self) -> &PathExpression {
        &self.path
    }

    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    /// Checks a document against this constraint.
    fn check(&self, doc: &Document) -> bool {
        let resolved = doc.resolve(&self.path);
        match &self.kind {
            ConstraintKind::Required => resolved.is_present(),
            ConstraintKind::NotNull => !resolved.is_present_null(),
            ConstraintKind::Type(expected) => match resolved {
                Resolution::Present(value) if !value.is_null() => {
                    value.value_type() == *expected
                }
                // absent and explicit null are exempt from type checks
                _ => true,
            },
        }
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.path, self.kind)
    }
}

/// A parsed constraint spec: the flat list of (path, kind) items named by
/// one JSON spec object.
#[derive(Clone, Debug, Default)]
pub struct ConstraintSpec {
    items: Vec<Constraint>,
}

impl ConstraintSpec {
    /// Parses a constraint spec from JSON text.
    pub fn parse(text: &str) -> QuiltResult<ConstraintSpec> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Self::from_json_value(&json)
    }

    /// Builds a constraint spec from an already-parsed JSON value.
    pub fn from_json_value(json: &serde_json::Value) -> QuiltResult<ConstraintSpec> {
        let map = json.as_object().ok_or_else(|| {
            log::error!("Constraint spec must be a JSON object, got: {}", json);
            QuiltError::new(
                "Constraint spec must be a JSON object",
                ErrorKind::InvalidSpec,
            )
        })?;

        let mut items = Vec::new();
        for (raw_path, rules) in map {
            let path = PathExpression::parse(raw_path)?;
            if path.segments().is_empty() {
                return Err(QuiltError::new(
                    "Constraint path cannot be empty",
                    ErrorKind::InvalidSpec,
                ));
            }
            let rules = rules.as_object().ok_or_else(|| {
                log::error!("Constraint rules for '{}' must be an object", raw_path);
                QuiltError::new(
                    &format!("Constraint rules for '{}' must be an object", raw_path),
                    ErrorKind::InvalidSpec,
                )
            })?;

            for (rule_name, rule_value) in rules {
                match rule_name.as_str() {
                    "$required" => {
                        if is_truthy(rule_value) {
                            items.push(Constraint::new(path.clone(), ConstraintKind::Required));
                        }
                    }
                    "$notnull" => {
                        if is_truthy(rule_value) {
                            items.push(Constraint::new(path.clone(), ConstraintKind::NotNull));
                        }
                    }
                    "$type" => {
                        let name = rule_value.as_str().ok_or_else(|| {
                            QuiltError::new(
                                &format!("$type value for '{}' must be a string", raw_path),
                                ErrorKind::InvalidSpec,
                            )
                        })?;
                        let category = ValueType::parse(name)?;
                        items.push(Constraint::new(
                            path.clone(),
                            ConstraintKind::Type(category),
                        ));
                    }
                    other => {
                        log::error!("Unknown constraint rule '{}' on path '{}'", other, raw_path);
                        return Err(QuiltError::new(
                            &format!("Unknown constraint rule '{}'", other),
                            ErrorKind::InvalidSpec,
                        ));
                    }
                }
            }
        }
        Ok(ConstraintSpec { items })
    }

    pub fn items(&self) -> &[Constraint] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// `false` and `null` decline a rule; everything else requests it. Matches
/// specs in the wild that write `{"$notnull": 1}`.
fn is_truthy(value: &serde_json::Value) -> bool {
    !matches!(
        value,
        serde_json::Value::Null | serde_json::Value::Bool(false)
    )
}

/// The per-collection set of registered constraints.
///
/// Registration is atomic per call: a `$type` conflict anywhere in a spec
/// rejects the whole call with the registry untouched. Removing a constraint
/// is never retroactive — documents written while it was registered stay as
/// they are.
#[derive(Clone, Debug, Default)]
pub struct ConstraintRegistry {
    entries: Vec<Constraint>,
}

impl ConstraintRegistry {
    pub fn new() -> ConstraintRegistry {
        ConstraintRegistry {
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Registers every constraint in the spec that is not already present.
    ///
    /// Returns `true` iff at least one entry was newly added; `false` when
    /// every requested item already existed unchanged.
    ///
    /// # Errors
    ///
    /// `ConstraintConflict` if the spec names a `$type` category different
    /// from one already registered on the same path. The check runs before
    /// any mutation, so a failing call leaves the registry unchanged.
    pub fn add(&mut self, spec: &ConstraintSpec) -> QuiltResult<bool> {
        for item in spec.items() {
            if let ConstraintKind::Type(requested) = item.kind() {
                let existing = self.entries.iter().find(|entry| {
                    entry.path().raw() == item.path().raw()
                        && matches!(entry.kind(), ConstraintKind::Type(_))
                });
                if let Some(entry) = existing {
                    if let ConstraintKind::Type(current) = entry.kind() {
                        if current != requested {
                            log::error!(
                                "Contradictory $type constraint on '{}': {} already registered, {} requested",
                                item.path(),
                                current,
                                requested
                            );
                            return Err(QuiltError::new(
                                &format!(
                                    "Contradictory $type constraint on '{}': {} already registered, {} requested",
                                    item.path(),
                                    current,
                                    requested
                                ),
                                ErrorKind::ConstraintConflict,
                            ));
                        }
                    }
                }
            }
        }

        let mut added = false;
        for item in spec.items() {
            let exists = self.entries.iter().any(|entry| {
                entry.path().raw() == item.path().raw() && entry.kind().same_family(item.kind())
            });
            if !exists {
                self.entries.push(item.clone());
                added = true;
            }
        }
        Ok(added)
    }

    /// Removes exactly the entries named by the spec. A `$type` entry is
    /// removed only when the named category matches the registered one.
    ///
    /// Returns `true` iff at least one entry actually existed. Never errors.
    pub fn remove(&mut self, spec: &ConstraintSpec) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| {
            !spec.items().iter().any(|item| {
                entry.path().raw() == item.path().raw() && entry.kind() == item.kind()
            })
        });
        self.entries.len() < before
    }

    /// Registered constraints as display strings (`"{path}:{kind}"` or
    /// `"{path}:type:{category}"`), sorted lexicographically.
    pub fn list(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.to_string())
            .sorted()
            .collect()
    }

    /// Validates a document against every registered constraint, failing
    /// fast on the first violation.
    pub fn enforce(&self, doc: &Document) -> QuiltResult<()> {
        for entry in &self.entries {
            if !entry.check(doc) {
                log::debug!("Document violates constraint {}", entry);
                return Err(QuiltError::new(
                    &format!("Document violates constraint '{}'", entry),
                    ErrorKind::ConstraintViolation,
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::from_json(text).unwrap()
    }

    fn spec(text: &str) -> ConstraintSpec {
        ConstraintSpec::parse(text).unwrap()
    }

    #[test]
    fn parse_builds_items_per_rule() {
        let parsed = spec(
            r#"{"first_name": {"$required": true, "$notnull": true, "$type": "string"},
                "age": {"$type": "number"}}"#,
        );
        assert_eq!(parsed.items().len(), 4);
    }

    #[test]
    fn parse_truthy_values_request_rules() {
        // bedquilt-style numeric truthiness
        let parsed = spec(r#"{"first_name": {"$notnull": 1}}"#);
        assert_eq!(parsed.items().len(), 1);

        // false and null decline
        let parsed = spec(r#"{"first_name": {"$required": false, "$notnull": null}}"#);
        assert!(parsed.is_empty());
    }

    #[test]
    fn parse_rejects_malformed_specs() {
        let cases = [
            r#"[1]"#,                               // not an object
            r#"{"a": 1}"#,                          // rules not an object
            r#"{"a": {"$wat": true}}"#,             // unknown rule
            r#"{"a": {"$type": 1}}"#,               // $type not a string
            r#"{"a": {"$type": "integer"}}"#,       // unknown category
            r#"{"": {"$required": true}}"#,         // empty path
            r#"{"a..b": {"$required": true}}"#,     // empty segment
        ];
        for text in cases {
            let err = ConstraintSpec::parse(text).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidSpec, "spec: {}", text);
        }
    }

    #[test]
    fn add_returns_true_then_false() {
        let mut registry = ConstraintRegistry::new();
        let s = spec(r#"{"first_name": {"$required": true}}"#);
        assert!(registry.add(&s).unwrap());
        assert!(!registry.add(&s).unwrap());
    }

    #[test]
    fn add_is_true_when_any_item_is_new() {
        let mut registry = ConstraintRegistry::new();
        registry
            .add(&spec(r#"{"first_name": {"$required": true}}"#))
            .unwrap();
        // one item already present, one new
        let added = registry
            .add(&spec(r#"{"first_name": {"$required": true, "$notnull": true}}"#))
            .unwrap();
        assert!(added);
    }

    #[test]
    fn remove_returns_whether_anything_existed() {
        let mut registry = ConstraintRegistry::new();
        let s = spec(r#"{"age": {"$notnull": true}}"#);

        assert!(!registry.remove(&s));
        registry.add(&s).unwrap();
        assert!(registry.remove(&s));
        assert!(!registry.remove(&s));
    }

    #[test]
    fn remove_type_requires_matching_category() {
        let mut registry = ConstraintRegistry::new();
        registry.add(&spec(r#"{"age": {"$type": "number"}}"#)).unwrap();

        assert!(!registry.remove(&spec(r#"{"age": {"$type": "string"}}"#)));
        assert_eq!(registry.list(), vec!["age:type:number"]);

        assert!(registry.remove(&spec(r#"{"age": {"$type": "number"}}"#)));
        assert!(registry.is_empty());
    }

    #[test]
    fn contradictory_type_is_a_conflict_and_atomic() {
        let mut registry = ConstraintRegistry::new();
        registry.add(&spec(r#"{"age": {"$type": "number"}}"#)).unwrap();

        // conflicting category rejects the whole call, including the
        // otherwise-new notnull item
        let err = registry
            .add(&spec(r#"{"age": {"$type": "string", "$notnull": true}}"#))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConstraintConflict);
        assert_eq!(registry.list(), vec!["age:type:number"]);

        // same category is not a conflict, and adds nothing
        assert!(!registry.add(&spec(r#"{"age": {"$type": "number"}}"#)).unwrap());

        // a different path is fine
        assert!(registry
            .add(&spec(r#"{"first_name": {"$type": "string"}}"#))
            .unwrap());
    }

    #[test]
    fn list_is_sorted_lexicographically() {
        let mut registry = ConstraintRegistry::new();
        registry
            .add(&spec(
                r#"{"first_name": {"$required": true, "$type": "string"},
                    "age": {"$notnull": true},
                    "addresses.0.city": {"$required": true}}"#,
            ))
            .unwrap();
        assert_eq!(
            registry.list(),
            vec![
                "addresses.0.city:required",
                "age:notnull",
                "first_name:required",
                "first_name:type:string",
            ]
        );
    }

    #[test]
    fn required_accepts_explicit_null() {
        let mut registry = ConstraintRegistry::new();
        registry
            .add(&spec(r#"{"first_name": {"$required": true}}"#))
            .unwrap();

        let err = registry.enforce(&doc(r#"{"age": 1}"#)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConstraintViolation);
        assert!(err.message().contains("first_name:required"));

        registry.enforce(&doc(r#"{"first_name": null, "age": 1}"#)).unwrap();
        registry.enforce(&doc(r#"{"first_name": "steve"}"#)).unwrap();
    }

    #[test]
    fn notnull_rejects_only_explicit_null() {
        let mut registry = ConstraintRegistry::new();
        registry
            .add(&spec(r#"{"first_name": {"$notnull": true}}"#))
            .unwrap();

        registry.enforce(&doc(r#"{"age": 24}"#)).unwrap();
        registry.enforce(&doc(r#"{"first_name": "steve"}"#)).unwrap();

        let err = registry
            .enforce(&doc(r#"{"first_name": null, "age": 24}"#))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConstraintViolation);
    }

    #[test]
    fn type_exempts_absent_and_null() {
        let mut registry = ConstraintRegistry::new();
        registry.add(&spec(r#"{"age": {"$type": "number"}}"#)).unwrap();

        registry.enforce(&doc(r#"{"first_name": "paul"}"#)).unwrap();
        registry.enforce(&doc(r#"{"age": null}"#)).unwrap();
        registry.enforce(&doc(r#"{"age": 22}"#)).unwrap();
        registry.enforce(&doc(r#"{"age": 22.5}"#)).unwrap();

        // booleans, strings, arrays and objects all fail a number constraint
        for bad in [
            r#"{"age": "wat"}"#,
            r#"{"age": [2]}"#,
            r#"{"age": {"wat": 2}}"#,
            r#"{"age": false}"#,
        ] {
            let err = registry.enforce(&doc(bad)).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ConstraintViolation, "doc: {}", bad);
        }
    }

    #[test]
    fn constraints_on_nested_paths() {
        let mut registry = ConstraintRegistry::new();
        registry
            .add(&spec(r#"{"address.city": {"$required": true}}"#))
            .unwrap();

        // nested structure missing the field
        assert!(registry
            .enforce(&doc(r#"{"address": {"street": "baker street"}}"#))
            .is_err());
        // whole nested structure null means the path is absent
        assert!(registry.enforce(&doc(r#"{"address": null}"#)).is_err());
        // present and null passes required
        registry
            .enforce(&doc(r#"{"address": {"city": null}}"#))
            .unwrap();
        registry
            .enforce(&doc(r#"{"address": {"city": "london"}}"#))
            .unwrap();
    }

    #[test]
    fn constraints_on_array_index_paths() {
        let mut registry = ConstraintRegistry::new();
        registry
            .add(&spec(r#"{"stuff.0.first_name": {"$required": true}}"#))
            .unwrap();

        assert!(registry.enforce(&doc(r#"{"first_name": "paul"}"#)).is_err());
        assert!(registry.enforce(&doc(r#"{"stuff": []}"#)).is_err());
        registry
            .enforce(&doc(r#"{"stuff": [{"first_name": null}]}"#))
            .unwrap();
        registry
            .enforce(&doc(r#"{"stuff": [{"first_name": "wat"}]}"#))
            .unwrap();
    }

    #[test]
    fn enforce_checks_all_registered_rules() {
        let mut registry = ConstraintRegistry::new();
        registry
            .add(&spec(
                r#"{"address.city": {"$type": "string", "$required": true, "$notnull": true}}"#,
            ))
            .unwrap();

        assert!(registry
            .enforce(&doc(r#"{"address": {"city": null}}"#))
            .is_err());
        assert!(registry
            .enforce(&doc(r#"{"address": {"street": "baker street"}}"#))
            .is_err());
        assert!(registry
            .enforce(&doc(r#"{"address": {"city": 42}}"#))
            .is_err());
        registry
            .enforce(&doc(r#"{"address": {"city": "london"}}"#))
            .unwrap();
    }

    #[test]
    fn empty_registry_accepts_everything() {
        let registry = ConstraintRegistry::new();
        registry.enforce(&doc(r#"{"anything": [1, null, {}]}"#)).unwrap();
        assert!(registry.list().is_empty());
    }
}
