use crate::common::Value;
use crate::errors::{ErrorKind, QuiltError, QuiltResult};
use smallvec::SmallVec;
use std::fmt::{Debug, Display, Formatter};

/// One segment of a parsed dotted path.
///
/// A segment consisting only of ASCII digits parses as an array index;
/// anything else is an object field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// The outcome of resolving a path against a value.
///
/// Resolution keeps three situations distinguishable end to end: the path
/// leads nowhere (`Absent`), the path leads to an explicit JSON null
/// (`Present(&Value::Null)`), or the path leads to a non-null value. The
/// matcher, the constraint enforcer and the sort engine all depend on the
/// absent/present-null distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    Absent,
    Present(&'a Value),
}

impl<'a> Resolution<'a> {
    pub fn is_present(&self) -> bool {
        matches!(self, Resolution::Present(_))
    }

    /// True only for an explicit null at the resolved location.
    pub fn is_present_null(&self) -> bool {
        matches!(self, Resolution::Present(Value::Null))
    }

    /// The resolved value, if any. Present(null) yields `Some(&Value::Null)`.
    pub fn value(&self) -> Option<&'a Value> {
        match self {
            Resolution::Present(v) => Some(v),
            Resolution::Absent => None,
        }
    }
}

/// A dot-delimited path parsed once into segments and reused across the
/// matcher, the sort engine and the constraint enforcer.
///
/// `"address.city"` walks two object fields; `"addresses.0.city"` walks an
/// object field, an array index, then another field. The empty path resolves
/// to the root value itself.
#[derive(Clone, PartialEq, Eq)]
pub struct PathExpression {
    raw: String,
    segments: SmallVec<[PathSegment; 4]>,
}

impl PathExpression {
    /// Parses a dotted path string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSpec` if the path contains an empty segment, such as
    /// `"a..b"`, `".a"` or `"a."`.
    pub fn parse(raw: &str) -> QuiltResult<PathExpression> {
        let mut segments = SmallVec::new();
        if !raw.is_empty() {
            for part in raw.split('.') {
                if part.is_empty() {
                    log::error!("Path '{}' contains an empty segment", raw);
                    return Err(QuiltError::new(
                        &format!("Path '{}' contains an empty segment", raw),
                        ErrorKind::InvalidSpec,
                    ));
                }
                segments.push(Self::parse_segment(part));
            }
        }
        Ok(PathExpression {
            raw: raw.to_string(),
            segments,
        })
    }

    fn parse_segment(part: &str) -> PathSegment {
        // all-digit segments are array indices; a run of digits too long for
        // usize can never index a real array, so it stays a field name
        if part.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = part.parse::<usize>() {
                return PathSegment::Index(index);
            }
        }
        PathSegment::Field(part.to_string())
    }

    /// The original dotted string this expression was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Resolves this path against a value, segment by segment.
    ///
    /// - object + field segment: present if the key exists (even mapped to
    ///   null), absent otherwise
    /// - array + index segment: present if the index is in range
    /// - any mismatch (index against an object, field against an array, any
    ///   segment against a scalar): absent
    /// - the empty path resolves to the root as present
    pub fn resolve<'a>(&self, root: &'a Value) -> Resolution<'a> {
        Self::walk(&self.segments, root)
    }

    /// Walks a slice of segments from a starting value. Shared between
    /// [PathExpression::resolve] and document-rooted resolution.
    pub(crate) fn walk<'a>(segments: &[PathSegment], start: &'a Value) -> Resolution<'a> {
        let mut current = start;
        for segment in segments {
            match (segment, current) {
                (PathSegment::Field(name), Value::Object(doc)) => match doc.get(name) {
                    Some(next) => current = next,
                    None => return Resolution::Absent,
                },
                (PathSegment::Index(i), Value::Array(items)) => match items.get(*i) {
                    Some(next) => current = next,
                    None => return Resolution::Absent,
                },
                _ => return Resolution::Absent,
            }
        }
        Resolution::Present(current)
    }
}

impl Display for PathExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl Debug for PathExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "PathExpression({})", self.raw)
    }
}
