use crate::sort::SortSpec;

/// Options controlling find operations: sorting, skip and limit.
///
/// Supports method chaining:
///
/// ```rust,ignore
/// let options = FindOptions::new()
///     .sort(SortSpec::parse(r#"[{"age": -1}]"#)?)
///     .skip(10)
///     .limit(20);
/// ```
///
/// Skip applies after sorting, limit after skip. An omitted limit returns
/// everything after the skip; `limit(0)` returns nothing.
#[derive(Clone, Debug, Default)]
pub struct FindOptions {
    sort: Option<SortSpec>,
    skip: Option<u64>,
    limit: Option<u64>,
}

/// Creates `FindOptions` sorted by the given spec.
pub fn order_by(sort: SortSpec) -> FindOptions {
    FindOptions::new().sort(sort)
}

/// Creates `FindOptions` that skips a number of results.
pub fn skip_by(skip: u64) -> FindOptions {
    FindOptions::new().skip(skip)
}

/// Creates `FindOptions` that limits the number of results.
pub fn limit_to(limit: u64) -> FindOptions {
    FindOptions::new().limit(limit)
}

impl FindOptions {
    /// Creates options with no sort, no skip and no limit: every match in
    /// natural (creation) order.
    pub fn new() -> FindOptions {
        FindOptions::default()
    }

    pub fn sort(mut self, sort: SortSpec) -> FindOptions {
        self.sort = Some(sort);
        self
    }

    pub fn skip(mut self, skip: u64) -> FindOptions {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> FindOptions {
        self.limit = Some(limit);
        self
    }

    pub fn sort_spec(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn skip_count(&self) -> u64 {
        self.skip.unwrap_or(0)
    }

    pub fn limit_count(&self) -> Option<u64> {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_unbounded_natural_order() {
        let options = FindOptions::new();
        assert!(options.sort_spec().is_none());
        assert_eq!(options.skip_count(), 0);
        assert_eq!(options.limit_count(), None);
    }

    #[test]
    fn chaining_sets_all_fields() {
        let options = FindOptions::new()
            .sort(SortSpec::parse(r#"[{"age": 1}]"#).unwrap())
            .skip(4)
            .limit(2);
        assert!(options.sort_spec().is_some());
        assert_eq!(options.skip_count(), 4);
        assert_eq!(options.limit_count(), Some(2));
    }

    #[test]
    fn helper_constructors() {
        assert_eq!(skip_by(3).skip_count(), 3);
        assert_eq!(limit_to(7).limit_count(), Some(7));
        assert!(order_by(SortSpec::parse(r#"[{"a": 1}]"#).unwrap())
            .sort_spec()
            .is_some());
    }
}
