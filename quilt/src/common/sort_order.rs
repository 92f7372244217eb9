/// Specifies the direction for sorting documents.
///
/// In JSON sort specs ascending is written as `1` and descending as `-1`,
/// mirroring the MongoDB convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Sort from smallest to largest value.
    Ascending,
    /// Sort from largest to smallest value.
    Descending,
}
