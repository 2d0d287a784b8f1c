//! Scalar type definitions used throughout the crate.

/// Integer type used to refer to rows of a
/// [``crate::NodeTable``] or [``crate::MutationTable``],
/// and for site ids.
///
/// Negative values other than [``NULL_ID``] are invalid.
pub type IdType = i32;

/// A genomic coordinate.
///
/// Intervals are half-open: a segment or edgeset spans
/// `[left, right)`.
pub type Position = f64;

/// A node's birth time.  Larger values are older.
pub type Time = f64;

/// Length type for the per-row length columns of
/// variable-width table fields.
pub type ListLenType = u32;

/// Integer type for population (deme) labels.
/// `-1` means "no population".
pub type PopulationType = i32;

/// The null id, used to mark unassigned output nodes.
pub const NULL_ID: IdType = -1;

/// Default growth increment for table columns.
pub const DEFAULT_MAX_ROWS_INCREMENT: usize = 1024;
