use bitflags::bitflags;

bitflags! {
    /// Flag bits stored in the `flags` column of a
    /// [``crate::NodeTable``].
    #[derive(Default)]
    pub struct NodeFlags: u32 {
        /// The node is a sample whose ancestry must be preserved
        /// by simplification.
        const IS_SAMPLE = 1 << 0;
    }
}

bitflags! {
    /// Modify the behavior of [``crate::simplify_tables``].
    #[derive(Default)]
    pub struct SimplificationFlags: u32 {
        /// Run the internal state checks after every step of the
        /// sweep.  Violations are programmer errors and panic.
        const VALIDATE_ALL = 1 << 0;
    }
}

/// Returns `true` if the raw flags word has the sample bit set.
pub fn node_is_sample(flags: u32) -> bool {
    flags & NodeFlags::IS_SAMPLE.bits() != 0
}
