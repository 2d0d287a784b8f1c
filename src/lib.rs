//! Tables, sorting, and simplification of tree sequences.
//!
//! This crate implements the table side of tree sequence recording
//! for population genetics simulation: growable column
//! [tables](crate::TableCollection) holding nodes, edgesets, sites,
//! mutations, and migrations; a [sorting
//! pass](crate::TableCollection::sort_tables_for_simplification)
//! placing edgesets in the (parent time, parent, left) order the
//! simplifier requires; and
//! [simplification](crate::simplify_tables) itself, which reduces a
//! recorded ancestral recombination graph to the minimal equivalent
//! graph ancestral to a set of samples.
//!
//! A typical round trip:
//!
//! ```
//! use tsreduce::*;
//!
//! let mut tables = TableCollection::new(1.0).unwrap();
//! let flags = NodeFlags::IS_SAMPLE.bits();
//! let s0 = tables.add_node(flags, 0.0, 0, b"").unwrap();
//! let s1 = tables.add_node(flags, 0.0, 0, b"").unwrap();
//! let anc = tables.add_node(0, 1.0, 0, b"").unwrap();
//! tables.add_edgeset(0.0, 1.0, anc, &[s0, s1]).unwrap();
//! tables.sort_tables_for_simplification().unwrap();
//!
//! let mut output = SimplificationOutput::new();
//! simplify_tables(
//!     &[s0, s1],
//!     SimplificationFlags::empty(),
//!     &mut tables,
//!     &mut output,
//! )
//! .unwrap();
//!
//! // Samples are renumbered 0 and 1, their ancestor follows.
//! assert_eq!(output.idmap, vec![0, 1, 2]);
//! assert_eq!(tables.num_edgesets(), 1);
//! ```

use thiserror::Error;

pub mod flags;
pub mod segment;
pub mod simplification;
mod table_sorter;
pub mod tables;
pub mod tsdef;

pub use flags::{node_is_sample, NodeFlags, SimplificationFlags};
pub use segment::{Segment, SegmentId, SegmentPool};
pub use simplification::{
    simplify_tables, SimplificationError, SimplificationOutput, Simplifier,
};
pub use tables::{
    EdgesetRow, EdgesetTable, MigrationRow, MigrationTable, MutationRow, MutationTable, NodeRow,
    NodeTable, SiteRow, SiteTable, TableCollection, TablesError, TablesResult,
};
pub use tsdef::{IdType, ListLenType, PopulationType, Position, Time, NULL_ID};

/// Top-level error type for the crate, wrapping the module error
/// enums.
#[derive(Error, Debug, PartialEq)]
pub enum TsreduceError {
    #[error("{value:?}")]
    TablesError {
        #[from]
        value: TablesError,
    },
    #[error("{value:?}")]
    SimplificationError {
        #[from]
        value: SimplificationError,
    },
}
