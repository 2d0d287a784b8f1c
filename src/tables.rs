//! Growable column tables for tree sequences.
//!
//! Each table is a column-major record store.  Fixed-width fields
//! live in one `Vec` per column.  Variable-width fields (node names,
//! edgeset children, ancestral/derived states) use a flattened pair:
//! one contiguous payload buffer plus a per-row length column, so that
//! row `j` occupies payload positions
//! `[sum(len[0..j]), sum(len[0..j]) + len[j])`.
//! The sorter and simplifier take contiguous slices into the payload,
//! so this layout is load-bearing and not an implementation detail.

use crate::tsdef::{
    IdType, ListLenType, PopulationType, Position, Time, DEFAULT_MAX_ROWS_INCREMENT,
};
use std::io;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum TablesError {
    /// Column growth failed.
    #[error("out of memory")]
    NoMemory,
    /// An argument failed validation.
    #[error("bad parameter: {msg}")]
    BadParam { msg: &'static str },
    /// A row refers to an id beyond the referenced table.
    #[error("id out of bounds: {found:?}")]
    OutOfBounds { found: IdType },
}

/// Result type for operations on tables
pub type TablesResult<T> = std::result::Result<T, TablesError>;

impl From<std::collections::TryReserveError> for TablesError {
    fn from(_: std::collections::TryReserveError) -> Self {
        TablesError::NoMemory
    }
}

const TABLE_SEP: &str = "-----------------------------------------\n";

// Grow a column so that it can hold new_max_rows elements.
fn expand_column<T>(column: &mut Vec<T>, new_max_rows: usize) -> TablesResult<()> {
    let additional = new_max_rows.saturating_sub(column.len());
    column.try_reserve_exact(additional)?;
    Ok(())
}

fn check_increment(value: usize) -> TablesResult<usize> {
    if value == 0 {
        Err(TablesError::BadParam {
            msg: "increments must be > 0",
        })
    } else {
        Ok(value)
    }
}

fn non_negative_id(x: IdType) -> TablesResult<()> {
    if x < 0 {
        return Err(TablesError::BadParam {
            msg: "ids must be non-negative",
        });
    }
    Ok(())
}

/*************************
 * node table
 *************************/

/// One row of a [``NodeTable``].
#[derive(Debug, PartialEq)]
pub struct NodeRow<'a> {
    pub flags: u32,
    pub time: Time,
    pub population: PopulationType,
    pub name: &'a [u8],
}

/// Table of nodes (individuals).
///
/// Nodes are immutable once written.  The `flags` column carries
/// [``crate::NodeFlags``] bits; `time` is a real-valued age where
/// larger means older.
#[derive(Clone, Debug)]
pub struct NodeTable {
    max_rows_: usize,
    max_rows_increment_: usize,
    max_total_name_length_: usize,
    max_total_name_length_increment_: usize,
    pub(crate) flags_: Vec<u32>,
    pub(crate) time_: Vec<Time>,
    pub(crate) population_: Vec<PopulationType>,
    pub(crate) name_: Vec<u8>,
    pub(crate) name_length_: Vec<ListLenType>,
}

impl Default for NodeTable {
    fn default() -> Self {
        Self::from_increments(DEFAULT_MAX_ROWS_INCREMENT, DEFAULT_MAX_ROWS_INCREMENT)
    }
}

impl NodeTable {
    fn from_increments(max_rows_increment: usize, max_total_name_length_increment: usize) -> Self {
        NodeTable {
            max_rows_: 0,
            max_rows_increment_: max_rows_increment,
            max_total_name_length_: 0,
            max_total_name_length_increment_: max_total_name_length_increment,
            flags_: vec![],
            time_: vec![],
            population_: vec![],
            name_: vec![],
            name_length_: vec![],
        }
    }

    /// Create a table with default growth increments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with explicit growth increments for the fixed
    /// columns and the name payload.
    pub fn with_increments(
        max_rows_increment: usize,
        max_total_name_length_increment: usize,
    ) -> TablesResult<Self> {
        Ok(Self::from_increments(
            check_increment(max_rows_increment)?,
            check_increment(max_total_name_length_increment)?,
        ))
    }

    fn expand_fixed_columns(&mut self, new_size: usize) -> TablesResult<()> {
        if new_size > self.max_rows_ {
            expand_column(&mut self.flags_, new_size)?;
            expand_column(&mut self.time_, new_size)?;
            expand_column(&mut self.population_, new_size)?;
            expand_column(&mut self.name_length_, new_size)?;
            self.max_rows_ = new_size;
        }
        Ok(())
    }

    fn expand_name(&mut self, new_size: usize) -> TablesResult<()> {
        if new_size > self.max_total_name_length_ {
            expand_column(&mut self.name_, new_size)?;
            self.max_total_name_length_ = new_size;
        }
        Ok(())
    }

    /// Append a row, growing columns by their increments if needed.
    /// Returns the new row's id.
    pub fn add_row(
        &mut self,
        flags: u32,
        time: Time,
        population: PopulationType,
        name: &[u8],
    ) -> TablesResult<IdType> {
        if self.num_rows() == self.max_rows_ {
            let new_size = self.max_rows_ + self.max_rows_increment_;
            self.expand_fixed_columns(new_size)?;
        }
        while self.name_.len() + name.len() >= self.max_total_name_length_ {
            let new_size = self.max_total_name_length_ + self.max_total_name_length_increment_;
            self.expand_name(new_size)?;
        }
        self.name_.extend_from_slice(name);
        self.flags_.push(flags);
        self.time_.push(time);
        self.population_.push(population);
        self.name_length_.push(name.len() as ListLenType);
        Ok((self.num_rows() - 1) as IdType)
    }

    /// Bulk-replace the table contents, growing to exactly the
    /// required size.
    ///
    /// `population` defaults to `-1` for every row when absent;
    /// `name` defaults to the empty name.
    pub fn set_columns(
        &mut self,
        num_rows: usize,
        flags: &[u32],
        time: &[Time],
        population: Option<&[PopulationType]>,
        name: Option<(&[u8], &[ListLenType])>,
    ) -> TablesResult<()> {
        if flags.len() != num_rows || time.len() != num_rows {
            return Err(TablesError::BadParam {
                msg: "column length does not match num_rows",
            });
        }
        if let Some(p) = population {
            if p.len() != num_rows {
                return Err(TablesError::BadParam {
                    msg: "population length does not match num_rows",
                });
            }
        }
        if let Some((payload, lengths)) = name {
            if lengths.len() != num_rows {
                return Err(TablesError::BadParam {
                    msg: "name_length does not match num_rows",
                });
            }
            let total: usize = lengths.iter().map(|&x| x as usize).sum();
            if payload.len() != total {
                return Err(TablesError::BadParam {
                    msg: "name payload does not match name_length",
                });
            }
        }
        self.expand_fixed_columns(num_rows)?;
        self.flags_.clear();
        self.flags_.extend_from_slice(flags);
        self.time_.clear();
        self.time_.extend_from_slice(time);
        self.population_.clear();
        match population {
            Some(p) => self.population_.extend_from_slice(p),
            None => self.population_.resize(num_rows, -1),
        }
        self.name_.clear();
        self.name_length_.clear();
        match name {
            Some((payload, lengths)) => {
                self.expand_name(payload.len())?;
                self.name_.extend_from_slice(payload);
                self.name_length_.extend_from_slice(lengths);
            }
            None => self.name_length_.resize(num_rows, 0),
        }
        Ok(())
    }

    /// Logically clear the table.  Capacity is retained.
    pub fn reset(&mut self) {
        self.flags_.clear();
        self.time_.clear();
        self.population_.clear();
        self.name_.clear();
        self.name_length_.clear();
    }

    pub fn num_rows(&self) -> usize {
        self.flags_.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn total_name_length(&self) -> usize {
        self.name_.len()
    }

    pub fn flags(&self) -> &[u32] {
        &self.flags_
    }

    pub fn time(&self) -> &[Time] {
        &self.time_
    }

    pub fn population(&self) -> &[PopulationType] {
        &self.population_
    }

    pub fn name(&self) -> &[u8] {
        &self.name_
    }

    pub fn name_length(&self) -> &[ListLenType] {
        &self.name_length_
    }

    /// Iterate over rows, resolving each name to a payload slice.
    pub fn iter(&self) -> impl Iterator<Item = NodeRow<'_>> {
        let mut offset = 0;
        (0..self.num_rows()).map(move |j| {
            let len = self.name_length_[j] as usize;
            let name = &self.name_[offset..offset + len];
            offset += len;
            NodeRow {
                flags: self.flags_[j],
                time: self.time_[j],
                population: self.population_[j],
                name,
            }
        })
    }

    pub fn print_state<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{}", TABLE_SEP)?;
        writeln!(out, "node_table:")?;
        writeln!(
            out,
            "num_rows          = {}\tmax = {}\tincrement = {}",
            self.num_rows(),
            self.max_rows_,
            self.max_rows_increment_
        )?;
        writeln!(
            out,
            "total_name_length = {}\tmax = {}\tincrement = {}",
            self.total_name_length(),
            self.max_total_name_length_,
            self.max_total_name_length_increment_
        )?;
        write!(out, "{}", TABLE_SEP)?;
        writeln!(out, "index\tflags\ttime\tpopulation\tname_length\tname")?;
        for (j, row) in self.iter().enumerate() {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}",
                j,
                row.flags,
                row.time,
                row.population,
                row.name.len(),
                String::from_utf8_lossy(row.name)
            )?;
        }
        Ok(())
    }
}

impl PartialEq for NodeTable {
    fn eq(&self, other: &Self) -> bool {
        self.flags_ == other.flags_
            && self.time_ == other.time_
            && self.population_ == other.population_
            && self.name_ == other.name_
            && self.name_length_ == other.name_length_
    }
}

/*************************
 * edgeset table
 *************************/

/// One row of an [``EdgesetTable``].
#[derive(Debug, PartialEq)]
pub struct EdgesetRow<'a> {
    pub left: Position,
    pub right: Position,
    pub parent: IdType,
    pub children: &'a [IdType],
}

/// Table of edgesets.
///
/// On the half-open interval `[left, right)`, `parent` is the
/// immediate ancestor of every node in `children`.  The children of
/// each row live in the flattened payload column.
#[derive(Clone, Debug)]
pub struct EdgesetTable {
    max_rows_: usize,
    max_rows_increment_: usize,
    max_total_children_length_: usize,
    max_total_children_length_increment_: usize,
    pub(crate) left_: Vec<Position>,
    pub(crate) right_: Vec<Position>,
    pub(crate) parent_: Vec<IdType>,
    pub(crate) children_: Vec<IdType>,
    pub(crate) children_length_: Vec<ListLenType>,
}

impl Default for EdgesetTable {
    fn default() -> Self {
        Self::from_increments(DEFAULT_MAX_ROWS_INCREMENT, DEFAULT_MAX_ROWS_INCREMENT)
    }
}

impl EdgesetTable {
    fn from_increments(
        max_rows_increment: usize,
        max_total_children_length_increment: usize,
    ) -> Self {
        EdgesetTable {
            max_rows_: 0,
            max_rows_increment_: max_rows_increment,
            max_total_children_length_: 0,
            max_total_children_length_increment_: max_total_children_length_increment,
            left_: vec![],
            right_: vec![],
            parent_: vec![],
            children_: vec![],
            children_length_: vec![],
        }
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_increments(
        max_rows_increment: usize,
        max_total_children_length_increment: usize,
    ) -> TablesResult<Self> {
        Ok(Self::from_increments(
            check_increment(max_rows_increment)?,
            check_increment(max_total_children_length_increment)?,
        ))
    }

    fn expand_main_columns(&mut self, new_size: usize) -> TablesResult<()> {
        if new_size > self.max_rows_ {
            expand_column(&mut self.left_, new_size)?;
            expand_column(&mut self.right_, new_size)?;
            expand_column(&mut self.parent_, new_size)?;
            expand_column(&mut self.children_length_, new_size)?;
            self.max_rows_ = new_size;
        }
        Ok(())
    }

    fn expand_children(&mut self, new_size: usize) -> TablesResult<()> {
        if new_size > self.max_total_children_length_ {
            expand_column(&mut self.children_, new_size)?;
            self.max_total_children_length_ = new_size;
        }
        Ok(())
    }

    /// Append a row.  Returns the new row's index.
    pub fn add_row(
        &mut self,
        left: Position,
        right: Position,
        parent: IdType,
        children: &[IdType],
    ) -> TablesResult<IdType> {
        if children.is_empty() {
            return Err(TablesError::BadParam {
                msg: "children must be non-empty",
            });
        }
        if !(left < right) {
            return Err(TablesError::BadParam {
                msg: "invalid interval: left must be < right",
            });
        }
        non_negative_id(parent)?;
        for &c in children {
            non_negative_id(c)?;
        }
        if self.num_rows() == self.max_rows_ {
            self.expand_main_columns(self.max_rows_ + self.max_rows_increment_)?;
        }
        // Loop in case a row has a very large number of children.
        while self.children_.len() + children.len() >= self.max_total_children_length_ {
            self.expand_children(
                self.max_total_children_length_ + self.max_total_children_length_increment_,
            )?;
        }
        self.left_.push(left);
        self.right_.push(right);
        self.parent_.push(parent);
        self.children_.extend_from_slice(children);
        self.children_length_.push(children.len() as ListLenType);
        Ok((self.num_rows() - 1) as IdType)
    }

    /// Bulk-replace the table contents.
    pub fn set_columns(
        &mut self,
        num_rows: usize,
        left: &[Position],
        right: &[Position],
        parent: &[IdType],
        children: &[IdType],
        children_length: &[ListLenType],
    ) -> TablesResult<()> {
        if left.len() != num_rows
            || right.len() != num_rows
            || parent.len() != num_rows
            || children_length.len() != num_rows
        {
            return Err(TablesError::BadParam {
                msg: "column length does not match num_rows",
            });
        }
        let total: usize = children_length.iter().map(|&x| x as usize).sum();
        if children.len() != total {
            return Err(TablesError::BadParam {
                msg: "children payload does not match children_length",
            });
        }
        self.expand_main_columns(num_rows)?;
        self.expand_children(total)?;
        self.left_.clear();
        self.left_.extend_from_slice(left);
        self.right_.clear();
        self.right_.extend_from_slice(right);
        self.parent_.clear();
        self.parent_.extend_from_slice(parent);
        self.children_.clear();
        self.children_.extend_from_slice(children);
        self.children_length_.clear();
        self.children_length_.extend_from_slice(children_length);
        Ok(())
    }

    /// Logically clear the table.  Capacity is retained.
    pub fn reset(&mut self) {
        self.left_.clear();
        self.right_.clear();
        self.parent_.clear();
        self.children_.clear();
        self.children_length_.clear();
    }

    // Move the rows out, leaving an empty table with the same growth
    // increments in place.  The simplifier uses this to read the
    // input rows while writing output into the same table.
    pub(crate) fn take_rows(&mut self) -> EdgesetTable {
        let replacement = Self::from_increments(
            self.max_rows_increment_,
            self.max_total_children_length_increment_,
        );
        std::mem::replace(self, replacement)
    }

    pub fn num_rows(&self) -> usize {
        self.left_.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn total_children_length(&self) -> usize {
        self.children_.len()
    }

    pub fn left(&self) -> &[Position] {
        &self.left_
    }

    pub fn right(&self) -> &[Position] {
        &self.right_
    }

    pub fn parent(&self) -> &[IdType] {
        &self.parent_
    }

    pub fn children(&self) -> &[IdType] {
        &self.children_
    }

    pub fn children_length(&self) -> &[ListLenType] {
        &self.children_length_
    }

    /// Iterate over rows, resolving each children list to a payload
    /// slice.
    pub fn iter(&self) -> impl Iterator<Item = EdgesetRow<'_>> {
        let mut offset = 0;
        (0..self.num_rows()).map(move |j| {
            let len = self.children_length_[j] as usize;
            let children = &self.children_[offset..offset + len];
            offset += len;
            EdgesetRow {
                left: self.left_[j],
                right: self.right_[j],
                parent: self.parent_[j],
                children,
            }
        })
    }

    pub fn print_state<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{}", TABLE_SEP)?;
        writeln!(out, "edgeset_table:")?;
        writeln!(
            out,
            "num_rows              = {}\tmax = {}\tincrement = {}",
            self.num_rows(),
            self.max_rows_,
            self.max_rows_increment_
        )?;
        writeln!(
            out,
            "total_children_length = {}\tmax = {}\tincrement = {}",
            self.total_children_length(),
            self.max_total_children_length_,
            self.max_total_children_length_increment_
        )?;
        write!(out, "{}", TABLE_SEP)?;
        writeln!(out, "index\tleft\tright\tparent\tchildren_length\tchildren")?;
        for (j, row) in self.iter().enumerate() {
            let children: Vec<String> = row.children.iter().map(|c| c.to_string()).collect();
            writeln!(
                out,
                "{}\t{:.3}\t{:.3}\t{}\t{}\t{}",
                j,
                row.left,
                row.right,
                row.parent,
                row.children.len(),
                children.join(",")
            )?;
        }
        Ok(())
    }
}

impl PartialEq for EdgesetTable {
    fn eq(&self, other: &Self) -> bool {
        self.left_ == other.left_
            && self.right_ == other.right_
            && self.parent_ == other.parent_
            && self.children_ == other.children_
            && self.children_length_ == other.children_length_
    }
}

/*************************
 * site table
 *************************/

/// One row of a [``SiteTable``].
#[derive(Debug, PartialEq)]
pub struct SiteRow<'a> {
    pub position: Position,
    pub ancestral_state: &'a [u8],
}

/// Table of variant sites.
#[derive(Clone, Debug)]
pub struct SiteTable {
    max_rows_: usize,
    max_rows_increment_: usize,
    max_total_ancestral_state_length_: usize,
    max_total_ancestral_state_length_increment_: usize,
    pub(crate) position_: Vec<Position>,
    pub(crate) ancestral_state_: Vec<u8>,
    pub(crate) ancestral_state_length_: Vec<ListLenType>,
}

impl Default for SiteTable {
    fn default() -> Self {
        Self::from_increments(DEFAULT_MAX_ROWS_INCREMENT, DEFAULT_MAX_ROWS_INCREMENT)
    }
}

impl SiteTable {
    fn from_increments(
        max_rows_increment: usize,
        max_total_ancestral_state_length_increment: usize,
    ) -> Self {
        SiteTable {
            max_rows_: 0,
            max_rows_increment_: max_rows_increment,
            max_total_ancestral_state_length_: 0,
            max_total_ancestral_state_length_increment_:
                max_total_ancestral_state_length_increment,
            position_: vec![],
            ancestral_state_: vec![],
            ancestral_state_length_: vec![],
        }
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_increments(
        max_rows_increment: usize,
        max_total_ancestral_state_length_increment: usize,
    ) -> TablesResult<Self> {
        Ok(Self::from_increments(
            check_increment(max_rows_increment)?,
            check_increment(max_total_ancestral_state_length_increment)?,
        ))
    }

    fn expand_main_columns(&mut self, new_size: usize) -> TablesResult<()> {
        if new_size > self.max_rows_ {
            expand_column(&mut self.position_, new_size)?;
            expand_column(&mut self.ancestral_state_length_, new_size)?;
            self.max_rows_ = new_size;
        }
        Ok(())
    }

    fn expand_ancestral_state(&mut self, new_size: usize) -> TablesResult<()> {
        if new_size > self.max_total_ancestral_state_length_ {
            expand_column(&mut self.ancestral_state_, new_size)?;
            self.max_total_ancestral_state_length_ = new_size;
        }
        Ok(())
    }

    pub fn add_row(&mut self, position: Position, ancestral_state: &[u8]) -> TablesResult<IdType> {
        if self.num_rows() == self.max_rows_ {
            self.expand_main_columns(self.max_rows_ + self.max_rows_increment_)?;
        }
        while self.ancestral_state_.len() + ancestral_state.len()
            >= self.max_total_ancestral_state_length_
        {
            self.expand_ancestral_state(
                self.max_total_ancestral_state_length_
                    + self.max_total_ancestral_state_length_increment_,
            )?;
        }
        self.position_.push(position);
        self.ancestral_state_.extend_from_slice(ancestral_state);
        self.ancestral_state_length_
            .push(ancestral_state.len() as ListLenType);
        Ok((self.num_rows() - 1) as IdType)
    }

    pub fn set_columns(
        &mut self,
        num_rows: usize,
        position: &[Position],
        ancestral_state: &[u8],
        ancestral_state_length: &[ListLenType],
    ) -> TablesResult<()> {
        if position.len() != num_rows || ancestral_state_length.len() != num_rows {
            return Err(TablesError::BadParam {
                msg: "column length does not match num_rows",
            });
        }
        let total: usize = ancestral_state_length.iter().map(|&x| x as usize).sum();
        if ancestral_state.len() != total {
            return Err(TablesError::BadParam {
                msg: "ancestral_state payload does not match lengths",
            });
        }
        self.expand_main_columns(num_rows)?;
        self.expand_ancestral_state(total)?;
        self.position_.clear();
        self.position_.extend_from_slice(position);
        self.ancestral_state_.clear();
        self.ancestral_state_.extend_from_slice(ancestral_state);
        self.ancestral_state_length_.clear();
        self.ancestral_state_length_
            .extend_from_slice(ancestral_state_length);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.position_.clear();
        self.ancestral_state_.clear();
        self.ancestral_state_length_.clear();
    }

    pub fn num_rows(&self) -> usize {
        self.position_.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn position(&self) -> &[Position] {
        &self.position_
    }

    pub fn ancestral_state(&self) -> &[u8] {
        &self.ancestral_state_
    }

    pub fn ancestral_state_length(&self) -> &[ListLenType] {
        &self.ancestral_state_length_
    }

    pub fn iter(&self) -> impl Iterator<Item = SiteRow<'_>> {
        let mut offset = 0;
        (0..self.num_rows()).map(move |j| {
            let len = self.ancestral_state_length_[j] as usize;
            let ancestral_state = &self.ancestral_state_[offset..offset + len];
            offset += len;
            SiteRow {
                position: self.position_[j],
                ancestral_state,
            }
        })
    }

    pub fn print_state<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{}", TABLE_SEP)?;
        writeln!(out, "site_table:")?;
        writeln!(
            out,
            "num_rows = {}\tmax = {}\tincrement = {}",
            self.num_rows(),
            self.max_rows_,
            self.max_rows_increment_
        )?;
        write!(out, "{}", TABLE_SEP)?;
        writeln!(
            out,
            "index\tposition\tancestral_state_length\tancestral_state"
        )?;
        for (j, row) in self.iter().enumerate() {
            writeln!(
                out,
                "{}\t{}\t{}\t{}",
                j,
                row.position,
                row.ancestral_state.len(),
                String::from_utf8_lossy(row.ancestral_state)
            )?;
        }
        Ok(())
    }
}

impl PartialEq for SiteTable {
    fn eq(&self, other: &Self) -> bool {
        self.position_ == other.position_
            && self.ancestral_state_ == other.ancestral_state_
            && self.ancestral_state_length_ == other.ancestral_state_length_
    }
}

/*************************
 * mutation table
 *************************/

/// One row of a [``MutationTable``].
#[derive(Debug, PartialEq)]
pub struct MutationRow<'a> {
    pub site: IdType,
    pub node: IdType,
    pub derived_state: &'a [u8],
}

/// Table of mutations.  A mutation inherits its position from its
/// site; a single site may carry several mutations.
#[derive(Clone, Debug)]
pub struct MutationTable {
    max_rows_: usize,
    max_rows_increment_: usize,
    max_total_derived_state_length_: usize,
    max_total_derived_state_length_increment_: usize,
    pub(crate) site_: Vec<IdType>,
    pub(crate) node_: Vec<IdType>,
    pub(crate) derived_state_: Vec<u8>,
    pub(crate) derived_state_length_: Vec<ListLenType>,
}

impl Default for MutationTable {
    fn default() -> Self {
        Self::from_increments(DEFAULT_MAX_ROWS_INCREMENT, DEFAULT_MAX_ROWS_INCREMENT)
    }
}

impl MutationTable {
    fn from_increments(
        max_rows_increment: usize,
        max_total_derived_state_length_increment: usize,
    ) -> Self {
        MutationTable {
            max_rows_: 0,
            max_rows_increment_: max_rows_increment,
            max_total_derived_state_length_: 0,
            max_total_derived_state_length_increment_: max_total_derived_state_length_increment,
            site_: vec![],
            node_: vec![],
            derived_state_: vec![],
            derived_state_length_: vec![],
        }
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_increments(
        max_rows_increment: usize,
        max_total_derived_state_length_increment: usize,
    ) -> TablesResult<Self> {
        Ok(Self::from_increments(
            check_increment(max_rows_increment)?,
            check_increment(max_total_derived_state_length_increment)?,
        ))
    }

    fn expand_main_columns(&mut self, new_size: usize) -> TablesResult<()> {
        if new_size > self.max_rows_ {
            expand_column(&mut self.site_, new_size)?;
            expand_column(&mut self.node_, new_size)?;
            expand_column(&mut self.derived_state_length_, new_size)?;
            self.max_rows_ = new_size;
        }
        Ok(())
    }

    fn expand_derived_state(&mut self, new_size: usize) -> TablesResult<()> {
        if new_size > self.max_total_derived_state_length_ {
            expand_column(&mut self.derived_state_, new_size)?;
            self.max_total_derived_state_length_ = new_size;
        }
        Ok(())
    }

    pub fn add_row(
        &mut self,
        site: IdType,
        node: IdType,
        derived_state: &[u8],
    ) -> TablesResult<IdType> {
        non_negative_id(site)?;
        non_negative_id(node)?;
        if self.num_rows() == self.max_rows_ {
            self.expand_main_columns(self.max_rows_ + self.max_rows_increment_)?;
        }
        while self.derived_state_.len() + derived_state.len()
            >= self.max_total_derived_state_length_
        {
            self.expand_derived_state(
                self.max_total_derived_state_length_
                    + self.max_total_derived_state_length_increment_,
            )?;
        }
        self.site_.push(site);
        self.node_.push(node);
        self.derived_state_.extend_from_slice(derived_state);
        self.derived_state_length_
            .push(derived_state.len() as ListLenType);
        Ok((self.num_rows() - 1) as IdType)
    }

    pub fn set_columns(
        &mut self,
        num_rows: usize,
        site: &[IdType],
        node: &[IdType],
        derived_state: &[u8],
        derived_state_length: &[ListLenType],
    ) -> TablesResult<()> {
        if site.len() != num_rows
            || node.len() != num_rows
            || derived_state_length.len() != num_rows
        {
            return Err(TablesError::BadParam {
                msg: "column length does not match num_rows",
            });
        }
        let total: usize = derived_state_length.iter().map(|&x| x as usize).sum();
        if derived_state.len() != total {
            return Err(TablesError::BadParam {
                msg: "derived_state payload does not match lengths",
            });
        }
        self.expand_main_columns(num_rows)?;
        self.expand_derived_state(total)?;
        self.site_.clear();
        self.site_.extend_from_slice(site);
        self.node_.clear();
        self.node_.extend_from_slice(node);
        self.derived_state_.clear();
        self.derived_state_.extend_from_slice(derived_state);
        self.derived_state_length_.clear();
        self.derived_state_length_
            .extend_from_slice(derived_state_length);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.site_.clear();
        self.node_.clear();
        self.derived_state_.clear();
        self.derived_state_length_.clear();
    }

    pub fn num_rows(&self) -> usize {
        self.site_.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn site(&self) -> &[IdType] {
        &self.site_
    }

    pub fn node(&self) -> &[IdType] {
        &self.node_
    }

    pub fn derived_state(&self) -> &[u8] {
        &self.derived_state_
    }

    pub fn derived_state_length(&self) -> &[ListLenType] {
        &self.derived_state_length_
    }

    pub fn iter(&self) -> impl Iterator<Item = MutationRow<'_>> {
        let mut offset = 0;
        (0..self.num_rows()).map(move |j| {
            let len = self.derived_state_length_[j] as usize;
            let derived_state = &self.derived_state_[offset..offset + len];
            offset += len;
            MutationRow {
                site: self.site_[j],
                node: self.node_[j],
                derived_state,
            }
        })
    }

    pub fn print_state<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{}", TABLE_SEP)?;
        writeln!(out, "mutation_table:")?;
        writeln!(
            out,
            "num_rows = {}\tmax = {}\tincrement = {}",
            self.num_rows(),
            self.max_rows_,
            self.max_rows_increment_
        )?;
        write!(out, "{}", TABLE_SEP)?;
        writeln!(out, "index\tsite\tnode\tderived_state_length\tderived_state")?;
        for (j, row) in self.iter().enumerate() {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}",
                j,
                row.site,
                row.node,
                row.derived_state.len(),
                String::from_utf8_lossy(row.derived_state)
            )?;
        }
        Ok(())
    }
}

impl PartialEq for MutationTable {
    fn eq(&self, other: &Self) -> bool {
        self.site_ == other.site_
            && self.node_ == other.node_
            && self.derived_state_ == other.derived_state_
            && self.derived_state_length_ == other.derived_state_length_
    }
}

/*************************
 * migration table
 *************************/

/// One row of a [``MigrationTable``].
#[derive(Debug, PartialEq)]
pub struct MigrationRow {
    pub left: Position,
    pub right: Position,
    pub node: IdType,
    pub source: PopulationType,
    pub dest: PopulationType,
    pub time: Time,
}

/// Table of migration events.  Carried through sorting and
/// simplification untouched.
#[derive(Clone, Debug)]
pub struct MigrationTable {
    max_rows_: usize,
    max_rows_increment_: usize,
    pub(crate) left_: Vec<Position>,
    pub(crate) right_: Vec<Position>,
    pub(crate) node_: Vec<IdType>,
    pub(crate) source_: Vec<PopulationType>,
    pub(crate) dest_: Vec<PopulationType>,
    pub(crate) time_: Vec<Time>,
}

impl Default for MigrationTable {
    fn default() -> Self {
        Self::from_increments(DEFAULT_MAX_ROWS_INCREMENT)
    }
}

impl MigrationTable {
    fn from_increments(max_rows_increment: usize) -> Self {
        MigrationTable {
            max_rows_: 0,
            max_rows_increment_: max_rows_increment,
            left_: vec![],
            right_: vec![],
            node_: vec![],
            source_: vec![],
            dest_: vec![],
            time_: vec![],
        }
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_increments(max_rows_increment: usize) -> TablesResult<Self> {
        Ok(Self::from_increments(check_increment(max_rows_increment)?))
    }

    fn expand(&mut self, new_size: usize) -> TablesResult<()> {
        if new_size > self.max_rows_ {
            expand_column(&mut self.left_, new_size)?;
            expand_column(&mut self.right_, new_size)?;
            expand_column(&mut self.node_, new_size)?;
            expand_column(&mut self.source_, new_size)?;
            expand_column(&mut self.dest_, new_size)?;
            expand_column(&mut self.time_, new_size)?;
            self.max_rows_ = new_size;
        }
        Ok(())
    }

    pub fn add_row(
        &mut self,
        left: Position,
        right: Position,
        node: IdType,
        source: PopulationType,
        dest: PopulationType,
        time: Time,
    ) -> TablesResult<IdType> {
        non_negative_id(node)?;
        if self.num_rows() == self.max_rows_ {
            self.expand(self.max_rows_ + self.max_rows_increment_)?;
        }
        self.left_.push(left);
        self.right_.push(right);
        self.node_.push(node);
        self.source_.push(source);
        self.dest_.push(dest);
        self.time_.push(time);
        Ok((self.num_rows() - 1) as IdType)
    }

    pub fn set_columns(
        &mut self,
        num_rows: usize,
        left: &[Position],
        right: &[Position],
        node: &[IdType],
        source: &[PopulationType],
        dest: &[PopulationType],
        time: &[Time],
    ) -> TablesResult<()> {
        if left.len() != num_rows
            || right.len() != num_rows
            || node.len() != num_rows
            || source.len() != num_rows
            || dest.len() != num_rows
            || time.len() != num_rows
        {
            return Err(TablesError::BadParam {
                msg: "column length does not match num_rows",
            });
        }
        self.expand(num_rows)?;
        self.left_.clear();
        self.left_.extend_from_slice(left);
        self.right_.clear();
        self.right_.extend_from_slice(right);
        self.node_.clear();
        self.node_.extend_from_slice(node);
        self.source_.clear();
        self.source_.extend_from_slice(source);
        self.dest_.clear();
        self.dest_.extend_from_slice(dest);
        self.time_.clear();
        self.time_.extend_from_slice(time);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.left_.clear();
        self.right_.clear();
        self.node_.clear();
        self.source_.clear();
        self.dest_.clear();
        self.time_.clear();
    }

    pub fn num_rows(&self) -> usize {
        self.left_.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = MigrationRow> + '_ {
        (0..self.num_rows()).map(move |j| MigrationRow {
            left: self.left_[j],
            right: self.right_[j],
            node: self.node_[j],
            source: self.source_[j],
            dest: self.dest_[j],
            time: self.time_[j],
        })
    }

    pub fn print_state<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{}", TABLE_SEP)?;
        writeln!(out, "migration_table:")?;
        writeln!(
            out,
            "num_rows = {}\tmax = {}\tincrement = {}",
            self.num_rows(),
            self.max_rows_,
            self.max_rows_increment_
        )?;
        write!(out, "{}", TABLE_SEP)?;
        writeln!(out, "index\tleft\tright\tnode\tsource\tdest\ttime")?;
        for (j, row) in self.iter().enumerate() {
            writeln!(
                out,
                "{}\t{:.3}\t{:.3}\t{}\t{}\t{}\t{}",
                j, row.left, row.right, row.node, row.source, row.dest, row.time
            )?;
        }
        Ok(())
    }
}

impl PartialEq for MigrationTable {
    fn eq(&self, other: &Self) -> bool {
        self.left_ == other.left_
            && self.right_ == other.right_
            && self.node_ == other.node_
            && self.source_ == other.source_
            && self.dest_ == other.dest_
            && self.time_ == other.time_
    }
}

/*************************
 * table collection
 *************************/

/// A collection of node, edgeset, site, mutation, and migration
/// tables over a genome `[0, sequence_length)`.
#[derive(Clone, Debug, PartialEq)]
pub struct TableCollection {
    sequence_length_: Position,
    pub(crate) nodes_: NodeTable,
    pub(crate) edgesets_: EdgesetTable,
    pub(crate) sites_: SiteTable,
    pub(crate) mutations_: MutationTable,
    pub(crate) migrations_: MigrationTable,
}

impl TableCollection {
    pub fn new(sequence_length: Position) -> TablesResult<TableCollection> {
        if !(sequence_length > 0.0) {
            return Err(TablesError::BadParam {
                msg: "sequence length must be > 0",
            });
        }
        Ok(TableCollection {
            sequence_length_: sequence_length,
            nodes_: NodeTable::new(),
            edgesets_: EdgesetTable::new(),
            sites_: SiteTable::new(),
            mutations_: MutationTable::new(),
            migrations_: MigrationTable::new(),
        })
    }

    pub fn add_node(
        &mut self,
        flags: u32,
        time: Time,
        population: PopulationType,
        name: &[u8],
    ) -> TablesResult<IdType> {
        self.nodes_.add_row(flags, time, population, name)
    }

    /// Add an edgeset.  The interval must lie within the genome.
    pub fn add_edgeset(
        &mut self,
        left: Position,
        right: Position,
        parent: IdType,
        children: &[IdType],
    ) -> TablesResult<IdType> {
        if left < 0.0 || right > self.sequence_length_ {
            return Err(TablesError::BadParam {
                msg: "interval not contained in [0, sequence_length)",
            });
        }
        self.edgesets_.add_row(left, right, parent, children)
    }

    pub fn add_site(&mut self, position: Position, ancestral_state: &[u8]) -> TablesResult<IdType> {
        if position < 0.0 || position >= self.sequence_length_ {
            return Err(TablesError::BadParam {
                msg: "position not contained in [0, sequence_length)",
            });
        }
        self.sites_.add_row(position, ancestral_state)
    }

    pub fn add_mutation(
        &mut self,
        site: IdType,
        node: IdType,
        derived_state: &[u8],
    ) -> TablesResult<IdType> {
        self.mutations_.add_row(site, node, derived_state)
    }

    pub fn add_migration(
        &mut self,
        left: Position,
        right: Position,
        node: IdType,
        source: PopulationType,
        dest: PopulationType,
        time: Time,
    ) -> TablesResult<IdType> {
        self.migrations_
            .add_row(left, right, node, source, dest, time)
    }

    pub fn sequence_length(&self) -> Position {
        self.sequence_length_
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.nodes_
    }

    pub fn edgesets(&self) -> &EdgesetTable {
        &self.edgesets_
    }

    pub fn sites(&self) -> &SiteTable {
        &self.sites_
    }

    pub fn mutations(&self) -> &MutationTable {
        &self.mutations_
    }

    pub fn migrations(&self) -> &MigrationTable {
        &self.migrations_
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes_.num_rows()
    }

    pub fn num_edgesets(&self) -> usize {
        self.edgesets_.num_rows()
    }

    /// Sort edgesets, sites, and mutations into the order required by
    /// [``crate::simplify_tables``].
    pub fn sort_tables_for_simplification(&mut self) -> TablesResult<()> {
        crate::table_sorter::sort_tables(self)
    }

    pub fn print_state<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        self.nodes_.print_state(out)?;
        self.edgesets_.print_state(out)?;
        self.sites_.print_state(out)?;
        self.mutations_.print_state(out)?;
        self.migrations_.print_state(out)?;
        Ok(())
    }
}
