//! Sorting pass preparing tables for simplification.
//!
//! Edgesets are reordered by (parent time, parent, left), sites by
//! position, and mutations by their remapped site.  All sorts are
//! stable, so sorting an already-sorted collection leaves every
//! column bit-identical.

use crate::tables::{TableCollection, TablesError, TablesResult};
use crate::tsdef::{IdType, ListLenType, Position, Time};
use std::ops::Range;

// Sort keys hold ranges into a copy of the children payload, so
// variable-length rows can be permuted without touching the live
// column until write-back.
struct EdgesetSortKey {
    left: Position,
    right: Position,
    parent: IdType,
    time: Time,
    children: Range<usize>,
}

struct SiteSortKey {
    id: IdType,
    position: Position,
    ancestral_state: Range<usize>,
}

struct MutationSortKey {
    site: IdType,
    node: IdType,
    derived_state: Range<usize>,
}

fn sort_edgesets(tables: &mut TableCollection) -> TablesResult<()> {
    let num_rows = tables.edgesets_.num_rows();
    let children_mem = tables.edgesets_.children_.clone();
    let mut keys = Vec::with_capacity(num_rows);
    let mut offset = 0;
    for j in 0..num_rows {
        let parent = tables.edgesets_.parent_[j];
        if parent < 0 || parent as usize >= tables.nodes_.num_rows() {
            return Err(TablesError::OutOfBounds { found: parent });
        }
        let len = tables.edgesets_.children_length_[j] as usize;
        keys.push(EdgesetSortKey {
            left: tables.edgesets_.left_[j],
            right: tables.edgesets_.right_[j],
            parent,
            time: tables.nodes_.time_[parent as usize],
            children: offset..offset + len,
        });
        offset += len;
    }
    keys.sort_by(|a, b| {
        a.time
            .total_cmp(&b.time)
            .then_with(|| a.parent.cmp(&b.parent))
            .then_with(|| a.left.total_cmp(&b.left))
    });
    // Write the rows back and recompact the children payload.  The
    // simplifier compares children lists for squash equality, so each
    // row's children are sorted by node id here.
    tables.edgesets_.children_.clear();
    for (j, key) in keys.iter().enumerate() {
        tables.edgesets_.left_[j] = key.left;
        tables.edgesets_.right_[j] = key.right;
        tables.edgesets_.parent_[j] = key.parent;
        tables.edgesets_.children_length_[j] = key.children.len() as ListLenType;
        let start = tables.edgesets_.children_.len();
        tables
            .edgesets_
            .children_
            .extend_from_slice(&children_mem[key.children.clone()]);
        tables.edgesets_.children_[start..].sort_unstable();
    }
    Ok(())
}

// Returns the remapping from old site ids to new site ids.
fn sort_sites(tables: &mut TableCollection) -> TablesResult<Vec<IdType>> {
    let num_rows = tables.sites_.num_rows();
    let ancestral_state_mem = tables.sites_.ancestral_state_.clone();
    let mut keys = Vec::with_capacity(num_rows);
    let mut offset = 0;
    for j in 0..num_rows {
        let len = tables.sites_.ancestral_state_length_[j] as usize;
        keys.push(SiteSortKey {
            id: j as IdType,
            position: tables.sites_.position_[j],
            ancestral_state: offset..offset + len,
        });
        offset += len;
    }
    keys.sort_by(|a, b| a.position.total_cmp(&b.position));
    let mut site_id_map = vec![0; num_rows];
    tables.sites_.ancestral_state_.clear();
    for (j, key) in keys.iter().enumerate() {
        site_id_map[key.id as usize] = j as IdType;
        tables.sites_.position_[j] = key.position;
        tables.sites_.ancestral_state_length_[j] = key.ancestral_state.len() as ListLenType;
        tables
            .sites_
            .ancestral_state_
            .extend_from_slice(&ancestral_state_mem[key.ancestral_state.clone()]);
    }
    Ok(site_id_map)
}

fn sort_mutations(tables: &mut TableCollection, site_id_map: &[IdType]) -> TablesResult<()> {
    let num_rows = tables.mutations_.num_rows();
    let derived_state_mem = tables.mutations_.derived_state_.clone();
    let mut keys = Vec::with_capacity(num_rows);
    let mut offset = 0;
    for j in 0..num_rows {
        let site = tables.mutations_.site_[j];
        if site < 0 || site as usize >= tables.sites_.num_rows() {
            return Err(TablesError::OutOfBounds { found: site });
        }
        let node = tables.mutations_.node_[j];
        if node < 0 || node as usize >= tables.nodes_.num_rows() {
            return Err(TablesError::OutOfBounds { found: node });
        }
        let len = tables.mutations_.derived_state_length_[j] as usize;
        keys.push(MutationSortKey {
            site: site_id_map[site as usize],
            node,
            derived_state: offset..offset + len,
        });
        offset += len;
    }
    keys.sort_by(|a, b| a.site.cmp(&b.site));
    tables.mutations_.derived_state_.clear();
    for (j, key) in keys.iter().enumerate() {
        tables.mutations_.site_[j] = key.site;
        tables.mutations_.node_[j] = key.node;
        tables.mutations_.derived_state_length_[j] = key.derived_state.len() as ListLenType;
        tables
            .mutations_
            .derived_state_
            .extend_from_slice(&derived_state_mem[key.derived_state.clone()]);
    }
    Ok(())
}

pub(crate) fn sort_tables(tables: &mut TableCollection) -> TablesResult<()> {
    sort_edgesets(tables)?;
    let site_id_map = sort_sites(tables)?;
    sort_mutations(tables, &site_id_map)?;
    Ok(())
}
