//! Tree sequence simplification.
//!
//! [``simplify_tables``] reduces a node/edgeset graph to the minimal
//! equivalent graph containing only history ancestral to a set of
//! sample nodes.  The algorithm sweeps the edgesets in time order,
//! maintaining for every input node a chain of [``crate::Segment``]s
//! recording which genomic intervals of that node are still ancestral
//! to the samples and which output node represents each interval.
//! When two or more such segments meet in a common parent the overlap
//! coalesces: the parent is recorded as an output node and an output
//! edgeset is emitted.
//!
//! Input edgesets must be sorted by (parent time, parent, left); see
//! [``crate::TableCollection::sort_tables_for_simplification``].

use crate::flags::{node_is_sample, SimplificationFlags};
use crate::segment::{SegmentId, SegmentPool};
use crate::tables::{MutationTable, NodeTable, SiteTable, TableCollection, TablesError};
use crate::tsdef::{IdType, Position, NULL_ID};
use crate::TsreduceError;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SimplificationError {
    /// A requested sample does not carry the sample flag.
    #[error("node is not a sample: {found:?}")]
    BadSamples { found: IdType },
    /// The same sample was requested twice.
    #[error("duplicate sample: {found:?}")]
    DuplicateSample { found: IdType },
    /// Input edgesets are not sorted by parent birth time.
    #[error("edgesets are not sorted by parent time")]
    RecordsNotTimeSorted,
    /// Catch-all for internal failures.
    #[error("simplification error: {msg}")]
    Generic { msg: &'static str },
}

// BTreeMap key ordering positions by total order, so breakpoints can
// key the overlap-count map and the merge queue.
#[derive(Clone, Copy, Debug)]
struct PosKey(Position);

impl PartialEq for PosKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for PosKey {}

impl PartialOrd for PosKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PosKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Results of simplification that are not expressed in the tables
/// themselves.
#[derive(Debug, Default)]
pub struct SimplificationOutput {
    /// Maps input node id -> output node id, or [``NULL_ID``] for
    /// input nodes with no counterpart in the output.
    pub idmap: Vec<IdType>,
}

impl SimplificationOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

// One-slot look-behind buffer merging adjacent output edgesets that
// are identical in parent and children and whose intervals meet.
struct BufferedEdgeset {
    left: Position,
    right: Position,
    parent: IdType,
    children: Vec<IdType>,
}

/// The simplification engine.
///
/// Owns the output tables for the duration of a run; input nodes,
/// sites, and mutations are snapshotted at construction so the output
/// can be written over the input storage.
pub struct Simplifier<'a> {
    tables: &'a mut TableCollection,
    flags: SimplificationFlags,
    sequence_length: Position,
    input_nodes: NodeTable,
    input_sites: SiteTable,
    input_mutations: MutationTable,
    node_name_offset: Vec<usize>,
    pool: SegmentPool,
    // Maps input node id -> head of its ancestry chain.
    ancestor_map: Vec<Option<SegmentId>>,
    // Breakpoints of the "number of overlapping lineages" step
    // function.  Sentinels at 0 and sequence_length bound the domain.
    overlap_counts: BTreeMap<PosKey, u32>,
    // Chains awaiting merge at the current parent, ordered by the
    // head segment's (left, node).
    merge_queue: BTreeMap<(PosKey, IdType), SegmentId>,
    idmap: Vec<IdType>,
    last_edgeset: Option<BufferedEdgeset>,
    segment_buffer: Vec<SegmentId>,
    children_buffer: Vec<IdType>,
}

impl<'a> Simplifier<'a> {
    /// Validate the samples and set up the initial state.
    ///
    /// The output node, site, and mutation tables are cleared here;
    /// one output node is recorded per sample, in argument order, so
    /// that samples map to output ids `0..num_samples`.
    pub fn new(
        tables: &'a mut TableCollection,
        samples: &[IdType],
        flags: SimplificationFlags,
    ) -> Result<Self, TsreduceError> {
        if samples.len() < 2 {
            return Err(TablesError::BadParam {
                msg: "at least two samples are required",
            }
            .into());
        }
        if tables.nodes_.is_empty() || tables.edgesets_.is_empty() {
            return Err(TablesError::BadParam {
                msg: "node and edgeset tables must be non-empty",
            }
            .into());
        }
        let sequence_length = tables.sequence_length();
        let input_nodes = tables.nodes_.clone();
        let input_sites = tables.sites_.clone();
        let input_mutations = tables.mutations_.clone();
        let num_input_nodes = input_nodes.num_rows();
        let mut node_name_offset = Vec::with_capacity(num_input_nodes);
        let mut offset = 0;
        for j in 0..num_input_nodes {
            node_name_offset.push(offset);
            offset += input_nodes.name_length_[j] as usize;
        }
        let pool = SegmentPool::with_capacity(tables.edgesets_.num_rows());
        tables.nodes_.reset();
        tables.sites_.reset();
        tables.mutations_.reset();
        let mut simplifier = Simplifier {
            tables,
            flags,
            sequence_length,
            input_nodes,
            input_sites,
            input_mutations,
            node_name_offset,
            pool,
            ancestor_map: vec![None; num_input_nodes],
            overlap_counts: BTreeMap::new(),
            merge_queue: BTreeMap::new(),
            idmap: vec![NULL_ID; num_input_nodes],
            last_edgeset: None,
            segment_buffer: vec![],
            children_buffer: vec![],
        };
        for &sample in samples {
            if sample < 0 || sample as usize >= num_input_nodes {
                return Err(TablesError::OutOfBounds { found: sample }.into());
            }
            if !node_is_sample(simplifier.input_nodes.flags_[sample as usize]) {
                return Err(SimplificationError::BadSamples { found: sample }.into());
            }
            if simplifier.ancestor_map[sample as usize].is_some() {
                return Err(SimplificationError::DuplicateSample { found: sample }.into());
            }
            let output_id = simplifier.record_node(sample)?;
            let head = simplifier
                .pool
                .alloc(0.0, sequence_length, output_id, None);
            simplifier.ancestor_map[sample as usize] = Some(head);
        }
        simplifier
            .overlap_counts
            .insert(PosKey(0.0), samples.len() as u32);
        // The upper sentinel is deliberately larger than any real
        // overlap count, so walks terminate at sequence_length.
        simplifier
            .overlap_counts
            .insert(PosKey(sequence_length), samples.len() as u32 + 1);
        Ok(simplifier)
    }

    /// Perform the full simplification, rewriting the tables to hold
    /// the reduced history.
    pub fn run(&mut self, output: &mut SimplificationOutput) -> Result<(), TsreduceError> {
        let input_edgesets = self.tables.edgesets_.take_rows();
        let num_input_edgesets = input_edgesets.num_rows();
        if num_input_edgesets > 0 {
            let mut current_parent = input_edgesets.parent_[0];
            let mut children_offset = 0;
            for j in 0..num_input_edgesets {
                let parent = input_edgesets.parent_[j];
                if parent < 0 || parent as usize >= self.input_nodes.num_rows() {
                    return Err(TablesError::OutOfBounds { found: parent }.into());
                }
                let left = input_edgesets.left_[j];
                let right = input_edgesets.right_[j];
                let len = input_edgesets.children_length_[j] as usize;
                let children = &input_edgesets.children_[children_offset..children_offset + len];
                children_offset += len;

                if parent != current_parent {
                    if self.flags.contains(SimplificationFlags::VALIDATE_ALL) {
                        self.check_state();
                    }
                    self.merge_ancestors(current_parent)?;
                    debug_assert!(self.merge_queue.is_empty());
                    if self.input_nodes.time_[current_parent as usize]
                        > self.input_nodes.time_[parent as usize]
                    {
                        return Err(SimplificationError::RecordsNotTimeSorted.into());
                    }
                    current_parent = parent;
                }
                for &child in children {
                    if child < 0 || child as usize >= self.input_nodes.num_rows() {
                        return Err(TablesError::OutOfBounds { found: child }.into());
                    }
                    if self.ancestor_map[child as usize].is_some() {
                        self.remove_ancestry(left, right, child);
                        if self.flags.contains(SimplificationFlags::VALIDATE_ALL) {
                            self.check_state();
                        }
                    }
                }
            }
            self.merge_ancestors(current_parent)?;
            debug_assert!(self.merge_queue.is_empty());
            if self.flags.contains(SimplificationFlags::VALIDATE_ALL) {
                self.check_state();
            }
        }
        self.flush_last_edgeset()?;
        self.finalise_sites_and_mutations()?;
        output.idmap.clear();
        output.idmap.extend_from_slice(&self.idmap);
        Ok(())
    }

    // Copy the input node into the output node table and record the
    // mapping.
    fn record_node(&mut self, input_id: IdType) -> Result<IdType, TablesError> {
        let j = input_id as usize;
        let offset = self.node_name_offset[j];
        let name = &self.input_nodes.name_[offset..offset + self.input_nodes.name_length_[j] as usize];
        let output_id = self.tables.nodes_.add_row(
            self.input_nodes.flags_[j],
            self.input_nodes.time_[j],
            self.input_nodes.population_[j],
            name,
        )?;
        self.idmap[j] = output_id;
        Ok(output_id)
    }

    fn queue_insert(&mut self, seg: SegmentId) {
        let key = (PosKey(self.pool[seg].left), self.pool[seg].node);
        let previous = self.merge_queue.insert(key, seg);
        debug_assert!(previous.is_none());
    }

    // Split the chain of input_id around [left, right): segments
    // inside the interval leave the ancestor map and join the merge
    // queue as one chain; the remainder is re-linked in place.
    fn remove_ancestry(&mut self, left: Position, right: Position, input_id: IdType) {
        let mut x = self.ancestor_map[input_id as usize];
        let mut head = x;
        let mut last: Option<SegmentId> = None;
        // Skip the segments entirely before left.
        while let Some(seg) = x {
            if self.pool[seg].right > left {
                break;
            }
            last = Some(seg);
            x = self.pool[seg].next;
        }
        if let Some(seg) = x {
            if self.pool[seg].left < left {
                // The left edge of the segment overhangs; the excess
                // stays with the outside chain.
                let (seg_left, seg_node) = {
                    let s = &self.pool[seg];
                    (s.left, s.node)
                };
                let y = self.pool.alloc(seg_left, left, seg_node, None);
                self.pool[seg].left = left;
                if let Some(l) = last {
                    self.pool[l].next = Some(y);
                }
                if head == x {
                    head = Some(y);
                }
                last = Some(y);
            }
        }
        if let Some(first) = x {
            if self.pool[first].left < right {
                // first heads the removed chain; queue it for merging.
                self.queue_insert(first);
                let mut x_prev: Option<SegmentId> = None;
                let mut cur = x;
                // Skip over segments strictly within the interval.
                while let Some(seg) = cur {
                    if self.pool[seg].right > right {
                        break;
                    }
                    x_prev = Some(seg);
                    cur = self.pool[seg].next;
                }
                match cur {
                    Some(seg) if self.pool[seg].left < right => {
                        // Right-hand overhang: [right, seg.right)
                        // rejoins the outside chain and the removed
                        // chain is terminated.
                        let (seg_right, seg_node, seg_next) = {
                            let s = &self.pool[seg];
                            (s.right, s.node, s.next)
                        };
                        let y = self.pool.alloc(right, seg_right, seg_node, seg_next);
                        self.pool[seg].right = right;
                        self.pool[seg].next = None;
                        cur = Some(y);
                    }
                    _ => {
                        if let Some(p) = x_prev {
                            self.pool[p].next = None;
                        }
                    }
                }
                x = cur;
            }
        }
        // x is the first segment of the outside chain after right.
        match last {
            None => head = x,
            Some(l) => self.pool[l].next = x,
        }
        self.ancestor_map[input_id as usize] = head;
    }

    // Pop chains off the merge queue in (left, node) order, building
    // the new ancestry chain for input_id and emitting output
    // edgesets wherever two or more segments overlap.
    fn merge_ancestors(&mut self, input_id: IdType) -> Result<(), TsreduceError> {
        let mut coalescence = false;
        let mut z: Option<SegmentId> = None;
        loop {
            let first_key = match self.merge_queue.keys().next() {
                Some(&k) => k,
                None => break,
            };
            let l = (first_key.0).0;
            let mut r_max = self.sequence_length;
            self.segment_buffer.clear();
            // Gather every chain whose head starts exactly at l.
            loop {
                let (key, seg) = match self.merge_queue.iter().next() {
                    Some((&k, &s)) => (k, s),
                    None => break,
                };
                if key.0 != PosKey(l) {
                    break;
                }
                self.merge_queue.remove(&key);
                r_max = r_max.min(self.pool[seg].right);
                self.segment_buffer.push(seg);
            }
            let next_l = self.merge_queue.keys().next().map(|k| (k.0).0);
            if let Some(nl) = next_l {
                r_max = r_max.min(nl);
            }
            let h = self.segment_buffer.len();
            let mut alpha: Option<SegmentId> = None;
            if h == 1 {
                // A single ancestor passes through; no coalescence.
                let x = self.segment_buffer[0];
                match next_l {
                    Some(nl) if nl < self.pool[x].right => {
                        // A later chain starts inside x: contribute
                        // the prefix and re-queue the rest.
                        let (x_left, x_node) = {
                            let s = &self.pool[x];
                            (s.left, s.node)
                        };
                        alpha = Some(self.pool.alloc(x_left, nl, x_node, None));
                        self.pool[x].left = nl;
                        self.queue_insert(x);
                    }
                    _ => {
                        alpha = Some(x);
                        let next = self.pool[x].next;
                        self.pool[x].next = None;
                        if let Some(n) = next {
                            self.queue_insert(n);
                        }
                    }
                }
            } else {
                if !coalescence {
                    coalescence = true;
                    self.record_node(input_id)?;
                }
                let v = (self.tables.nodes_.num_rows() - 1) as IdType;
                // The decrement walk below needs entries at both
                // bounds so the updates stay local.
                self.ensure_overlap_count(l);
                self.ensure_overlap_count(r_max);
                let h_count = h as u32;
                let r: Position;
                let mut alpha_required = false;
                {
                    let mut iter = self.overlap_counts.range_mut(PosKey(l)..);
                    let (_, count) = iter.next().expect("overlap count at interval left");
                    if *count == h_count {
                        // Fully coalesced on [l, next break).
                        *count = 0;
                        let (key, _) = iter.next().expect("overlap count after interval");
                        r = key.0;
                    } else {
                        let mut walked = l;
                        let mut count = count;
                        while *count != h_count && walked < r_max {
                            *count -= h_count - 1;
                            let (key, next_count) =
                                iter.next().expect("overlap count before r_max");
                            walked = key.0;
                            count = next_count;
                        }
                        r = walked;
                        alpha_required = true;
                    }
                }
                if alpha_required {
                    alpha = Some(self.pool.alloc(l, r, v, None));
                }
                // Emit the record and put the surviving remainders
                // back on the queue.
                let mut children = std::mem::take(&mut self.children_buffer);
                children.clear();
                for j in 0..h {
                    let x = self.segment_buffer[j];
                    children.push(self.pool[x].node);
                    let mut survivor = Some(x);
                    if self.pool[x].right == r {
                        let next = self.pool[x].next;
                        self.pool.free(x);
                        survivor = next;
                    } else if self.pool[x].right > r {
                        self.pool[x].left = r;
                    }
                    if let Some(s) = survivor {
                        self.queue_insert(s);
                    }
                }
                self.record_edgeset(l, r, v, &mut children)?;
                self.children_buffer = children;
            }
            // Integrate alpha into the output chain for input_id.
            if let Some(a) = alpha {
                match z {
                    None => self.ancestor_map[input_id as usize] = Some(a),
                    Some(tail) => self.pool[tail].next = Some(a),
                }
                z = Some(a);
            }
        }
        Ok(())
    }

    // Insert an overlap count at x, copying the count of the entry
    // containing x, unless one is already present.
    fn ensure_overlap_count(&mut self, x: Position) {
        let key = PosKey(x);
        if self.overlap_counts.contains_key(&key) {
            return;
        }
        let count = self
            .overlap_counts
            .range(..key)
            .next_back()
            .map(|(_, &c)| c)
            .expect("overlap count sentinel at zero");
        self.overlap_counts.insert(key, count);
    }

    // Emit an output edgeset through the squash buffer.  children is
    // sorted in place before comparison.
    fn record_edgeset(
        &mut self,
        left: Position,
        right: Position,
        parent: IdType,
        children: &mut Vec<IdType>,
    ) -> Result<(), TablesError> {
        children.sort_unstable();
        let squash = match &self.last_edgeset {
            Some(last) => {
                left == last.right && parent == last.parent && *children == last.children
            }
            None => false,
        };
        if squash {
            if let Some(last) = &mut self.last_edgeset {
                last.right = right;
            }
            return Ok(());
        }
        let mut buffer = match self.last_edgeset.take() {
            Some(last) => {
                self.tables
                    .edgesets_
                    .add_row(last.left, last.right, last.parent, &last.children)?;
                last.children
            }
            None => vec![],
        };
        buffer.clear();
        buffer.extend_from_slice(children);
        self.last_edgeset = Some(BufferedEdgeset {
            left,
            right,
            parent,
            children: buffer,
        });
        Ok(())
    }

    fn flush_last_edgeset(&mut self) -> Result<(), TablesError> {
        if let Some(last) = self.last_edgeset.take() {
            self.tables
                .edgesets_
                .add_row(last.left, last.right, last.parent, &last.children)?;
        }
        Ok(())
    }

    // Resolve the output node carrying the material of input_node at
    // the given position: recorded nodes map to themselves; unary
    // material that reached the top of the graph maps to the output
    // node now covering it; anything else is not ancestral and yields
    // NULL_ID.
    fn mapped_node_at(&self, input_node: IdType, position: Position) -> IdType {
        let mapped = self.idmap[input_node as usize];
        if mapped != NULL_ID {
            return mapped;
        }
        let mut x = self.ancestor_map[input_node as usize];
        while let Some(seg) = x {
            let s = &self.pool[seg];
            if position < s.left {
                break;
            }
            if position < s.right {
                return s.node;
            }
            x = s.next;
        }
        NULL_ID
    }

    // Rewrite mutations through the node mapping, drop sites whose
    // mutations all vanished, and compact the surviving site ids.
    fn finalise_sites_and_mutations(&mut self) -> Result<(), TsreduceError> {
        let num_sites = self.input_sites.num_rows();
        let num_mutations = self.input_mutations.num_rows();
        let mut mapped: Vec<Vec<(IdType, usize)>> = vec![vec![]; num_sites];
        let mut derived_offset = Vec::with_capacity(num_mutations);
        let mut offset = 0;
        for j in 0..num_mutations {
            derived_offset.push(offset);
            offset += self.input_mutations.derived_state_length_[j] as usize;
            let site = self.input_mutations.site_[j];
            if site < 0 || site as usize >= num_sites {
                return Err(TablesError::OutOfBounds { found: site }.into());
            }
            let node = self.input_mutations.node_[j];
            if node < 0 || node as usize >= self.input_nodes.num_rows() {
                return Err(TablesError::OutOfBounds { found: node }.into());
            }
            let position = self.input_sites.position_[site as usize];
            let output_node = self.mapped_node_at(node, position);
            if output_node != NULL_ID {
                mapped[site as usize].push((output_node, j));
            }
        }
        let mut ancestral_offset = 0;
        for j in 0..num_sites {
            let state_len = self.input_sites.ancestral_state_length_[j] as usize;
            let state_start = ancestral_offset;
            ancestral_offset += state_len;
            if mapped[j].is_empty() {
                continue;
            }
            let new_site = {
                let state = &self.input_sites.ancestral_state_[state_start..state_start + state_len];
                self.tables
                    .sites_
                    .add_row(self.input_sites.position_[j], state)?
            };
            for &(output_node, row) in &mapped[j] {
                let len = self.input_mutations.derived_state_length_[row] as usize;
                let start = derived_offset[row];
                let derived = &self.input_mutations.derived_state_[start..start + len];
                self.tables
                    .mutations_
                    .add_row(new_site, output_node, derived)?;
            }
        }
        Ok(())
    }

    fn check_chain(&self, head: SegmentId) -> usize {
        let mut count = 0;
        let mut x = Some(head);
        while let Some(seg) = x {
            let s = &self.pool[seg];
            assert!(s.left < s.right);
            if let Some(next) = s.next {
                assert!(s.right <= self.pool[next].left);
            }
            count += 1;
            x = s.next;
        }
        count
    }

    /// Verify the chain ordering invariants and the segment pool
    /// accounting.  Violations are programmer errors and panic.
    pub fn check_state(&self) {
        let mut total_segments = 0;
        for head in self.ancestor_map.iter().copied().flatten() {
            total_segments += self.check_chain(head);
        }
        for (key, &seg) in self.merge_queue.iter() {
            assert!(key.0 == PosKey(self.pool[seg].left));
            assert_eq!(key.1, self.pool[seg].node);
            total_segments += self.check_chain(seg);
        }
        assert_eq!(total_segments, self.pool.num_allocated());
    }

    fn print_chain<W: io::Write>(&self, head: SegmentId, out: &mut W) -> io::Result<()> {
        let mut x = Some(head);
        while let Some(seg) = x {
            let s = &self.pool[seg];
            write!(out, "({},{}->{})", s.left, s.right, s.node)?;
            x = s.next;
        }
        Ok(())
    }

    pub fn print_state<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "--simplifier state--")?;
        writeln!(out, "===\ninput nodes\n===")?;
        self.input_nodes.print_state(out)?;
        writeln!(out, "===\noutput tables\n===")?;
        self.tables.nodes_.print_state(out)?;
        self.tables.edgesets_.print_state(out)?;
        self.tables.sites_.print_state(out)?;
        self.tables.mutations_.print_state(out)?;
        writeln!(out, "===\nsegment pool\n===")?;
        writeln!(out, "allocated = {}", self.pool.num_allocated())?;
        writeln!(out, "===\nancestors\n===")?;
        for (j, head) in self.ancestor_map.iter().enumerate() {
            if let Some(head) = head {
                write!(out, "{}:\t", j)?;
                self.print_chain(*head, out)?;
                writeln!(out)?;
            }
        }
        writeln!(out, "===\nmerge queue\n===")?;
        for &seg in self.merge_queue.values() {
            self.print_chain(seg, out)?;
            writeln!(out)?;
        }
        Ok(())
    }
}

/// Simplify a [``TableCollection``] with respect to `samples`.
///
/// On success the collection holds the reduced history: the samples
/// become output nodes `0..samples.len()` in argument order, and
/// `output.idmap` records the id mapping for every input node.
///
/// # Parameters
///
/// * `samples`: ids of the nodes whose ancestry must be preserved.
/// * `flags`: modify the behavior of the algorithm.
/// * `tables`: the collection to simplify.  Edgesets must be sorted;
///   see [``TableCollection::sort_tables_for_simplification``].
/// * `output`: where non-table results are written.
pub fn simplify_tables(
    samples: &[IdType],
    flags: SimplificationFlags,
    tables: &mut TableCollection,
    output: &mut SimplificationOutput,
) -> Result<(), TsreduceError> {
    let mut simplifier = Simplifier::new(tables, samples, flags)?;
    simplifier.run(output)
}

#[cfg(test)]
mod test_simplification {

    use super::*;
    use crate::flags::NodeFlags;
    use crate::tsdef::Time;

    fn sample_bits() -> u32 {
        NodeFlags::IS_SAMPLE.bits()
    }

    fn validate() -> SimplificationFlags {
        SimplificationFlags::VALIDATE_ALL
    }

    // Nodes 0 and 1 are samples at time 0; node 2 is their common
    // ancestor over the whole genome.
    fn single_coalescence_tables() -> TableCollection {
        let mut tables = TableCollection::new(1.0).unwrap();
        tables.add_node(sample_bits(), 0.0, 0, b"").unwrap();
        tables.add_node(sample_bits(), 0.0, 0, b"").unwrap();
        tables.add_node(0, 1.0, 0, b"").unwrap();
        tables.add_edgeset(0.0, 1.0, 2, &[0, 1]).unwrap();
        tables
    }

    fn run_simplify(
        tables: &mut TableCollection,
        samples: &[IdType],
    ) -> Result<SimplificationOutput, TsreduceError> {
        let mut output = SimplificationOutput::new();
        simplify_tables(samples, validate(), tables, &mut output)?;
        Ok(output)
    }

    fn assert_output_edgesets_sorted(tables: &TableCollection) {
        let rows: Vec<_> = tables.edgesets().iter().collect();
        for w in rows.windows(2) {
            let ta = tables.nodes().time()[w[0].parent as usize];
            let tb = tables.nodes().time()[w[1].parent as usize];
            let key_a = (ta, w[0].parent, w[0].left);
            let key_b = (tb, w[1].parent, w[1].left);
            assert!(key_a <= key_b, "output edgesets not sorted");
            let squashable = w[0].parent == w[1].parent
                && w[0].children == w[1].children
                && w[1].left == w[0].right;
            assert!(!squashable, "adjacent output edgesets are squashable");
        }
    }

    #[test]
    fn test_single_coalescence() {
        let mut tables = single_coalescence_tables();
        let output = run_simplify(&mut tables, &[0, 1]).unwrap();
        assert_eq!(tables.num_nodes(), 3);
        assert_eq!(output.idmap, vec![0, 1, 2]);
        let rows: Vec<_> = tables.edgesets().iter().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].left, 0.0);
        assert_eq!(rows[0].right, 1.0);
        assert_eq!(rows[0].parent, 2);
        assert_eq!(rows[0].children, &[0, 1]);
        assert_eq!(tables.nodes().time(), &[0.0, 0.0, 1.0]);
        assert_output_edgesets_sorted(&tables);
    }

    #[test]
    fn test_sample_order_defines_output_ids() {
        let mut tables = single_coalescence_tables();
        let output = run_simplify(&mut tables, &[1, 0]).unwrap();
        // Sample 1 becomes output node 0.
        assert_eq!(output.idmap, vec![1, 0, 2]);
        let rows: Vec<_> = tables.edgesets().iter().collect();
        assert_eq!(rows[0].children, &[0, 1]);
    }

    #[test]
    fn test_non_ancestral_node_pruned() {
        let mut tables = single_coalescence_tables();
        tables.add_node(0, 2.0, 0, b"").unwrap();
        tables.add_edgeset(0.0, 1.0, 3, &[2]).unwrap();
        let output = run_simplify(&mut tables, &[0, 1]).unwrap();
        assert_eq!(tables.num_nodes(), 3);
        assert_eq!(output.idmap, vec![0, 1, 2, NULL_ID]);
        let rows: Vec<_> = tables.edgesets().iter().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].parent, 2);
        assert_eq!(rows[0].children, &[0, 1]);
    }

    #[test]
    fn test_adjacent_squash() {
        let mut tables = TableCollection::new(1.0).unwrap();
        tables.add_node(sample_bits(), 0.0, 0, b"").unwrap();
        tables.add_node(sample_bits(), 0.0, 0, b"").unwrap();
        tables.add_node(0, 1.0, 0, b"").unwrap();
        tables.add_edgeset(0.0, 0.5, 2, &[0, 1]).unwrap();
        tables.add_edgeset(0.5, 1.0, 2, &[0, 1]).unwrap();
        run_simplify(&mut tables, &[0, 1]).unwrap();
        let rows: Vec<_> = tables.edgesets().iter().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].left, 0.0);
        assert_eq!(rows[0].right, 1.0);
        assert_eq!(rows[0].children, &[0, 1]);
    }

    #[test]
    fn test_split_ancestry_not_squashed() {
        // The samples coalesce in parent 2 on [0, 0.5) and in parent
        // 3 on [0.5, 1): two output rows with meeting intervals but
        // distinct parents.
        let mut tables = TableCollection::new(1.0).unwrap();
        tables.add_node(sample_bits(), 0.0, 0, b"").unwrap();
        tables.add_node(sample_bits(), 0.0, 0, b"").unwrap();
        tables.add_node(0, 1.0, 0, b"").unwrap();
        tables.add_node(0, 2.0, 0, b"").unwrap();
        tables.add_edgeset(0.0, 0.5, 2, &[0, 1]).unwrap();
        tables.add_edgeset(0.5, 1.0, 3, &[0, 1]).unwrap();
        let output = run_simplify(&mut tables, &[0, 1]).unwrap();
        assert_eq!(tables.num_nodes(), 4);
        assert_eq!(output.idmap, vec![0, 1, 2, 3]);
        let rows: Vec<_> = tables.edgesets().iter().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].parent, 2);
        assert_eq!((rows[0].left, rows[0].right), (0.0, 0.5));
        assert_eq!(rows[1].parent, 3);
        assert_eq!((rows[1].left, rows[1].right), (0.5, 1.0));
        assert_output_edgesets_sorted(&tables);
    }

    #[test]
    fn test_unary_node_elided() {
        // Node 2 is unary above sample 0 and is dropped; the edgeset
        // of node 3 connects the samples directly.
        let mut tables = TableCollection::new(1.0).unwrap();
        tables.add_node(sample_bits(), 0.0, 0, b"").unwrap();
        tables.add_node(sample_bits(), 0.0, 0, b"").unwrap();
        tables.add_node(0, 1.0, 0, b"").unwrap();
        tables.add_node(0, 2.0, 0, b"").unwrap();
        tables.add_edgeset(0.0, 1.0, 2, &[0]).unwrap();
        tables.add_edgeset(0.0, 1.0, 3, &[1, 2]).unwrap();
        let output = run_simplify(&mut tables, &[0, 1]).unwrap();
        assert_eq!(tables.num_nodes(), 3);
        assert_eq!(output.idmap, vec![0, 1, NULL_ID, 2]);
        let rows: Vec<_> = tables.edgesets().iter().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].parent, 2);
        assert_eq!(rows[0].children, &[0, 1]);
        assert_eq!(tables.nodes().time(), &[0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_partial_coalescence_walks_overlap_counts() {
        // Three samples; 0 and 1 coalesce in node 3 while sample 2
        // joins later in node 4.  The first merge covers only part of
        // the extant lineages, exercising the decrement walk.
        let mut tables = TableCollection::new(1.0).unwrap();
        for _ in 0..3 {
            tables.add_node(sample_bits(), 0.0, 0, b"").unwrap();
        }
        tables.add_node(0, 1.0, 0, b"").unwrap();
        tables.add_node(0, 2.0, 0, b"").unwrap();
        tables.add_edgeset(0.0, 1.0, 3, &[0, 1]).unwrap();
        tables.add_edgeset(0.0, 1.0, 4, &[2, 3]).unwrap();
        let output = run_simplify(&mut tables, &[0, 1, 2]).unwrap();
        assert_eq!(tables.num_nodes(), 5);
        assert_eq!(output.idmap, vec![0, 1, 2, 3, 4]);
        let rows: Vec<_> = tables.edgesets().iter().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].parent, 3);
        assert_eq!(rows[0].children, &[0, 1]);
        assert_eq!(rows[1].parent, 4);
        assert_eq!(rows[1].children, &[2, 3]);
        assert_output_edgesets_sorted(&tables);
    }

    #[test]
    fn test_recombined_ancestry() {
        // Sample 0 inherits [0, 0.5) from node 2 and [0.5, 1) from
        // node 3; sample 1 descends from both across the genome.
        let mut tables = TableCollection::new(1.0).unwrap();
        tables.add_node(sample_bits(), 0.0, 0, b"").unwrap();
        tables.add_node(sample_bits(), 0.0, 0, b"").unwrap();
        tables.add_node(0, 1.0, 0, b"").unwrap();
        tables.add_node(0, 2.0, 0, b"").unwrap();
        tables.add_edgeset(0.0, 0.5, 2, &[0, 1]).unwrap();
        tables.add_edgeset(0.5, 1.0, 3, &[0, 1]).unwrap();
        let output = run_simplify(&mut tables, &[0, 1]).unwrap();
        assert_eq!(output.idmap, vec![0, 1, 2, 3]);
        let rows: Vec<_> = tables.edgesets().iter().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].children, &[0, 1]);
        assert_eq!(rows[1].children, &[0, 1]);
        assert_output_edgesets_sorted(&tables);
    }

    #[test]
    fn test_duplicate_sample() {
        let mut tables = single_coalescence_tables();
        let r = run_simplify(&mut tables, &[0, 0]);
        assert_eq!(
            r.err(),
            Some(TsreduceError::SimplificationError {
                value: SimplificationError::DuplicateSample { found: 0 }
            })
        );
    }

    #[test]
    fn test_sample_without_flag() {
        let mut tables = single_coalescence_tables();
        let r = run_simplify(&mut tables, &[0, 2]);
        assert_eq!(
            r.err(),
            Some(TsreduceError::SimplificationError {
                value: SimplificationError::BadSamples { found: 2 }
            })
        );
    }

    #[test]
    fn test_sample_out_of_bounds() {
        let mut tables = single_coalescence_tables();
        let r = run_simplify(&mut tables, &[0, 9]);
        assert_eq!(
            r.err(),
            Some(TsreduceError::TablesError {
                value: TablesError::OutOfBounds { found: 9 }
            })
        );
    }

    #[test]
    fn test_too_few_samples_or_empty_tables() {
        let mut tables = single_coalescence_tables();
        let r = run_simplify(&mut tables, &[0]);
        assert!(matches!(
            r.err(),
            Some(TsreduceError::TablesError {
                value: TablesError::BadParam { .. }
            })
        ));
        let mut empty = TableCollection::new(1.0).unwrap();
        let r = run_simplify(&mut empty, &[0, 1]);
        assert!(matches!(
            r.err(),
            Some(TsreduceError::TablesError {
                value: TablesError::BadParam { .. }
            })
        ));
    }

    #[test]
    fn test_unsorted_input_rejected() {
        let mut tables = TableCollection::new(1.0).unwrap();
        tables.add_node(sample_bits(), 0.0, 0, b"").unwrap();
        tables.add_node(sample_bits(), 0.0, 0, b"").unwrap();
        tables.add_node(0, 1.0, 0, b"").unwrap();
        tables.add_node(0, 2.0, 0, b"").unwrap();
        // Older parent first.
        tables.add_edgeset(0.0, 1.0, 3, &[0, 1]).unwrap();
        tables.add_edgeset(0.0, 1.0, 2, &[0, 1]).unwrap();
        let r = run_simplify(&mut tables, &[0, 1]);
        assert_eq!(
            r.err(),
            Some(TsreduceError::SimplificationError {
                value: SimplificationError::RecordsNotTimeSorted
            })
        );
    }

    #[test]
    fn test_node_metadata_copied() {
        let mut tables = TableCollection::new(1.0).unwrap();
        tables.add_node(sample_bits(), 0.0, 3, b"s0").unwrap();
        tables.add_node(sample_bits(), 0.0, 4, b"s1").unwrap();
        tables.add_node(0, 1.0, 5, b"anc").unwrap();
        tables.add_edgeset(0.0, 1.0, 2, &[0, 1]).unwrap();
        run_simplify(&mut tables, &[0, 1]).unwrap();
        let rows: Vec<_> = tables.nodes().iter().collect();
        assert_eq!(rows[0].name, b"s0");
        assert_eq!(rows[0].population, 3);
        assert_eq!(rows[1].name, b"s1");
        assert_eq!(rows[2].name, b"anc");
        assert_eq!(rows[2].population, 5);
        assert!(node_is_sample(rows[0].flags));
        assert!(!node_is_sample(rows[2].flags));
    }

    #[test]
    fn test_mutation_remap_and_site_compaction() {
        // Site at 0.25 mutates on sample 0, site at 0.5 mutates on an
        // unreferenced node (dropped with its site), site at 0.75
        // mutates on the coalescing ancestor.
        let mut tables = single_coalescence_tables();
        tables.add_node(0, 3.0, 0, b"").unwrap(); // 3: no edgesets
        tables.add_site(0.25, b"A").unwrap();
        tables.add_site(0.5, b"C").unwrap();
        tables.add_site(0.75, b"G").unwrap();
        tables.add_mutation(0, 0, b"T").unwrap();
        tables.add_mutation(1, 3, b"T").unwrap();
        tables.add_mutation(2, 2, b"T").unwrap();
        run_simplify(&mut tables, &[0, 1]).unwrap();
        assert_eq!(tables.sites().position(), &[0.25, 0.75]);
        let mutations: Vec<_> = tables.mutations().iter().collect();
        assert_eq!(mutations.len(), 2);
        assert_eq!(mutations[0].site, 0);
        assert_eq!(mutations[0].node, 0);
        assert_eq!(mutations[1].site, 1);
        assert_eq!(mutations[1].node, 2);
        assert_eq!(mutations[1].derived_state, b"T");
    }

    #[test]
    fn test_mutation_on_unary_node_moves_down() {
        // Node 3 is unary above sample 0 on [0.5, 1) and keeps no
        // output node; its mutation attaches to the node now carrying
        // that material.
        let mut tables = TableCollection::new(1.0).unwrap();
        tables.add_node(sample_bits(), 0.0, 0, b"").unwrap();
        tables.add_node(sample_bits(), 0.0, 0, b"").unwrap();
        tables.add_node(0, 1.0, 0, b"").unwrap();
        tables.add_node(0, 2.0, 0, b"").unwrap();
        tables.add_edgeset(0.0, 0.5, 2, &[0, 1]).unwrap();
        tables.add_edgeset(0.5, 1.0, 3, &[0]).unwrap();
        tables.add_site(0.75, b"A").unwrap();
        tables.add_mutation(0, 3, b"T").unwrap();
        let output = run_simplify(&mut tables, &[0, 1]).unwrap();
        assert_eq!(output.idmap[3], NULL_ID);
        let mutations: Vec<_> = tables.mutations().iter().collect();
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].node, 0);
        assert_eq!(tables.sites().position(), &[0.75]);
    }

    #[test]
    fn test_mutation_above_full_coalescence_dropped() {
        // Once an interval has fully coalesced, history above the
        // MRCA carries no information about the samples and its
        // mutations vanish with it.
        let mut tables = single_coalescence_tables();
        tables.add_node(0, 2.0, 0, b"").unwrap();
        tables.add_edgeset(0.0, 1.0, 3, &[2]).unwrap();
        tables.add_site(0.5, b"A").unwrap();
        tables.add_mutation(0, 3, b"T").unwrap();
        run_simplify(&mut tables, &[0, 1]).unwrap();
        assert!(tables.mutations().is_empty());
        assert!(tables.sites().is_empty());
    }

    #[test]
    fn test_simplify_unsorted_then_sorted() {
        // sort_tables_for_simplification puts rows in the order the
        // sweep requires.
        let mut tables = TableCollection::new(1.0).unwrap();
        tables.add_node(sample_bits(), 0.0, 0, b"").unwrap();
        tables.add_node(sample_bits(), 0.0, 0, b"").unwrap();
        tables.add_node(0, 1.0, 0, b"").unwrap();
        tables.add_node(0, 2.0, 0, b"").unwrap();
        tables.add_edgeset(0.0, 1.0, 3, &[2]).unwrap();
        tables.add_edgeset(0.0, 1.0, 2, &[1, 0]).unwrap();
        tables.sort_tables_for_simplification().unwrap();
        let output = run_simplify(&mut tables, &[0, 1]).unwrap();
        assert_eq!(output.idmap, vec![0, 1, 2, NULL_ID]);
        assert_eq!(tables.num_edgesets(), 1);
    }

    #[test]
    fn test_print_state_smoke() {
        let mut tables = single_coalescence_tables();
        let simplifier = Simplifier::new(&mut tables, &[0, 1], validate()).unwrap();
        let mut sink: Vec<u8> = vec![];
        simplifier.print_state(&mut sink).unwrap();
        let text = String::from_utf8(sink).unwrap();
        assert!(text.contains("--simplifier state--"));
        assert!(text.contains("ancestors"));
    }

    // Helpers for genealogy equivalence checks.

    fn find_parent(tables: &TableCollection, node: IdType, x: Position) -> Option<IdType> {
        for row in tables.edgesets().iter() {
            if row.left <= x && x < row.right && row.children.contains(&node) {
                return Some(row.parent);
            }
        }
        None
    }

    fn ancestor_line(tables: &TableCollection, node: IdType, x: Position) -> Vec<IdType> {
        let mut line = vec![node];
        let mut current = node;
        while let Some(parent) = find_parent(tables, current, x) {
            line.push(parent);
            current = parent;
        }
        line
    }

    fn mrca_time(tables: &TableCollection, a: IdType, b: IdType, x: Position) -> Option<Time> {
        let line_a = ancestor_line(tables, a, x);
        for node in ancestor_line(tables, b, x) {
            if line_a.contains(&node) {
                return Some(tables.nodes().time()[node as usize]);
            }
        }
        None
    }

    // One independent random binary tree over each unit interval,
    // with globally increasing coalescence times.
    fn random_interval_trees(
        seed: u64,
        num_samples: usize,
        num_intervals: usize,
    ) -> TableCollection {
        use rand::Rng;
        use rand::SeedableRng;
        let mut rng = rand_pcg::Pcg64::seed_from_u64(seed);
        let mut tables = TableCollection::new(num_intervals as Position).unwrap();
        for _ in 0..num_samples {
            tables.add_node(sample_bits(), 0.0, 0, b"").unwrap();
        }
        let mut time = 0.0;
        for k in 0..num_intervals {
            let left = k as Position;
            let right = left + 1.0;
            let mut active: Vec<IdType> = (0..num_samples as IdType).collect();
            while active.len() > 1 {
                let i = rng.gen_range(0..active.len());
                let c1 = active.swap_remove(i);
                let j = rng.gen_range(0..active.len());
                let c2 = active.swap_remove(j);
                time += 1.0;
                let parent = tables.add_node(0, time, 0, b"").unwrap();
                tables.add_edgeset(left, right, parent, &[c1, c2]).unwrap();
                active.push(parent);
            }
        }
        tables
    }

    #[test]
    fn test_mrca_preserved_on_random_trees() {
        let num_samples = 6;
        let num_intervals = 4;
        for &seed in &[42u64, 1337, 20250801] {
            let mut tables = random_interval_trees(seed, num_samples, num_intervals);
            let input = tables.clone();
            tables.sort_tables_for_simplification().unwrap();
            let samples: Vec<IdType> = (0..num_samples as IdType).collect();
            let output = run_simplify(&mut tables, &samples).unwrap();
            assert_output_edgesets_sorted(&tables);
            // Every binary merge is ancestral to the samples, so
            // nothing is pruned.
            assert_eq!(tables.num_nodes(), input.num_nodes());
            assert!(output.idmap.iter().all(|&x| x != NULL_ID));
            for k in 0..num_intervals {
                let x = k as Position + 0.5;
                for a in 0..num_samples as IdType {
                    for b in (a + 1)..num_samples as IdType {
                        let expected = mrca_time(&input, a, b, x).unwrap();
                        let observed = mrca_time(&tables, a, b, x).unwrap();
                        assert_eq!(expected, observed, "mrca changed at {}", x);
                    }
                }
            }
            // Simplifying the reduced tables again is a fixed point.
            let reduced = tables.clone();
            run_simplify(&mut tables, &samples).unwrap();
            assert_eq!(tables.nodes(), reduced.nodes());
            assert_eq!(tables.edgesets(), reduced.edgesets());
        }
    }

    #[test]
    fn test_mrca_preserved_with_extra_history() {
        // Non-ancestral branches on top of the genealogy disappear
        // without changing sample MRCAs.
        let num_samples = 4;
        let mut tables = random_interval_trees(7, num_samples, 2);
        let num_nodes = tables.num_nodes() as IdType;
        // A chain of two unary ancestors above the last root.
        tables.add_node(0, 100.0, 0, b"").unwrap();
        tables.add_node(0, 101.0, 0, b"").unwrap();
        tables
            .add_edgeset(0.0, 2.0, num_nodes, &[num_nodes - 1])
            .unwrap();
        tables
            .add_edgeset(0.0, 2.0, num_nodes + 1, &[num_nodes])
            .unwrap();
        let input = tables.clone();
        tables.sort_tables_for_simplification().unwrap();
        let samples: Vec<IdType> = (0..num_samples as IdType).collect();
        let output = run_simplify(&mut tables, &samples).unwrap();
        assert_eq!(output.idmap[num_nodes as usize], NULL_ID);
        assert_eq!(output.idmap[num_nodes as usize + 1], NULL_ID);
        for &x in &[0.5, 1.5] {
            for a in 0..num_samples as IdType {
                for b in (a + 1)..num_samples as IdType {
                    let expected = mrca_time(&input, a, b, x).unwrap();
                    let observed = mrca_time(&tables, a, b, x).unwrap();
                    assert_eq!(expected, observed);
                }
            }
        }
    }
}
